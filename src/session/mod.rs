//! Camera sessions
//!
//! A [`CameraSession`] is this crate's view of one camera: the providers
//! that currently support its stream source and the state of the offer being
//! negotiated. The camera itself is supplied by the host through
//! [`CameraSource`].

pub mod camera;
pub mod component;
pub mod source;
pub mod state;

pub use camera::CameraSession;
pub use component::CameraComponent;
pub use source::CameraSource;
pub use state::{NegotiationPhase, NegotiationState};
