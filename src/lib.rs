//! WebRTC provider registry for camera streams
//!
//! Integrations register *providers* that can turn a WebRTC offer for a
//! camera into an answer. For every camera the registry asks each provider
//! whether it supports the camera's stream source; the first one that does
//! handles the camera's offers. Integrations can also contribute ICE servers,
//! which are collected into one [`RtcConfiguration`] whenever a client asks.
//!
//! ```text
//!  integration ──register_provider──► WebRtcRegistry ──refresh──► CameraComponent
//!                                            ▲                          │
//!                                  select    │                          ▼
//!                                            └───────────────── CameraSession
//!                                                                handle_offer()
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use webrtc_registry::{BoxError, CameraComponent, WebRtcRegistry};
//!
//! # fn example() -> webrtc_registry::Result<()> {
//! let registry = WebRtcRegistry::new();
//! let component = Arc::new(CameraComponent::new());
//! registry.load(&component);
//!
//! let registration = registry.register_rtsp_to_webrtc_provider(
//!     "go2rtc",
//!     |stream_source: String, offer: String, stream_id: String| async move {
//!         // Forward the offer to the RTSP-to-WebRTC server here
//!         let _ = (stream_source, offer, stream_id);
//!         Ok::<_, BoxError>(Some("v=0 ...".to_string()))
//!     },
//! )?;
//!
//! // Later, when the integration unloads
//! registration.unregister();
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod error;
pub mod provider;
pub mod registry;
pub mod rtc;
pub mod session;
pub mod task;

pub use error::{BoxError, Error, Result};
pub use provider::{ProviderHandle, RtspToWebRtcProvider, WebRtcProvider, RTSP_PREFIXES};
pub use registry::{
    CapabilityFailurePolicy, IceServerFactory, IceServerRegistration, ProviderRegistration,
    RegistryConfig, WebRtcRegistry,
};
pub use rtc::{RtcConfiguration, RtcIceServer, StreamType};
pub use session::{CameraComponent, CameraSession, CameraSource, NegotiationPhase};
pub use task::{Spawn, TokioSpawner, TrackedSpawner};
