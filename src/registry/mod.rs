//! Provider and ICE server registry
//!
//! The registry owns the set of WebRTC providers and the list of ICE server
//! factories for one camera component. Registrants get back a token whose
//! `unregister` removes what they added; they never see registry internals.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<WebRtcRegistry>
//!                  ┌──────────────────────────────┐
//!                  │ providers: Vec<Provider>     │
//!                  │ ice_servers: Vec<Factory>    │
//!                  │ component: Weak<Component>   │
//!                  └───────┬──────────────┬───────┘
//!          register/unregister            │ spawn refresh
//!                          │              ▼
//!                   [Integrations]  CameraComponent
//!                                   ┌──────┴──────┐
//!                                   ▼             ▼
//!                             CameraSession  CameraSession
//!                          refresh_providers()  handle_offer()
//! ```
//!
//! Any change to the provider set spawns a refresh through the registry's
//! [`Spawn`](crate::task::Spawn) implementation; each camera then re-runs
//! selection for its stream source. Negotiations already running keep the
//! provider they picked.

pub mod config;
pub mod handle;
pub mod ice;
pub mod store;

pub use config::{CapabilityFailurePolicy, RegistryConfig};
pub use handle::ProviderRegistration;
pub use ice::{IceServerFactory, IceServerFactoryHandle, IceServerRegistration, IceServerRegistry};
pub use store::WebRtcRegistry;
