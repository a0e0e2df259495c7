//! WebRTC providers
//!
//! A provider turns a WebRTC offer for a camera into an answer. Several
//! providers can be registered at once; for every camera the registry asks
//! each one whether it can handle the camera's stream source and the first
//! one that says yes negotiates.
//!
//! - [`WebRtcProvider`]: the capability check plus the offer handler
//! - [`legacy::RtspToWebRtcProvider`]: adapts a single RTSP-to-WebRTC callback

pub mod legacy;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BoxError;
use crate::session::CameraSource;

pub use legacy::{RtspToWebRtcProvider, RTSP_PREFIXES};

/// A WebRTC negotiation provider
#[async_trait]
pub trait WebRtcProvider: Send + Sync {
    /// Whether this provider can negotiate for the given stream source
    async fn is_supported(&self, stream_source: &str) -> Result<bool, BoxError>;

    /// Handle a WebRTC offer for the camera
    ///
    /// Returns the SDP answer, or `None` if the camera or offer is not
    /// eligible (for example when the stream source is currently unavailable).
    async fn handle_offer(
        &self,
        camera: &dyn CameraSource,
        offer_sdp: &str,
    ) -> Result<Option<String>, BoxError>;

    /// Integration that registered the provider, for diagnostics
    fn domain(&self) -> Option<&str> {
        None
    }
}

/// Shared provider reference as stored by the registry
pub type ProviderHandle = Arc<dyn WebRtcProvider>;

/// Whether two handles point at the same provider instance
///
/// Compares data pointers only, so the same provider seen through different
/// vtables is still one provider.
pub fn same_provider(a: &ProviderHandle, b: &ProviderHandle) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
