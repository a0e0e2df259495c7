//! RTSP-to-WebRTC callback adapter
//!
//! Older integrations expose a single async function taking the stream
//! source, the offer and a stream id. This wraps such a function into a
//! [`WebRtcProvider`] that only accepts RTSP and RTMP sources.

use std::future::Future;

use async_trait::async_trait;

use super::WebRtcProvider;
use crate::error::BoxError;
use crate::session::CameraSource;

/// Stream source prefixes accepted by [`RtspToWebRtcProvider`]
pub const RTSP_PREFIXES: [&str; 3] = ["rtsp://", "rtsps://", "rtmp://"];

/// Provider backed by an RTSP-to-WebRTC callback
///
/// The callback receives `(stream_source, offer_sdp, stream_id)`, where the
/// stream id is the camera's entity id and stays stable across offers so the
/// callback can update an existing source. It returns the SDP answer, or
/// `None` if the source or offer is not eligible.
pub struct RtspToWebRtcProvider<F> {
    callback: F,
    domain: Option<String>,
}

impl<F, Fut> RtspToWebRtcProvider<F>
where
    F: Fn(String, String, String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<String>, BoxError>> + Send + 'static,
{
    /// Wrap a callback
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            domain: None,
        }
    }

    /// Tag the provider with the integration that registered it
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Whether the stream source starts with one of [`RTSP_PREFIXES`]
pub fn is_rtsp_source(stream_source: &str) -> bool {
    RTSP_PREFIXES
        .iter()
        .any(|prefix| stream_source.starts_with(prefix))
}

#[async_trait]
impl<F, Fut> WebRtcProvider for RtspToWebRtcProvider<F>
where
    F: Fn(String, String, String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<String>, BoxError>> + Send + 'static,
{
    async fn is_supported(&self, stream_source: &str) -> Result<bool, BoxError> {
        Ok(is_rtsp_source(stream_source))
    }

    async fn handle_offer(
        &self,
        camera: &dyn CameraSource,
        offer_sdp: &str,
    ) -> Result<Option<String>, BoxError> {
        let Some(stream_source) = camera
            .stream_source()
            .await
            .filter(|source| !source.is_empty())
        else {
            tracing::debug!(
                entity_id = camera.entity_id(),
                "No stream source, offer not eligible"
            );
            return Ok(None);
        };

        (self.callback)(
            stream_source,
            offer_sdp.to_string(),
            camera.entity_id().to_string(),
        )
        .await
    }

    fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }
}
