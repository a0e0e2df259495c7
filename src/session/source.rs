//! Camera collaborator interface
//!
//! The camera entity itself lives outside this crate. Providers only need
//! to look up where its media comes from and how to identify it.

use async_trait::async_trait;

/// A camera as seen by WebRTC providers
#[async_trait]
pub trait CameraSource: Send + Sync {
    /// Stable identifier of the camera entity, e.g. `camera.front_door`
    fn entity_id(&self) -> &str;

    /// Where the camera's media comes from (usually an RTSP URL)
    ///
    /// `None` when the source is temporarily unavailable.
    async fn stream_source(&self) -> Option<String>;
}
