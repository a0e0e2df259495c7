//! Camera component
//!
//! The set of camera sessions for one runtime instance. The registry
//! refreshes every session in here whenever its provider set changes.

use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;

use super::camera::CameraSession;

/// All camera sessions known to the runtime
#[derive(Debug, Default)]
pub struct CameraComponent {
    sessions: RwLock<Vec<Arc<CameraSession>>>,
}

impl CameraComponent {
    /// Create an empty component
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a camera and resolve its providers
    ///
    /// A session with the same entity id is replaced.
    pub async fn add_camera(&self, session: Arc<CameraSession>) -> Arc<CameraSession> {
        {
            let mut sessions = self.sessions.write();
            sessions.retain(|s| s.entity_id() != session.entity_id());
            sessions.push(Arc::clone(&session));
        }

        if let Err(e) = session.refresh_providers().await {
            tracing::warn!(
                entity_id = session.entity_id(),
                error = %e,
                "Failed to resolve WebRTC providers for new camera"
            );
        }

        tracing::debug!(entity_id = session.entity_id(), "Camera added");
        session
    }

    /// Remove a camera by entity id
    pub fn remove_camera(&self, entity_id: &str) -> Option<Arc<CameraSession>> {
        let mut sessions = self.sessions.write();
        let index = sessions.iter().position(|s| s.entity_id() == entity_id)?;
        let removed = sessions.remove(index);

        tracing::debug!(entity_id = entity_id, "Camera removed");
        Some(removed)
    }

    /// Look up a camera by entity id
    pub fn get(&self, entity_id: &str) -> Option<Arc<CameraSession>> {
        self.sessions
            .read()
            .iter()
            .find(|s| s.entity_id() == entity_id)
            .cloned()
    }

    /// Snapshot of all sessions
    pub fn sessions(&self) -> Vec<Arc<CameraSession>> {
        self.sessions.read().clone()
    }

    /// Number of cameras
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether there are no cameras
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Refresh the providers of every camera concurrently
    ///
    /// Failures are logged per camera and do not stop the others.
    pub async fn refresh_all(&self) {
        let sessions = self.sessions();
        let results = join_all(sessions.iter().map(|s| s.refresh_providers())).await;

        let mut failed = 0usize;
        for (session, result) in sessions.iter().zip(results) {
            if let Err(e) = result {
                failed += 1;
                tracing::warn!(
                    entity_id = session.entity_id(),
                    error = %e,
                    "Failed to refresh WebRTC providers"
                );
            }
        }

        tracing::debug!(
            cameras = sessions.len(),
            failed = failed,
            "WebRTC providers refreshed"
        );
    }
}
