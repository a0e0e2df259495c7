//! Background task spawning
//!
//! Refresh broadcasts are fire-and-forget. They go through [`Spawn`] so a
//! host (or a test) can decide where they run and wait for them when it
//! needs a settled state.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Spawns detached background work
pub trait Spawn: Send + Sync {
    /// Run `task` in the background; `name` is only used for logging
    fn spawn(&self, name: &'static str, task: BoxFuture<'static, ()>);
}

/// Spawns onto the current tokio runtime
///
/// Outside a runtime the task is dropped with a warning. Refresh broadcasts
/// are idempotent, so the next registry change re-derives the same state.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSpawner;

impl Spawn for TokioSpawner {
    fn spawn(&self, name: &'static str, task: BoxFuture<'static, ()>) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(_) => {
                tracing::warn!(task = name, "No tokio runtime, background task dropped");
            }
        }
    }
}

/// Spawns onto tokio and keeps the handles so callers can wait for them
#[derive(Debug, Default)]
pub struct TrackedSpawner {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TrackedSpawner {
    /// Create a new tracked spawner
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of spawned tasks not yet awaited
    pub fn pending(&self) -> usize {
        self.handles.lock().len()
    }

    /// Wait until every spawned task, including ones spawned meanwhile, is done
    pub async fn wait_idle(&self) {
        loop {
            let handles = std::mem::take(&mut *self.handles.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "Background task did not complete");
                }
            }
        }
    }
}

impl Spawn for TrackedSpawner {
    fn spawn(&self, name: &'static str, task: BoxFuture<'static, ()>) {
        tracing::trace!(task = name, "Spawning tracked task");
        let handle = tokio::spawn(task);
        self.handles.lock().push(handle);
    }
}
