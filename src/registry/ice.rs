//! ICE server factories
//!
//! Integrations contribute ICE servers as async factories, so each one can
//! fetch short-lived TURN credentials when a client asks for them. The
//! registry keeps the factories in registration order and calls all of them
//! on every aggregation; any caching is up to the factory itself.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;

use super::store::WebRtcRegistry;
use crate::rtc::{RtcConfiguration, RtcIceServer};

/// Produces one ICE server descriptor on demand
#[async_trait]
pub trait IceServerFactory: Send + Sync {
    /// Build the current descriptor
    async fn ice_server(&self) -> RtcIceServer;
}

#[async_trait]
impl<F, Fut> IceServerFactory for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = RtcIceServer> + Send + 'static,
{
    async fn ice_server(&self) -> RtcIceServer {
        (self)().await
    }
}

/// Shared factory reference
pub type IceServerFactoryHandle = Arc<dyn IceServerFactory>;

fn same_factory(a: &IceServerFactoryHandle, b: &IceServerFactoryHandle) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Ordered list of ICE server factories
#[derive(Default)]
pub struct IceServerRegistry {
    factories: Mutex<Vec<IceServerFactoryHandle>>,
}

impl IceServerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a factory
    pub fn push(&self, factory: IceServerFactoryHandle) {
        let mut factories = self.factories.lock();
        factories.push(factory);

        tracing::debug!(factory_count = factories.len(), "ICE server factory added");
    }

    /// Remove the first occurrence of this exact factory
    ///
    /// Returns `false` if it was not registered.
    pub fn remove(&self, factory: &IceServerFactoryHandle) -> bool {
        let mut factories = self.factories.lock();

        match factories.iter().position(|f| same_factory(f, factory)) {
            Some(index) => {
                factories.remove(index);
                tracing::debug!(factory_count = factories.len(), "ICE server factory removed");
                true
            }
            None => {
                tracing::debug!("ICE server factory already removed");
                false
            }
        }
    }

    /// Number of registered factories
    pub fn len(&self) -> usize {
        self.factories.lock().len()
    }

    /// Whether no factories are registered
    pub fn is_empty(&self) -> bool {
        self.factories.lock().is_empty()
    }

    /// Call every factory concurrently and collect the results
    ///
    /// Servers appear in registration order regardless of which factory
    /// finishes first.
    pub async fn aggregate(&self) -> RtcConfiguration {
        let snapshot: Vec<IceServerFactoryHandle> = self.factories.lock().clone();
        let servers = join_all(snapshot.iter().map(|factory| factory.ice_server())).await;

        tracing::trace!(server_count = servers.len(), "ICE servers aggregated");
        RtcConfiguration::from_servers(servers)
    }
}

/// Token returned by [`WebRtcRegistry::register_ice_server`]
///
/// Dropping the token keeps the factory registered; call
/// [`unregister`](Self::unregister) to remove it.
#[must_use = "dropping the registration leaves the factory registered forever"]
pub struct IceServerRegistration {
    registry: Weak<WebRtcRegistry>,
    factory: IceServerFactoryHandle,
    removed: AtomicBool,
}

impl IceServerRegistration {
    pub(super) fn new(registry: Weak<WebRtcRegistry>, factory: IceServerFactoryHandle) -> Self {
        Self {
            registry,
            factory,
            removed: AtomicBool::new(false),
        }
    }

    /// Remove the factory; later calls do nothing
    pub fn unregister(&self) {
        if self.removed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.ice_servers().remove(&self.factory);
        }
    }
}

impl std::fmt::Debug for IceServerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IceServerRegistration")
            .field("removed", &self.removed.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    struct CountingFactory {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IceServerFactory for CountingFactory {
        async fn ice_server(&self) -> RtcIceServer {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            RtcIceServer::new(["turn:turn.example.com"])
                .username(format!("user-{n}"))
                .credential("secret")
        }
    }

    fn delayed(url: &'static str, delay_ms: u64) -> IceServerFactoryHandle {
        Arc::new(move || async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            RtcIceServer::new([url])
        })
    }

    #[tokio::test]
    async fn test_empty_aggregate_omits_field() {
        let registry = IceServerRegistry::new();

        let config = registry.aggregate().await;

        assert!(config.ice_servers.is_none());
        assert_eq!(config.to_json(), json!({}));
    }

    #[tokio::test]
    async fn test_aggregate_keeps_registration_order() {
        let registry = IceServerRegistry::new();
        let a: IceServerFactoryHandle = Arc::new(|| async { RtcIceServer::new(["a"]) });
        let b: IceServerFactoryHandle =
            Arc::new(|| async { RtcIceServer::new(["b"]).username("u") });
        let c: IceServerFactoryHandle =
            Arc::new(|| async { RtcIceServer::new(["c"]).credential("c") });
        registry.push(a);
        registry.push(b);
        registry.push(c);

        let config = registry.aggregate().await;

        assert_eq!(
            config.to_json(),
            json!({
                "iceServers": [
                    { "urls": ["a"] },
                    { "urls": ["b"], "username": "u" },
                    { "urls": ["c"], "credential": "c" }
                ]
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_aggregate_order_ignores_latency() {
        let registry = IceServerRegistry::new();
        registry.push(delayed("slow", 30));
        registry.push(delayed("medium", 20));
        registry.push(delayed("fast", 10));

        let config = registry.aggregate().await;
        let urls: Vec<String> = config
            .ice_servers
            .unwrap()
            .into_iter()
            .flat_map(|s| s.urls)
            .collect();

        assert_eq!(urls, ["slow", "medium", "fast"]);
    }

    #[tokio::test]
    async fn test_factories_called_on_every_aggregate() {
        let registry = IceServerRegistry::new();
        let factory = Arc::new(CountingFactory {
            calls: AtomicUsize::new(0),
        });
        registry.push(factory.clone());

        registry.aggregate().await;
        let config = registry.aggregate().await;

        assert_eq!(factory.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            config.ice_servers.unwrap()[0].username.as_deref(),
            Some("user-1")
        );
    }

    #[test]
    fn test_remove_exact_reference() {
        let registry = IceServerRegistry::new();
        let a: IceServerFactoryHandle = Arc::new(|| async { RtcIceServer::new(["a"]) });
        let b: IceServerFactoryHandle = Arc::new(|| async { RtcIceServer::new(["a"]) });
        registry.push(a.clone());
        registry.push(a.clone());

        assert!(!registry.remove(&b));
        assert!(registry.remove(&a));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(&a));
        assert!(!registry.remove(&a));
        assert!(registry.is_empty());
    }
}
