//! WebRTC registry implementation
//!
//! Holds the registered providers and ICE server factories for one camera
//! component and broadcasts a provider refresh to every camera whenever the
//! provider set changes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::join_all;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};

use super::config::{CapabilityFailurePolicy, RegistryConfig};
use super::handle::ProviderRegistration;
use super::ice::{IceServerFactoryHandle, IceServerRegistration, IceServerRegistry};
use crate::error::{BoxError, Error, Result};
use crate::provider::{same_provider, ProviderHandle, RtspToWebRtcProvider};
use crate::session::CameraComponent;
use crate::task::{Spawn, TokioSpawner};

/// Providers supporting a stream source, tagged with the registry
/// generation the provider snapshot was taken at
#[derive(Clone)]
pub(crate) struct Selection {
    pub(crate) generation: u64,
    pub(crate) providers: Vec<ProviderHandle>,
}

/// Central registry for WebRTC providers and ICE servers
///
/// Every mutation happens under a short synchronous lock that is never held
/// across an `.await`. Readers work on a cloned snapshot, so a registration
/// change never disturbs a selection or negotiation already running.
pub struct WebRtcRegistry {
    /// Registered providers in registration order, no duplicates
    providers: Mutex<Vec<ProviderHandle>>,

    /// Bumped on every provider set mutation
    generation: AtomicU64,

    /// Registered ICE server factories
    ice_servers: IceServerRegistry,

    /// Camera component whose sessions are refreshed; `None` until loaded
    component: RwLock<Option<Weak<CameraComponent>>>,

    /// Where refresh broadcasts run
    spawner: Arc<dyn Spawn>,

    /// Configuration
    config: RegistryConfig,
}

impl WebRtcRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Arc<Self> {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Arc<Self> {
        Self::with_spawner(config, Arc::new(TokioSpawner))
    }

    /// Create a new registry that runs refresh broadcasts through `spawner`
    pub fn with_spawner(config: RegistryConfig, spawner: Arc<dyn Spawn>) -> Arc<Self> {
        Arc::new(Self {
            providers: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
            ice_servers: IceServerRegistry::new(),
            component: RwLock::new(None),
            spawner,
            config,
        })
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Attach the camera component; registrations are rejected before this
    ///
    /// The registry keeps only a weak reference, the host owns the component.
    pub fn load(self: &Arc<Self>, component: &Arc<CameraComponent>) {
        *self.component.write() = Some(Arc::downgrade(component));

        tracing::info!(cameras = component.len(), "Camera component loaded");

        if self.config.refresh_on_load {
            self.schedule_refresh("load");
        }
    }

    /// Whether a live camera component is attached
    pub fn is_loaded(&self) -> bool {
        self.component().is_some()
    }

    fn component(&self) -> Option<Arc<CameraComponent>> {
        self.component.read().as_ref().and_then(Weak::upgrade)
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.is_loaded() {
            Ok(())
        } else {
            Err(Error::NotLoaded)
        }
    }

    /// Register a WebRTC provider
    ///
    /// The first provider to support a camera's stream source will handle its
    /// offers. Registering a provider that is already present keeps its
    /// position but still triggers a refresh. The refresh runs in the
    /// background; it may not have finished when this returns.
    pub fn register_provider(
        self: &Arc<Self>,
        provider: ProviderHandle,
    ) -> Result<ProviderRegistration> {
        self.ensure_loaded()?;

        let (inserted, provider_count) = {
            let mut providers = self.providers.lock();
            let inserted = !providers.iter().any(|p| same_provider(p, &provider));
            if inserted {
                providers.push(Arc::clone(&provider));
            }
            self.generation.fetch_add(1, Ordering::SeqCst);
            (inserted, providers.len())
        };

        tracing::info!(
            inserted = inserted,
            provider_count = provider_count,
            "WebRTC provider registered"
        );

        self.schedule_refresh("register");
        Ok(ProviderRegistration::new(Arc::downgrade(self), provider))
    }

    /// Register an RTSP-to-WebRTC callback for `domain`
    ///
    /// The callback is wrapped in an [`RtspToWebRtcProvider`] tagged with
    /// `domain` and registered like any other provider.
    pub fn register_rtsp_to_webrtc_provider<F, Fut>(
        self: &Arc<Self>,
        domain: &str,
        callback: F,
    ) -> Result<ProviderRegistration>
    where
        F: Fn(String, String, String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = std::result::Result<Option<String>, BoxError>>
            + Send
            + 'static,
    {
        tracing::debug!(domain = domain, "Registering RTSP-to-WebRTC provider");
        self.register_provider(Arc::new(
            RtspToWebRtcProvider::new(callback).with_domain(domain),
        ))
    }

    /// Discard a provider; returns whether it was registered
    pub(super) fn remove_provider(&self, provider: &ProviderHandle) -> bool {
        let (removed, provider_count) = {
            let mut providers = self.providers.lock();
            let before = providers.len();
            providers.retain(|p| !same_provider(p, provider));
            self.generation.fetch_add(1, Ordering::SeqCst);
            (providers.len() != before, providers.len())
        };

        if removed {
            tracing::info!(provider_count = provider_count, "WebRTC provider unregistered");
        } else {
            tracing::debug!("WebRTC provider already unregistered");
        }
        removed
    }

    /// Snapshot of the registered providers in registration order
    pub fn providers(&self) -> Vec<ProviderHandle> {
        self.providers.lock().clone()
    }

    /// Number of registered providers
    pub fn provider_count(&self) -> usize {
        self.providers.lock().len()
    }

    /// Whether this exact provider is registered
    pub fn contains(&self, provider: &ProviderHandle) -> bool {
        self.providers
            .lock()
            .iter()
            .any(|p| same_provider(p, provider))
    }

    /// Current provider set generation
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Providers that support `stream_source`, in registration order
    ///
    /// All capability checks run concurrently. The result follows
    /// registration order, not the order in which the checks complete.
    pub async fn supported_providers(&self, stream_source: &str) -> Result<Vec<ProviderHandle>> {
        Ok(self.select(stream_source).await?.providers)
    }

    pub(crate) async fn select(&self, stream_source: &str) -> Result<Selection> {
        let (generation, snapshot) = {
            let providers = self.providers.lock();
            (self.generation.load(Ordering::SeqCst), providers.clone())
        };

        let checks = join_all(snapshot.iter().map(|p| p.is_supported(stream_source))).await;

        let mut providers = Vec::with_capacity(snapshot.len());
        for (provider, check) in snapshot.into_iter().zip(checks) {
            match check {
                Ok(true) => providers.push(provider),
                Ok(false) => {}
                Err(source) => match self.config.capability_failure_policy {
                    CapabilityFailurePolicy::Exclude => {
                        tracing::warn!(
                            stream_source = stream_source,
                            error = %source,
                            "Capability check failed, skipping provider"
                        );
                    }
                    CapabilityFailurePolicy::Abort => {
                        return Err(Error::CapabilityCheck {
                            stream_source: stream_source.to_string(),
                            source,
                        });
                    }
                },
            }
        }

        tracing::trace!(
            stream_source = stream_source,
            supported = providers.len(),
            generation = generation,
            "Provider selection complete"
        );

        Ok(Selection {
            generation,
            providers,
        })
    }

    /// Register an ICE server factory
    ///
    /// The factory is called every time a camera's WebRTC configuration is
    /// requested; the registrant is responsible for any caching.
    pub fn register_ice_server(
        self: &Arc<Self>,
        factory: IceServerFactoryHandle,
    ) -> Result<IceServerRegistration> {
        self.ensure_loaded()?;

        self.ice_servers.push(Arc::clone(&factory));
        Ok(IceServerRegistration::new(Arc::downgrade(self), factory))
    }

    /// The ICE server factories
    pub fn ice_servers(&self) -> &IceServerRegistry {
        &self.ice_servers
    }

    /// Refresh the supported providers of every camera and wait for it
    pub async fn refresh_sessions(&self) {
        match self.component() {
            Some(component) => component.refresh_all().await,
            None => tracing::debug!("No camera component, skipping provider refresh"),
        }
    }

    /// Spawn a provider refresh in the background
    pub(super) fn schedule_refresh(self: &Arc<Self>, reason: &'static str) {
        let registry = Arc::clone(self);

        tracing::trace!(reason = reason, "Scheduling provider refresh");
        self.spawner.spawn(
            "webrtc_provider_refresh",
            async move {
                registry.refresh_sessions().await;
            }
            .boxed(),
        );
    }
}
