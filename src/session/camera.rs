//! Per-camera WebRTC session
//!
//! Wraps a [`CameraSource`] with the providers currently supporting it and
//! drives offers through the first of them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::source::CameraSource;
use super::state::{NegotiationPhase, NegotiationState};
use crate::error::{Error, Result};
use crate::provider::{same_provider, ProviderHandle};
use crate::registry::store::Selection;
use crate::registry::WebRtcRegistry;
use crate::rtc::{RtcConfiguration, StreamType};

/// A stored selection and the resolve that produced it
struct ResolvedView {
    selection: Selection,
    sequence: u64,
}

/// WebRTC view of one camera
pub struct CameraSession {
    /// The camera entity
    source: Arc<dyn CameraSource>,

    /// Registry used for selection and ICE servers
    registry: Arc<WebRtcRegistry>,

    /// Providers supporting this camera; `None` until first resolved
    providers: Mutex<Option<ResolvedView>>,

    /// Stamped on every resolve, in start order
    resolve_sequence: AtomicU64,

    /// Negotiation state
    state: Mutex<NegotiationState>,
}

impl CameraSession {
    /// Create a session for a camera
    pub fn new(source: Arc<dyn CameraSource>, registry: Arc<WebRtcRegistry>) -> Self {
        Self {
            source,
            registry,
            providers: Mutex::new(None),
            resolve_sequence: AtomicU64::new(0),
            state: Mutex::new(NegotiationState::new()),
        }
    }

    /// The camera's entity id
    pub fn entity_id(&self) -> &str {
        self.source.entity_id()
    }

    /// The wrapped camera
    pub fn source(&self) -> &Arc<dyn CameraSource> {
        &self.source
    }

    /// Providers from the last refresh, in selection order
    pub fn supported_providers(&self) -> Vec<ProviderHandle> {
        self.providers
            .lock()
            .as_ref()
            .map(|view| view.selection.providers.clone())
            .unwrap_or_default()
    }

    /// How the frontend should stream this camera
    pub fn frontend_stream_type(&self) -> StreamType {
        if self.supported_providers().is_empty() {
            StreamType::Hls
        } else {
            StreamType::WebRtc
        }
    }

    /// Current negotiation phase
    pub fn phase(&self) -> NegotiationPhase {
        self.state.lock().phase
    }

    /// Terminal phase of the last negotiation
    pub fn last_outcome(&self) -> Option<NegotiationPhase> {
        self.state.lock().last_outcome
    }

    /// Offers received and offers answered
    pub fn offer_counts(&self) -> (u64, u64) {
        let state = self.state.lock();
        (state.offers, state.answers)
    }

    /// Re-run provider selection for the camera's current stream source
    ///
    /// An offer already being negotiated keeps its provider; the new list
    /// only applies to the next offer.
    pub async fn refresh_providers(&self) -> Result<()> {
        self.state.lock().begin_refresh();
        let result = self.resolve().await;
        self.state.lock().end_refresh();
        result.map(|_| ())
    }

    /// Resolve and store the supported providers
    ///
    /// A missing or empty stream source supports no provider.
    async fn resolve(&self) -> Result<Vec<ProviderHandle>> {
        let sequence = self.resolve_sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let stream_source = self
            .source
            .stream_source()
            .await
            .filter(|source| !source.is_empty());
        let selection = match stream_source {
            Some(stream_source) => self.registry.select(&stream_source).await?,
            None => Selection {
                generation: self.registry.generation(),
                providers: Vec::new(),
            },
        };

        Ok(self.store_selection(selection, sequence))
    }

    /// Keep `selection` unless a newer one is already stored
    ///
    /// Views are ordered by registry generation, then by the order their
    /// resolves started.
    fn store_selection(&self, selection: Selection, sequence: u64) -> Vec<ProviderHandle> {
        let mut cached = self.providers.lock();

        if let Some(current) = cached.as_ref() {
            if (current.selection.generation, current.sequence) > (selection.generation, sequence) {
                return current.selection.providers.clone();
            }
        }

        let changed = cached.as_ref().map_or(true, |current| {
            let current = &current.selection.providers;
            current.len() != selection.providers.len()
                || current
                    .iter()
                    .zip(&selection.providers)
                    .any(|(a, b)| !same_provider(a, b))
        });
        if changed {
            tracing::debug!(
                entity_id = self.entity_id(),
                provider_count = selection.providers.len(),
                "WebRTC providers changed"
            );
        }

        let providers = selection.providers.clone();
        *cached = Some(ResolvedView {
            selection,
            sequence,
        });
        providers
    }

    /// First supported provider, resolving once if never resolved
    async fn first_provider(&self) -> Result<Option<ProviderHandle>> {
        let cached = self
            .providers
            .lock()
            .as_ref()
            .map(|view| view.selection.providers.first().cloned());

        match cached {
            Some(first) => Ok(first),
            None => Ok(self.resolve().await?.into_iter().next()),
        }
    }

    /// Handle a WebRTC offer
    ///
    /// Returns the SDP answer, or `None` when no provider supports the camera
    /// or the selected provider declines. A provider error is returned as
    /// [`Error::Negotiation`] holding the provider's own error. There is no
    /// fallback to the next provider.
    pub async fn handle_offer(&self, offer_sdp: &str) -> Result<Option<String>> {
        self.state.lock().begin_offer();

        let provider = match self.first_provider().await {
            Ok(provider) => provider,
            Err(e) => {
                self.state.lock().fail_resolving();
                return Err(e);
            }
        };

        self.state.lock().begin_negotiating();

        let Some(provider) = provider else {
            tracing::debug!(entity_id = self.entity_id(), "No WebRTC provider for camera");
            self.state.lock().finish(NegotiationPhase::Ineligible);
            return Ok(None);
        };

        let domain = provider.domain().unwrap_or("unnamed");
        tracing::debug!(
            entity_id = self.entity_id(),
            domain = domain,
            "Negotiating WebRTC offer"
        );

        match provider.handle_offer(self.source.as_ref(), offer_sdp).await {
            Ok(Some(answer)) => {
                self.state.lock().finish(NegotiationPhase::Answered);
                Ok(Some(answer))
            }
            Ok(None) => {
                tracing::debug!(entity_id = self.entity_id(), "Offer not eligible");
                self.state.lock().finish(NegotiationPhase::Ineligible);
                Ok(None)
            }
            Err(e) => {
                tracing::debug!(
                    entity_id = self.entity_id(),
                    domain = domain,
                    error = %e,
                    "WebRTC negotiation failed"
                );
                self.state.lock().finish(NegotiationPhase::Failed);
                Err(Error::Negotiation(e))
            }
        }
    }

    /// WebRTC configuration for a client connecting to this camera
    pub async fn webrtc_configuration(&self) -> RtcConfiguration {
        self.registry.ice_servers().aggregate().await
    }
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("entity_id", &self.entity_id())
            .field("phase", &self.phase())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{oneshot, Notify, Semaphore};

    use super::*;
    use crate::error::BoxError;
    use crate::provider::testing::{as_handle, FakeProvider};
    use crate::provider::WebRtcProvider;
    use crate::registry::RegistryConfig;
    use crate::rtc::RtcIceServer;
    use crate::session::testing::FakeCamera;
    use crate::session::CameraComponent;
    use crate::task::testing::ManualSpawner;

    struct Setup {
        registry: Arc<WebRtcRegistry>,
        _component: Arc<CameraComponent>,
        spawner: Arc<ManualSpawner>,
    }

    fn setup() -> Setup {
        let spawner = Arc::new(ManualSpawner::default());
        let registry = WebRtcRegistry::with_spawner(
            RegistryConfig::default().disable_refresh_on_load(),
            spawner.clone(),
        );
        let component = Arc::new(CameraComponent::new());
        registry.load(&component);
        Setup {
            registry,
            _component: component,
            spawner,
        }
    }

    fn session(setup: &Setup, source: Option<&str>) -> CameraSession {
        CameraSession::new(
            Arc::new(FakeCamera::new("camera.porch", source)),
            setup.registry.clone(),
        )
    }

    #[tokio::test]
    async fn test_first_supported_provider_answers() {
        let setup = setup();
        let declines = FakeProvider::new("declines").unsupported().handle();
        let first = FakeProvider::new("first").handle();
        let second = FakeProvider::new("second").handle();
        for p in [&declines, &first, &second] {
            let _ = setup.registry.register_provider(as_handle(p)).unwrap();
        }
        let session = session(&setup, Some("rtsp://cam/1"));

        let answer = session.handle_offer("v=0 offer").await.unwrap();

        assert_eq!(answer.as_deref(), Some("answer-from-first"));
        assert_eq!(first.offer_count(), 1);
        assert_eq!(second.offer_count(), 0);
        assert_eq!(declines.offer_count(), 0);
        assert_eq!(session.phase(), NegotiationPhase::Idle);
        assert_eq!(session.last_outcome(), Some(NegotiationPhase::Answered));
        assert_eq!(session.frontend_stream_type(), StreamType::WebRtc);
    }

    #[tokio::test]
    async fn test_no_provider_is_ineligible() {
        let setup = setup();
        let session = session(&setup, Some("rtsp://cam/1"));

        let answer = session.handle_offer("v=0 offer").await.unwrap();

        assert!(answer.is_none());
        assert_eq!(session.last_outcome(), Some(NegotiationPhase::Ineligible));
        assert_eq!(session.frontend_stream_type(), StreamType::Hls);
    }

    #[tokio::test]
    async fn test_missing_stream_source_has_no_providers() {
        let setup = setup();
        let provider = FakeProvider::new("a").handle();
        let _ = setup.registry.register_provider(as_handle(&provider)).unwrap();
        let session = session(&setup, None);

        session.refresh_providers().await.unwrap();

        assert!(session.supported_providers().is_empty());
        assert!(session.handle_offer("v=0").await.unwrap().is_none());
        assert_eq!(provider.offer_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_declining_is_ineligible() {
        let setup = setup();
        let provider = FakeProvider::new("a").no_answer().handle();
        let _ = setup.registry.register_provider(as_handle(&provider)).unwrap();
        let session = session(&setup, Some("rtsp://cam/1"));

        assert!(session.handle_offer("v=0").await.unwrap().is_none());
        assert_eq!(session.last_outcome(), Some(NegotiationPhase::Ineligible));
    }

    #[tokio::test]
    async fn test_failure_does_not_fall_back() {
        let setup = setup();
        let broken = FakeProvider::new("broken").failing_offer().handle();
        let backup = FakeProvider::new("backup").handle();
        let _ = setup.registry.register_provider(as_handle(&broken)).unwrap();
        let _ = setup.registry.register_provider(as_handle(&backup)).unwrap();
        let session = session(&setup, Some("rtsp://cam/1"));

        let err = session.handle_offer("v=0").await.unwrap_err();

        assert!(err.is_negotiation());
        assert_eq!(err.to_string(), "broken negotiation failed");
        assert_eq!(backup.offer_count(), 0);
        assert_eq!(session.last_outcome(), Some(NegotiationPhase::Failed));
        assert_eq!(session.phase(), NegotiationPhase::Idle);
    }

    #[tokio::test]
    async fn test_cached_providers_used_until_refresh() {
        let setup = setup();
        let a = FakeProvider::new("a").handle();
        let b = FakeProvider::new("b").handle();
        let reg_a = setup.registry.register_provider(as_handle(&a)).unwrap();
        let session = session(&setup, Some("rtsp://cam/1"));
        session.refresh_providers().await.unwrap();

        reg_a.unregister();
        let _ = setup.registry.register_provider(as_handle(&b)).unwrap();

        // Broadcast has not run yet
        assert_eq!(
            session.handle_offer("v=0").await.unwrap().as_deref(),
            Some("answer-from-a")
        );

        session.refresh_providers().await.unwrap();
        assert_eq!(
            session.handle_offer("v=0").await.unwrap().as_deref(),
            Some("answer-from-b")
        );
        assert_eq!(session.offer_counts(), (2, 2));
        setup.spawner.run_all().await;
    }

    #[tokio::test]
    async fn test_stale_refresh_does_not_overwrite_newer_view() {
        let setup = setup();
        let a = FakeProvider::new("a").handle();
        let _ = setup.registry.register_provider(as_handle(&a)).unwrap();
        let session = session(&setup, Some("rtsp://cam/1"));

        let stale = setup.registry.select("rtsp://cam/1").await.unwrap();
        let b = FakeProvider::new("b").handle();
        let _ = setup.registry.register_provider(as_handle(&b)).unwrap();
        session.refresh_providers().await.unwrap();
        assert_eq!(session.supported_providers().len(), 2);

        // A refresh that snapshotted before the last registration lands late
        let kept = session.store_selection(stale, 0);
        assert_eq!(kept.len(), 2);
        assert_eq!(session.supported_providers().len(), 2);
    }

    #[tokio::test]
    async fn test_same_generation_keeps_later_resolve() {
        let setup = setup();
        let a = FakeProvider::new("a").handle();
        let _ = setup.registry.register_provider(as_handle(&a)).unwrap();
        let session = session(&setup, Some("rtsp://cam/1"));

        let earlier = setup.registry.select("rtsp://cam/1").await.unwrap();
        let later = Selection {
            generation: earlier.generation,
            providers: Vec::new(),
        };

        // The later resolve saw a cleared stream source and finished first
        session.store_selection(later, 2);
        let kept = session.store_selection(earlier, 1);

        assert!(kept.is_empty());
        assert!(session.supported_providers().is_empty());
    }

    #[tokio::test]
    async fn test_empty_stream_source_has_no_providers() {
        let setup = setup();
        let provider = FakeProvider::new("a").handle();
        let _ = setup.registry.register_provider(as_handle(&provider)).unwrap();
        let session = session(&setup, Some(""));

        session.refresh_providers().await.unwrap();

        assert!(session.supported_providers().is_empty());
        assert!(session.handle_offer("v=0").await.unwrap().is_none());
        assert_eq!(provider.offer_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_follows_stream_source_changes() {
        let setup = setup();
        let provider = FakeProvider::new("a").handle();
        let _ = setup.registry.register_provider(as_handle(&provider)).unwrap();
        let camera = Arc::new(FakeCamera::new("camera.porch", Some("rtsp://cam/1")));
        let session = CameraSession::new(camera.clone(), setup.registry.clone());

        session.refresh_providers().await.unwrap();
        assert_eq!(session.supported_providers().len(), 1);

        camera.set_stream_source(None);
        session.refresh_providers().await.unwrap();
        assert!(session.supported_providers().is_empty());
        assert_eq!(session.frontend_stream_type(), StreamType::Hls);
    }

    /// Provider whose negotiation blocks until released
    struct GatedProvider {
        entered: Arc<Notify>,
        release: Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl WebRtcProvider for GatedProvider {
        async fn is_supported(&self, _stream_source: &str) -> std::result::Result<bool, BoxError> {
            Ok(true)
        }

        async fn handle_offer(
            &self,
            _camera: &dyn CameraSource,
            _offer_sdp: &str,
        ) -> std::result::Result<Option<String>, BoxError> {
            let release = self.release.lock().take();
            self.entered.notify_one();
            if let Some(release) = release {
                let _ = release.await;
            }
            Ok(Some("gated-answer".into()))
        }
    }

    #[tokio::test]
    async fn test_refresh_during_negotiation_does_not_interrupt() {
        let setup = setup();
        let entered = Arc::new(Notify::new());
        let (release_tx, release_rx) = oneshot::channel();
        let gated = Arc::new(GatedProvider {
            entered: entered.clone(),
            release: Mutex::new(Some(release_rx)),
        });
        let reg = setup.registry.register_provider(gated.clone()).unwrap();
        let session = Arc::new(session(&setup, Some("rtsp://cam/1")));

        let in_flight = {
            let session = session.clone();
            tokio::spawn(async move { session.handle_offer("v=0").await })
        };
        entered.notified().await;
        assert_eq!(session.phase(), NegotiationPhase::Negotiating);

        reg.unregister();
        session.refresh_providers().await.unwrap();
        assert!(session.supported_providers().is_empty());
        assert_eq!(session.phase(), NegotiationPhase::Negotiating);

        release_tx.send(()).unwrap();
        let answer = in_flight.await.unwrap().unwrap();

        assert_eq!(answer.as_deref(), Some("gated-answer"));
        assert_eq!(session.phase(), NegotiationPhase::Idle);
        assert!(session.handle_offer("v=0").await.unwrap().is_none());
    }

    /// Camera whose stream source lookups wait for a permit each
    struct GatedCamera {
        entered: Arc<Notify>,
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl CameraSource for GatedCamera {
        fn entity_id(&self) -> &str {
            "camera.gated"
        }

        async fn stream_source(&self) -> Option<String> {
            self.entered.notify_one();
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
            Some("rtsp://cam/1".into())
        }
    }

    #[tokio::test]
    async fn test_offer_negotiates_after_overlapping_refresh_ends() {
        let setup = setup();
        let provider_entered = Arc::new(Notify::new());
        let (release_tx, release_rx) = oneshot::channel();
        let gated = Arc::new(GatedProvider {
            entered: provider_entered.clone(),
            release: Mutex::new(Some(release_rx)),
        });
        let _reg = setup.registry.register_provider(gated).unwrap();

        let lookup_entered = Arc::new(Notify::new());
        let gate = Arc::new(Semaphore::new(0));
        let session = Arc::new(CameraSession::new(
            Arc::new(GatedCamera {
                entered: lookup_entered.clone(),
                gate: gate.clone(),
            }),
            setup.registry.clone(),
        ));

        let refresh = {
            let session = session.clone();
            tokio::spawn(async move { session.refresh_providers().await })
        };
        lookup_entered.notified().await;

        let offer = {
            let session = session.clone();
            tokio::spawn(async move { session.handle_offer("v=0").await })
        };
        lookup_entered.notified().await;

        gate.add_permits(1);
        refresh.await.unwrap().unwrap();
        assert_eq!(session.phase(), NegotiationPhase::Resolving);

        gate.add_permits(1);
        provider_entered.notified().await;
        assert_eq!(session.phase(), NegotiationPhase::Negotiating);

        release_tx.send(()).unwrap();
        let answer = offer.await.unwrap().unwrap();

        assert_eq!(answer.as_deref(), Some("gated-answer"));
        assert_eq!(session.phase(), NegotiationPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_webrtc_configuration_aggregates_ice_servers() {
        let setup = setup();
        let session = session(&setup, Some("rtsp://cam/1"));
        let _stun = setup
            .registry
            .register_ice_server(Arc::new(|| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                RtcIceServer::new(["stun:stun.example.com"])
            }))
            .unwrap();

        let config = session.webrtc_configuration().await;

        assert_eq!(config.server_count(), 1);
        assert_eq!(setup.registry.ice_servers().len(), 1);
    }
}
