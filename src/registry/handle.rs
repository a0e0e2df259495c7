//! Provider registration token

use std::sync::Weak;

use super::store::WebRtcRegistry;
use crate::provider::ProviderHandle;

/// Token returned by [`WebRtcRegistry::register_provider`]
///
/// The registrant holds no reference into the registry besides this token.
/// Calling [`unregister`](Self::unregister) discards the provider and
/// schedules a refresh of every camera; calling it again, or after the
/// provider was removed some other way, only schedules another refresh.
#[must_use = "dropping the registration leaves the provider registered forever"]
pub struct ProviderRegistration {
    registry: Weak<WebRtcRegistry>,
    provider: ProviderHandle,
}

impl ProviderRegistration {
    pub(super) fn new(registry: Weak<WebRtcRegistry>, provider: ProviderHandle) -> Self {
        Self { registry, provider }
    }

    /// The registered provider
    pub fn provider(&self) -> &ProviderHandle {
        &self.provider
    }

    /// Remove the provider from the registry
    pub fn unregister(&self) {
        let Some(registry) = self.registry.upgrade() else {
            tracing::debug!("Registry gone, nothing to unregister");
            return;
        };

        registry.remove_provider(&self.provider);
        registry.schedule_refresh("unregister");
    }
}

impl std::fmt::Debug for ProviderRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistration")
            .field("registry_alive", &(self.registry.strong_count() > 0))
            .finish()
    }
}
