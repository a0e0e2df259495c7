//! Registry configuration

/// What selection does when a provider's capability check fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapabilityFailurePolicy {
    /// Treat the failing provider as unsupported and keep going
    #[default]
    Exclude,
    /// Fail the whole selection with the check's error
    Abort,
}

/// Registry configuration options
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Handling of capability checks that return an error
    pub capability_failure_policy: CapabilityFailurePolicy,

    /// Refresh every camera once when a component is attached
    pub refresh_on_load: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capability_failure_policy: CapabilityFailurePolicy::Exclude,
            refresh_on_load: true,
        }
    }
}

impl RegistryConfig {
    /// Set the capability failure policy
    pub fn capability_failure_policy(mut self, policy: CapabilityFailurePolicy) -> Self {
        self.capability_failure_policy = policy;
        self
    }

    /// Abort selection when any capability check fails
    pub fn abort_on_capability_failure(self) -> Self {
        self.capability_failure_policy(CapabilityFailurePolicy::Abort)
    }

    /// Skip the refresh broadcast normally sent when a component is attached
    pub fn disable_refresh_on_load(mut self) -> Self {
        self.refresh_on_load = false;
        self
    }
}
