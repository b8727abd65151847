//! Bridge configuration.

use std::env;

/// What to do after an integrity error has been logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrityPolicy {
    /// Abort the process. Continuing with diverged identity tables is unsafe.
    #[default]
    Abort,
    /// Record the error and continue. Intended for tests and tooling.
    Report,
}

/// Settings for a [`Bridge`](crate::Bridge).
///
/// # Example
///
/// ```
/// use hostbind::{BridgeConfig, IntegrityPolicy};
///
/// let config = BridgeConfig::default()
///     .with_integrity_policy(IntegrityPolicy::Report)
///     .with_framework_proxy_cache(true);
/// assert!(config.cache_framework_proxies);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub integrity_policy: IntegrityPolicy,
    /// Keep decoded framework proxies in the framework table. Proxies are
    /// immutable, so this only saves host round trips.
    pub cache_framework_proxies: bool,
    /// Number of integrity errors kept for inspection.
    pub diagnostics_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            integrity_policy: IntegrityPolicy::Abort,
            cache_framework_proxies: false,
            diagnostics_capacity: 64,
        }
    }
}

impl BridgeConfig {
    pub const ENV_INTEGRITY_POLICY: &'static str = "HOSTBIND_INTEGRITY_POLICY";
    pub const ENV_CACHE_PROXIES: &'static str = "HOSTBIND_CACHE_PROXIES";

    /// Defaults overridden by `HOSTBIND_INTEGRITY_POLICY` (`abort` / `report`)
    /// and `HOSTBIND_CACHE_PROXIES` (`1` / `true`). Unrecognized values are
    /// ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(policy) = lookup(Self::ENV_INTEGRITY_POLICY) {
            match policy.trim().to_ascii_lowercase().as_str() {
                "abort" => config.integrity_policy = IntegrityPolicy::Abort,
                "report" => config.integrity_policy = IntegrityPolicy::Report,
                other => tracing::warn!(value = other, "ignoring unknown integrity policy"),
            }
        }
        if let Some(cache) = lookup(Self::ENV_CACHE_PROXIES) {
            config.cache_framework_proxies = matches!(cache.trim(), "1" | "true" | "yes");
        }
        config
    }

    pub fn with_integrity_policy(mut self, policy: IntegrityPolicy) -> Self {
        self.integrity_policy = policy;
        self
    }

    pub fn with_framework_proxy_cache(mut self, enabled: bool) -> Self {
        self.cache_framework_proxies = enabled;
        self
    }

    pub fn with_diagnostics_capacity(mut self, capacity: usize) -> Self {
        self.diagnostics_capacity = capacity;
        self
    }
}
