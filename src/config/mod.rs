//! Configuration layer
//!
//! Pluggable key/value providers with typed parsing, defaults, composite
//! fallback, caching, and access recording. A single process-wide
//! [`ConfigInspector`] wraps the active provider; [`install`] swaps the
//! provider (with a fresh cache and log) and [`reset`] restores the
//! environment-backed default, which tests use for isolation.

mod inspector;
pub mod parser;
mod provider;

use std::sync::{Arc, LazyLock, RwLock};

pub use inspector::{ConfigAccess, ConfigInspector};
pub use parser::{parse, parse_duration, register_parser};
pub use provider::{CompositeProvider, ConfigProvider, EnvProvider};

static ACTIVE: LazyLock<RwLock<Arc<ConfigInspector>>> =
    LazyLock::new(|| RwLock::new(Arc::new(ConfigInspector::new(Arc::new(EnvProvider)))));

/// The process-wide inspector wrapping the active provider.
pub fn inspector() -> Arc<ConfigInspector> {
    ACTIVE.read().unwrap().clone()
}

/// Install `provider` as the active source, behind a fresh inspector.
pub fn install(provider: Arc<dyn ConfigProvider>) {
    *ACTIVE.write().unwrap() = Arc::new(ConfigInspector::new(provider));
}

/// Restore a fresh environment-backed inspector. Intended for test
/// isolation.
pub fn reset() {
    install(Arc::new(EnvProvider));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;

    #[test]
    fn install_swaps_the_active_provider() {
        let scope = Scope::background();
        install(Arc::new(EnvProvider));
        let first = inspector();
        assert_eq!(first.provider_name(), "env");

        unsafe { std::env::set_var("HEARTH_CONFIG_MOD_TEST", "on") };
        assert_eq!(
            first.get_raw(&scope, "HEARTH_CONFIG_MOD_TEST").unwrap(),
            "on"
        );

        reset();
        // A reset returns a fresh inspector with an empty log.
        assert!(inspector().accesses().is_empty());
    }
}
