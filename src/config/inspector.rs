//! Provider inspector
//!
//! Wraps a provider with a per-key value cache and an access log. The first
//! successful lookup of a key memoizes its value; later reads are served
//! from the cache without touching the provider. Every access, including
//! cache hits and default fallbacks, lands in the log with a monotonic
//! sequence number.

use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde::Serialize;

use super::parser;
use super::provider::ConfigProvider;
use crate::error::Result;
use crate::scope::Scope;

/// Record of one configuration access.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigAccess {
    pub key: String,
    /// Label of the provider that served the value; empty when a default
    /// was used instead.
    pub provider: String,
    pub used_default: bool,
    pub file: String,
    pub line: u32,
    /// Type name of the component whose injection drove the access, when
    /// the access came from field injection.
    pub owner: Option<String>,
    pub seq: u64,
}

/// Caching, access-recording wrapper over a [`ConfigProvider`].
pub struct ConfigInspector {
    provider: Arc<dyn ConfigProvider>,
    cache: DashMap<String, (String, String)>,
    accesses: Mutex<Vec<ConfigAccess>>,
    seq: AtomicU64,
}

impl ConfigInspector {
    pub fn new(provider: Arc<dyn ConfigProvider>) -> Self {
        Self {
            provider,
            cache: DashMap::new(),
            accesses: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
        }
    }

    pub fn provider_name(&self) -> String {
        self.provider.name().to_string()
    }

    /// Raw string lookup without a default.
    #[track_caller]
    pub fn get_raw(&self, scope: &Scope, key: &str) -> Result<String> {
        self.lookup(scope, key, false, None, Location::caller())
    }

    /// Typed lookup without a default: provider value parsed through the
    /// parser registry.
    #[track_caller]
    pub fn get<T: Send + Sync + 'static>(&self, scope: &Scope, key: &str) -> Result<T> {
        let raw = self.lookup(scope, key, false, None, Location::caller())?;
        parser::parse(&raw)
    }

    /// Typed lookup that cannot fail: the parsed provider value on success,
    /// exactly `default` on any failure path (missing key, provider error,
    /// parse error).
    #[track_caller]
    pub fn get_with_default<T: Send + Sync + 'static>(
        &self,
        scope: &Scope,
        key: &str,
        default: T,
    ) -> T {
        match self.lookup(scope, key, true, None, Location::caller()) {
            Ok(raw) => parser::parse(&raw).unwrap_or(default),
            Err(_) => default,
        }
    }

    /// Shared lookup path. When `has_default` is set, a provider failure is
    /// recorded as a default-fallback access (empty provider label) and the
    /// caller is expected to substitute its default; the provider's error is
    /// still returned so callers without a default can propagate it.
    pub(crate) fn lookup(
        &self,
        scope: &Scope,
        key: &str,
        has_default: bool,
        owner: Option<&'static str>,
        location: &'static Location<'static>,
    ) -> Result<String> {
        if let Some(hit) = self.cache.get(key) {
            let (value, source) = hit.value().clone();
            self.record(key, &source, false, owner, location);
            return Ok(value);
        }

        match self.provider.get_with_source(scope, key) {
            Ok((value, source)) => {
                self.cache
                    .insert(key.to_string(), (value.clone(), source.clone()));
                self.record(key, &source, false, owner, location);
                Ok(value)
            }
            Err(err) => {
                if has_default {
                    tracing::debug!("config key '{}' missing, using default", key);
                    self.record(key, "", true, owner, location);
                }
                Err(err)
            }
        }
    }

    /// Snapshot of the access log, sorted by (key, file, line, seq).
    pub fn accesses(&self) -> Vec<ConfigAccess> {
        let mut accesses = self.accesses.lock().unwrap().clone();
        accesses.sort_by(|a, b| {
            (&a.key, &a.file, a.line, a.seq).cmp(&(&b.key, &b.file, b.line, b.seq))
        });
        accesses
    }

    fn record(
        &self,
        key: &str,
        provider: &str,
        used_default: bool,
        owner: Option<&'static str>,
        location: &'static Location<'static>,
    ) {
        let mut accesses = self.accesses.lock().unwrap();
        accesses.push(ConfigAccess {
            key: key.to_string(),
            provider: provider.to_string(),
            used_default,
            file: location.file().to_string(),
            line: location.line(),
            owner: owner.map(|owner| owner.to_string()),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::error::HostError;

    struct CountingProvider {
        calls: AtomicUsize,
        value: Option<&'static str>,
    }

    impl ConfigProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn get(&self, _scope: &Scope, key: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.value
                .map(|v| v.to_string())
                .ok_or_else(|| HostError::NotSet {
                    key: key.to_string(),
                })
        }
    }

    fn counting(value: Option<&'static str>) -> Arc<CountingProvider> {
        Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            value,
        })
    }

    #[test]
    fn first_lookup_is_memoized() {
        let provider = counting(Some("8080"));
        let inspector = ConfigInspector::new(provider.clone());
        let scope = Scope::background();

        assert_eq!(inspector.get::<u16>(&scope, "PORT").unwrap(), 8080);
        assert_eq!(inspector.get::<u16>(&scope, "PORT").unwrap(), 8080);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let accesses = inspector.accesses();
        assert_eq!(accesses.len(), 2);
        assert!(accesses.iter().all(|a| a.provider == "counting"));
    }

    #[test]
    fn default_swallows_provider_error_and_is_recorded() {
        let inspector = ConfigInspector::new(counting(None));
        let scope = Scope::background();

        let value = inspector.get_with_default::<u16>(&scope, "PORT", 9);
        assert_eq!(value, 9);

        let accesses = inspector.accesses();
        assert_eq!(accesses.len(), 1);
        assert!(accesses[0].used_default);
        assert_eq!(accesses[0].provider, "");
    }

    #[test]
    fn default_covers_parse_failures_too() {
        let inspector = ConfigInspector::new(counting(Some("not-a-number")));
        let scope = Scope::background();
        assert_eq!(inspector.get_with_default::<u16>(&scope, "PORT", 7), 7);
    }

    #[test]
    fn no_default_propagates_the_error() {
        let inspector = ConfigInspector::new(counting(None));
        let scope = Scope::background();
        let err = inspector.get::<u16>(&scope, "PORT").unwrap_err();
        assert!(matches!(err, HostError::NotSet { .. }));
        // A failed no-default lookup is not an access.
        assert!(inspector.accesses().is_empty());
    }

    #[test]
    fn accesses_sorted_by_key_then_sequence() {
        let inspector = ConfigInspector::new(counting(Some("v")));
        let scope = Scope::background();
        inspector.get_raw(&scope, "zebra").unwrap();
        inspector.get_raw(&scope, "apple").unwrap();
        inspector.get_raw(&scope, "apple").unwrap();

        let accesses = inspector.accesses();
        assert_eq!(accesses[0].key, "apple");
        assert_eq!(accesses[1].key, "apple");
        assert!(accesses[0].seq < accesses[1].seq);
        assert_eq!(accesses[2].key, "zebra");
    }
}
