//! Configuration providers
//!
//! A provider answers `(scope, key) -> value` lookups. Providers are plain
//! synchronous lookups; anything slow belongs behind the caching inspector.

use std::sync::Arc;

use crate::error::{HostError, Result};
use crate::scope::Scope;

/// Pluggable key/value source.
pub trait ConfigProvider: Send + Sync {
    /// Label used in access records and composite error aggregation.
    fn name(&self) -> &str;

    fn get(&self, scope: &Scope, key: &str) -> Result<String>;

    /// Like `get`, additionally naming the provider that served the value.
    /// Wrappers override this to attribute values to inner providers.
    fn get_with_source(&self, scope: &Scope, key: &str) -> Result<(String, String)> {
        self.get(scope, key)
            .map(|value| (value, self.name().to_string()))
    }
}

/// Reads the process environment; key `K` maps to the environment entry
/// named `K` verbatim.
#[derive(Debug, Default)]
pub struct EnvProvider;

impl ConfigProvider for EnvProvider {
    fn name(&self) -> &str {
        "env"
    }

    fn get(&self, _scope: &Scope, key: &str) -> Result<String> {
        std::env::var(key).map_err(|_| HostError::NotSet {
            key: key.to_string(),
        })
    }
}

/// Tries an ordered list of labelled providers, returning the first success.
///
/// When every inner provider fails, the error text carries one
/// `<label>: <error>` line per provider.
pub struct CompositeProvider {
    label: String,
    inner: Vec<(String, Arc<dyn ConfigProvider>)>,
}

impl CompositeProvider {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            inner: Vec::new(),
        }
    }

    pub fn with(mut self, label: impl Into<String>, provider: Arc<dyn ConfigProvider>) -> Self {
        self.inner.push((label.into(), provider));
        self
    }
}

impl ConfigProvider for CompositeProvider {
    fn name(&self) -> &str {
        &self.label
    }

    fn get(&self, scope: &Scope, key: &str) -> Result<String> {
        self.get_with_source(scope, key).map(|(value, _)| value)
    }

    fn get_with_source(&self, scope: &Scope, key: &str) -> Result<(String, String)> {
        let mut failures = Vec::with_capacity(self.inner.len());
        for (label, provider) in &self.inner {
            match provider.get(scope, key) {
                Ok(value) => return Ok((value, label.clone())),
                Err(err) => failures.push(format!("{}: {}", label, err)),
            }
        }
        Err(HostError::Provider(failures.join("\n")))
    }
}
