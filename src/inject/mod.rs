//! Field injection
//!
//! The build-time counterpart of struct-tag wiring: `#[derive(Inject)]`
//! (from `hearth-macro`) expands a struct's `#[resolve]` and `#[config]`
//! field attributes into calls to [`resolve_field`] and [`config_field`],
//! yielding a constructor that enumerates the same (field, key/name) pairs
//! a reflective injector would walk.
//!
//! The host applies injection to setup steps, services, and introspectors
//! registered through the `*_injected` builder methods, immediately before
//! each component's first entry point runs.

use std::panic::Location;
use std::sync::Arc;

use crate::config;
use crate::container;
use crate::error::{HostError, Result};
use crate::scope::Scope;

/// A component whose fields can be wired from the dependency container and
/// the active configuration inspector. Usually derived:
///
/// ```rust,ignore
/// #[derive(Inject)]
/// struct Api {
///     #[resolve]
///     store: Arc<Store>,
///     #[config(key = "API_PORT", default = "8080")]
///     port: u16,
/// }
/// ```
pub trait Inject: Sized + Send + Sync + 'static {
    fn inject(scope: &Scope) -> Result<Self>;
}

/// Resolve one `#[resolve]` field from the global container, recording the
/// owning component in the dependency event log.
#[track_caller]
pub fn resolve_field<T: Send + Sync + 'static>(
    name: &str,
    owner: &'static str,
    _field: &str,
) -> Result<Arc<T>> {
    container::global().resolve_named_for::<T>(name, owner)
}

/// Look up and parse one `#[config]` field through the active inspector.
///
/// With a default, a failed lookup falls back to the default string (an
/// empty default string is still a default); the value, wherever it came
/// from, is then parsed into the field type. Lookup failures without a
/// default and parse failures are reported against the field.
#[track_caller]
pub fn config_field<T: Send + Sync + 'static>(
    scope: &Scope,
    key: &str,
    default: Option<&str>,
    owner: &'static str,
    field: &str,
) -> Result<T> {
    let location = Location::caller();
    let inspector = config::inspector();
    let raw = match inspector.lookup(scope, key, default.is_some(), Some(owner), location) {
        Ok(value) => value,
        Err(err) => match default {
            Some(value) => value.to_string(),
            None => return Err(HostError::for_field(field, err)),
        },
    };
    config::parse::<T>(&raw).map_err(|err| HostError::for_field(field, err))
}
