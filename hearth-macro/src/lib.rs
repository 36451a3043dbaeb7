//! Procedural macros for the hearth application host.
//!
//! Currently this crate provides a single derive, `#[derive(Inject)]`, which
//! turns a struct's field attributes into a wiring table: `#[resolve]` fields
//! are looked up in the dependency container and `#[config]` fields are read
//! through the active configuration inspector and parsed into the field type.

use proc_macro::TokenStream;

mod inject;

/// Derive `hearth::Inject` for a struct with named fields.
///
/// # Field attributes
///
/// - `#[resolve]` / `#[resolve(name = "primary")]`: resolve the field from
///   the dependency container under the field's type and the given name (the
///   unnamed slot when no name is given). `Arc<T>` fields receive the shared
///   handle directly; any other field type must be `Clone` and receives a
///   clone of the stored value.
/// - `#[config(key = "HTTP_PORT")]` / `#[config(key = "HTTP_PORT", default = "8080")]`:
///   look the key up through the active configuration inspector, fall back
///   to the literal default string when one is given, and parse the result
///   into the field type via the parser registry. An empty default string is
///   still a default.
/// - Fields with neither attribute are filled with `Default::default()`.
///
/// # Example
///
/// ```rust,ignore
/// use hearth::Inject;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Inject)]
/// struct HttpServer {
///     #[resolve]
///     registry: Arc<MetricsRegistry>,
///     #[resolve(name = "primary")]
///     pool: Arc<DbPool>,
///     #[config(key = "HTTP_PORT", default = "8080")]
///     port: u16,
///     #[config(key = "SHUTDOWN_GRACE", default = "5s")]
///     grace: Duration,
/// }
/// ```
#[proc_macro_derive(Inject, attributes(resolve, config))]
pub fn derive_inject(input: TokenStream) -> TokenStream {
    inject::derive_inject(input)
}
