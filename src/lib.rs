//! # Hearth
//!
//! An application host for long-running async services in Rust.
//!
//! Hearth composes an application from setup steps and hosted services,
//! wires their dependencies and configuration through a derivable `Inject`
//! constructor, and runs everything under a cancellable [`Scope`] with
//! deterministic reverse-order cleanup.
//!
//! ## Features
//!
//! - **Ordered lifecycle**: setup steps run sequentially, services run
//!   concurrently, cleanup runs in strict reverse order on every exit path
//! - **Typed dependency container**: register and resolve shared `Arc`
//!   instances by type and optional name, with a full access log
//! - **Configuration layer**: pluggable string providers, typed parsing,
//!   defaults, and per-key access recording
//! - **Readiness**: per-service probes with a polling `wait_ready` for
//!   tests and orchestration
//! - **Introspection**: a serializable report of every wiring decision,
//!   delivered before the first service starts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hearth::prelude::*;
//!
//! #[derive(Inject)]
//! struct Server {
//!     #[resolve]
//!     store: Arc<Store>,
//!     #[config(key = "PORT", default = "8080")]
//!     port: u16,
//! }
//!
//! impl Component for Server {}
//!
//! #[async_trait]
//! impl Run for Server {
//!     async fn run(&self, scope: Scope) -> anyhow::Result<()> {
//!         // serve until the scope is cancelled
//!         scope.cancelled().await;
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Store;
//!
//! impl Component for Store {}
//!
//! #[tokio::main]
//! async fn main() -> hearth::Result<()> {
//!     hearth::container::global().register(Store::default());
//!     App::new().host_injected::<Server>().run().await
//! }
//! ```

pub mod app;
pub mod component;
pub mod config;
pub mod container;
pub mod error;
pub mod inject;
pub mod introspect;
pub mod scope;

// Re-export core types
pub use app::{App, AppHandle};
pub use component::{Close, Component, ComponentInfo, IsReady, Run, Setup};
pub use error::{HostError, Result};
pub use inject::Inject;
pub use introspect::{Introspector, Report};
pub use scope::Scope;

// Re-export macros
pub use hearth_macro::Inject as DeriveInject;

// Re-export commonly used types from dependencies
pub use anyhow;
pub use async_trait::async_trait;

/// Prelude module for convenient imports
///
/// ```
/// use hearth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::app::{signal::shutdown_signal, App, AppHandle};
    pub use crate::component::{Close, Component, ComponentInfo, IsReady, Run, Setup};
    pub use crate::config::{ConfigProvider, CompositeProvider, EnvProvider};
    pub use crate::container::Container;
    pub use crate::error::{HostError, Result};
    pub use crate::inject::Inject as InjectTrait;
    pub use crate::introspect::{Introspector, Report};
    pub use crate::scope::Scope;
    pub use crate::DeriveInject as Inject;
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
    pub use std::time::Duration;
}
