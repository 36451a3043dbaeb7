//! Component capability traits
//!
//! A component is any user value handed to the host. Capabilities are
//! orthogonal: a setup step implements [`Setup`], a service implements
//! [`Run`], and either may additionally expose [`Close`] (cleanup) or, for
//! services, [`IsReady`] (readiness probing). The optional capabilities are
//! surfaced to the host through [`Component::as_close`] /
//! [`Component::as_ready`], each a one-line override on the component:
//!
//! ```rust,ignore
//! struct Database { /* ... */ }
//!
//! impl Component for Database {
//!     fn as_close(self: Arc<Self>) -> Option<Arc<dyn Close>> {
//!         Some(self)
//!     }
//! }
//!
//! #[async_trait]
//! impl Setup for Database {
//!     async fn setup(&self, scope: Scope) -> anyhow::Result<Scope> {
//!         // connect, register pools in the container...
//!         Ok(scope)
//!     }
//! }
//!
//! #[async_trait]
//! impl Close for Database {
//!     async fn close(&self) -> anyhow::Result<()> {
//!         // drain and disconnect
//!         Ok(())
//!     }
//! }
//! ```

use std::any::TypeId;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::scope::Scope;

mod name;

pub use name::{short_file, short_location, short_type_name};

/// Base trait for everything the host executes.
///
/// The two `as_*` hooks default to `None`; components that implement the
/// corresponding capability override them with `Some(self)`.
pub trait Component: Send + Sync + 'static {
    /// The component's display name, used in error wrapping and logs.
    fn component_name(&self) -> &'static str {
        short_type_name::<Self>()
    }

    /// Expose the cleanup capability, if this component has one.
    fn as_close(self: Arc<Self>) -> Option<Arc<dyn Close>> {
        None
    }

    /// Expose the readiness capability, if this component has one.
    fn as_ready(self: Arc<Self>) -> Option<Arc<dyn IsReady>> {
        None
    }
}

/// A setup step: executed at most once, in declared order, before any
/// service starts. May replace the current scope; the returned scope is what
/// later steps and all services observe.
#[async_trait]
pub trait Setup: Component {
    async fn setup(&self, scope: Scope) -> anyhow::Result<Scope>;
}

/// A long-lived service: runs until it returns or its scope is cancelled.
#[async_trait]
pub trait Run: Component {
    async fn run(&self, scope: Scope) -> anyhow::Result<()>;
}

/// Cleanup hook. Hooks are collected in encounter order and invoked in
/// strict reverse order on exit, whatever the exit path.
#[async_trait]
pub trait Close: Send + Sync {
    async fn close(&self) -> anyhow::Result<()>;
}

/// Readiness probe: `Ok` once the service is ready to do work. Services
/// without one get a substitute probe that reports ready as soon as their
/// `run` has been entered.
#[async_trait]
pub trait IsReady: Send + Sync {
    async fn is_ready(&self) -> anyhow::Result<()>;
}

/// Descriptor of a declared component, carried in the introspection report.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentInfo {
    pub type_name: String,
    /// Reflective handle for external consumers that want identity checks.
    #[serde(skip_serializing)]
    pub type_id: TypeId,
}

impl ComponentInfo {
    pub fn of<T: Component>() -> Self {
        Self {
            type_name: short_type_name::<T>().to_string(),
            type_id: TypeId::of::<T>(),
        }
    }
}
