//! Introspection snapshot
//!
//! A read-only aggregate of what the host wired: every configuration
//! access, every dependency event, and the declared setup steps and
//! services. The report is produced exactly once, after all setup steps and
//! injections have finished and before any service runs, and handed to the
//! installed [`Introspector`] (e.g. a diagram renderer).

use async_trait::async_trait;
use serde::Serialize;

use crate::component::ComponentInfo;
use crate::config::ConfigAccess;
use crate::container::DependencyEvent;

/// Immutable snapshot taken between the setup and service phases.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Config accesses, sorted by (key, file, line, seq).
    pub config_accesses: Vec<ConfigAccess>,
    /// Dependency events in sequence order.
    pub dependency_events: Vec<DependencyEvent>,
    pub setup_steps: Vec<ComponentInfo>,
    pub services: Vec<ComponentInfo>,
}

/// Consumer of the introspection report. An error (or panic) aborts the run
/// before any service starts.
#[async_trait]
pub trait Introspector: Send + Sync + 'static {
    async fn introspect(&self, report: Report) -> anyhow::Result<()>;
}
