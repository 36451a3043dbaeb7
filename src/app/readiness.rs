//! Service execution shells and the readiness poller.
//!
//! Each hosted service is paired at intake with an executor (which flags
//! entry into `run`) and a probe. Services exposing [`IsReady`] are polled
//! through it; everything else gets the substitute probe that reports ready
//! once `run` has been entered. A probe is never consulted again after its
//! service's `run` has returned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::component::{IsReady, Run};
use crate::error::{HostError, Result};
use crate::scope::Scope;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs a service and tracks whether `run` has been entered / has returned.
pub(crate) struct ServiceExecutor {
    name: &'static str,
    service: OnceLock<Arc<dyn Run>>,
    started: AtomicBool,
    finished: AtomicBool,
}

impl ServiceExecutor {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            service: OnceLock::new(),
            started: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    /// Bind the service instance. Deferred (injected) services are bound
    /// during the service-injection phase.
    pub(crate) fn bind(&self, service: Arc<dyn Run>) {
        let _ = self.service.set(service);
    }

    pub(crate) async fn run(&self, scope: Scope) -> anyhow::Result<()> {
        let service = self
            .service
            .get()
            .unwrap_or_else(|| panic!("service not bound before run; this is a bug in hearth"))
            .clone();
        self.started.store(true, Ordering::SeqCst);
        let result = service.run(scope).await;
        self.finished.store(true, Ordering::SeqCst);
        result
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

/// Per-service readiness probe: the user's [`IsReady`] when the service has
/// one, otherwise the started-flag substitute.
pub(crate) struct ServiceProbe {
    exec: Arc<ServiceExecutor>,
    user: OnceLock<Arc<dyn IsReady>>,
}

impl ServiceProbe {
    pub(crate) fn new(exec: Arc<ServiceExecutor>) -> Self {
        Self {
            exec,
            user: OnceLock::new(),
        }
    }

    pub(crate) fn bind_user(&self, probe: Arc<dyn IsReady>) {
        let _ = self.user.set(probe);
    }

    pub(crate) async fn is_ready(&self) -> anyhow::Result<()> {
        // A returned service is never probed again.
        if self.exec.finished() {
            return Ok(());
        }
        if let Some(user) = self.user.get() {
            return user.is_ready().await;
        }
        if self.exec.started() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "service {} has not started",
                self.exec.name()
            ))
        }
    }
}

/// Handle to an application started with [`crate::app::App::run_async`].
///
/// [`AppHandle::wait_ready`] polls every service's readiness probe until all
/// report ready, the application exits, the caller's scope is cancelled, or
/// the timeout elapses. [`AppHandle::join`] yields the application's final
/// result.
pub struct AppHandle {
    pub(crate) result: oneshot::Receiver<Result<()>>,
    pub(crate) services: Vec<(String, Arc<ServiceProbe>)>,
    pub(crate) finished: bool,
}

impl AppHandle {
    /// Poll readiness until every service reports ready or `timeout`
    /// elapses.
    ///
    /// If the application terminates while waiting, its exit result is
    /// returned instead of a timeout; a later `join` then returns `Ok(())`.
    /// On timeout, the most recent failing probe's error is wrapped with
    /// that service's component context.
    pub async fn wait_ready(&mut self, scope: &Scope, timeout: Duration) -> Result<()> {
        if self.services.is_empty() {
            return Ok(());
        }

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        let mut tick = tokio::time::interval(POLL_INTERVAL);
        let mut last_failed: Option<(String, anyhow::Error)> = None;

        loop {
            tokio::select! {
                result = &mut self.result => {
                    self.finished = true;
                    return result.unwrap_or(Err(HostError::Cancelled));
                }
                _ = scope.cancelled() => {
                    return Err(HostError::Cancelled);
                }
                _ = &mut deadline => {
                    return Err(match last_failed.take() {
                        Some((service, err)) => HostError::for_component(service, err),
                        None => HostError::ReadinessDeadline,
                    });
                }
                _ = tick.tick() => {
                    let mut all_ready = true;
                    for (service, probe) in &self.services {
                        if let Err(err) = probe.is_ready().await {
                            tracing::debug!("service {} not ready: {}", service, err);
                            last_failed = Some((service.clone(), err));
                            all_ready = false;
                            break;
                        }
                    }
                    if all_ready {
                        tracing::info!("all {} services ready", self.services.len());
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Wait for the application to finish and return its result.
    ///
    /// Returns `Ok(())` when the outcome was already delivered by a
    /// `wait_ready` call that observed the application's termination.
    pub async fn join(self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.result.await.unwrap_or(Err(HostError::Cancelled))
    }
}
