//! Application orchestrator
//!
//! [`App`] composes an application from declared setup steps and hosted
//! services, executes the phases in order, and cleans up deterministically:
//!
//! 1. Setup steps run sequentially in declared order; each may replace the
//!    current scope, and may register dependencies for later components.
//! 2. Services are injected (when registered via `host_injected`) and their
//!    cleanup hooks collected.
//! 3. The introspection report is built and handed to the installed
//!    introspector, if any.
//! 4. Services run concurrently under a derived fan-out scope; the first
//!    failure cancels the rest.
//! 5. All collected cleanup hooks run in reverse registration order, on
//!    every exit path.
//!
//! # Example
//!
//! ```rust,ignore
//! let result = App::new()
//!     .initialize(Arc::new(Database::default()))
//!     .initialize_injected::<CacheWarmer>()
//!     .host_injected::<HttpServer>()
//!     .run()
//!     .await;
//! ```

mod guard;
mod readiness;
pub mod signal;

use std::any::TypeId;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::component::{
    short_location, short_type_name, Close, Component, ComponentInfo, Run, Setup,
};
use crate::config;
use crate::container;
use crate::error::{HostError, Result};
use crate::inject::Inject;
use crate::introspect::{Introspector, Report};
use crate::scope::Scope;

pub use readiness::AppHandle;

use readiness::{ServiceExecutor, ServiceProbe};

/// Who to blame in error wrapping: a typed component or a named closure.
enum Attribution {
    Component(String),
    Function { name: String, location: String },
}

impl Attribution {
    fn component(name: impl Into<String>) -> Self {
        Self::Component(name.into())
    }

    fn name(&self) -> &str {
        match self {
            Self::Component(name) => name,
            Self::Function { name, .. } => name,
        }
    }

    fn wrap(&self, source: anyhow::Error) -> HostError {
        match self {
            Self::Component(component) => HostError::for_component(component.clone(), source),
            Self::Function { name, location } => {
                HostError::for_function(name.clone(), location.clone(), source)
            }
        }
    }
}

type StepBuild =
    Box<dyn FnOnce(&Scope) -> Result<(Arc<dyn Setup>, Option<Arc<dyn Close>>)> + Send>;

enum StepSource {
    Ready {
        setup: Arc<dyn Setup>,
        close: Option<Arc<dyn Close>>,
    },
    /// Constructed via `Inject` right before its turn, so it observes the
    /// registrations of every earlier step.
    Injected(StepBuild),
}

struct StepEntry {
    info: ComponentInfo,
    attr: Attribution,
    source: StepSource,
}

struct ServiceParts {
    run: Arc<dyn Run>,
    ready: Option<Arc<dyn crate::component::IsReady>>,
    close: Option<Arc<dyn Close>>,
}

type ServiceBuild = Box<dyn FnOnce(&Scope) -> Result<ServiceParts> + Send>;

enum ServiceBind {
    Ready { close: Option<Arc<dyn Close>> },
    Injected(ServiceBuild),
}

struct ServiceEntry {
    info: ComponentInfo,
    exec: Arc<ServiceExecutor>,
    probe: Arc<ServiceProbe>,
    bind: ServiceBind,
}

type IntroBuild = Box<dyn FnOnce(&Scope) -> Result<Arc<dyn Introspector>> + Send>;

enum IntroSource {
    Ready(Arc<dyn Introspector>),
    Injected(IntroBuild),
}

struct IntroEntry {
    attr: Attribution,
    source: IntroSource,
}

type BoxSetupFuture = Pin<Box<dyn Future<Output = anyhow::Result<Scope>> + Send>>;

/// Adapter turning a closure into a setup step.
struct FnStep {
    run: Box<dyn Fn(Scope) -> BoxSetupFuture + Send + Sync>,
}

impl Component for FnStep {}

#[async_trait]
impl Setup for FnStep {
    async fn setup(&self, scope: Scope) -> anyhow::Result<Scope> {
        (self.run)(scope).await
    }
}

/// Builder and runner for a composed application.
#[derive(Default)]
pub struct App {
    steps: Vec<StepEntry>,
    services: Vec<ServiceEntry>,
    introspector: Option<IntroEntry>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a setup step, executed in declared order before any service.
    pub fn initialize<T: Setup>(mut self, step: Arc<T>) -> Self {
        let close = step.clone().as_close();
        self.steps.push(StepEntry {
            info: ComponentInfo::of::<T>(),
            attr: Attribution::component(short_type_name::<T>()),
            source: StepSource::Ready { setup: step, close },
        });
        self
    }

    /// Append a setup step that is constructed via [`Inject`] right before
    /// its turn in the setup sequence.
    pub fn initialize_injected<T: Inject + Setup>(mut self) -> Self {
        self.steps.push(StepEntry {
            info: ComponentInfo::of::<T>(),
            attr: Attribution::component(short_type_name::<T>()),
            source: StepSource::Injected(Box::new(
                |scope: &Scope| -> Result<(Arc<dyn Setup>, Option<Arc<dyn Close>>)> {
                    let step = Arc::new(T::inject(scope)?);
                    let close = step.clone().as_close();
                    Ok((step as Arc<dyn Setup>, close))
                },
            )),
        });
        self
    }

    /// Append a closure as a setup step. Failures are attributed to the
    /// given name and the registration site.
    #[track_caller]
    pub fn initialize_fn<F, Fut>(mut self, name: impl Into<String>, step: F) -> Self
    where
        F: Fn(Scope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Scope>> + Send + 'static,
    {
        let name = name.into();
        let location = short_location(Location::caller());
        let step = Arc::new(FnStep {
            run: Box::new(move |scope| Box::pin(step(scope))),
        });
        self.steps.push(StepEntry {
            info: ComponentInfo {
                type_name: name.clone(),
                type_id: TypeId::of::<FnStep>(),
            },
            attr: Attribution::Function { name, location },
            source: StepSource::Ready {
                setup: step,
                close: None,
            },
        });
        self
    }

    /// Host a service, run concurrently with all other services after the
    /// setup phase.
    pub fn host<T: Run>(mut self, service: Arc<T>) -> Self {
        let exec = Arc::new(ServiceExecutor::new(short_type_name::<T>()));
        exec.bind(service.clone());
        let probe = Arc::new(ServiceProbe::new(exec.clone()));
        if let Some(user) = service.clone().as_ready() {
            probe.bind_user(user);
        }
        let close = service.as_close();
        self.services.push(ServiceEntry {
            info: ComponentInfo::of::<T>(),
            exec,
            probe,
            bind: ServiceBind::Ready { close },
        });
        self
    }

    /// Host a service that is constructed via [`Inject`] after all setup
    /// steps have run.
    pub fn host_injected<T: Inject + Run>(mut self) -> Self {
        let exec = Arc::new(ServiceExecutor::new(short_type_name::<T>()));
        let probe = Arc::new(ServiceProbe::new(exec.clone()));
        self.services.push(ServiceEntry {
            info: ComponentInfo::of::<T>(),
            exec,
            probe,
            bind: ServiceBind::Injected(Box::new(|scope: &Scope| -> Result<ServiceParts> {
                let service = Arc::new(T::inject(scope)?);
                Ok(ServiceParts {
                    run: service.clone(),
                    ready: service.clone().as_ready(),
                    close: service.as_close(),
                })
            })),
        });
        self
    }

    /// Install an introspector, called with the wiring report after setup
    /// and injection and before any service starts.
    pub fn introspect<T: Introspector + Component>(mut self, introspector: Arc<T>) -> Self {
        self.introspector = Some(IntroEntry {
            attr: Attribution::component(short_type_name::<T>()),
            source: IntroSource::Ready(introspector),
        });
        self
    }

    /// Install an introspector constructed via [`Inject`].
    pub fn introspect_injected<T: Inject + Introspector + Component>(mut self) -> Self {
        self.introspector = Some(IntroEntry {
            attr: Attribution::component(short_type_name::<T>()),
            source: IntroSource::Injected(Box::new(
                |scope: &Scope| -> Result<Arc<dyn Introspector>> {
                    Ok(Arc::new(T::inject(scope)?))
                },
            )),
        });
        self
    }

    pub fn setup_count(&self) -> usize {
        self.steps.len()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Run under a scope that is cancelled on SIGINT/SIGTERM.
    pub async fn run(self) -> Result<()> {
        let scope = Scope::background();
        let signal_scope = scope.clone();
        let watcher = tokio::spawn(async move {
            signal::shutdown_signal().await;
            signal_scope.cancel();
        });
        let result = self.run_with_scope(scope).await;
        // The run is over; stop listening for signals.
        watcher.abort();
        result
    }

    /// Run under the given scope. Returns after all services have returned
    /// and every collected cleanup hook has run.
    pub async fn run_with_scope(self, scope: Scope) -> Result<()> {
        let mut closers = Vec::new();
        let result = self.execute(scope, &mut closers).await;
        if let Err(err) = &result {
            tracing::error!("run failed: {}", err);
        }
        run_closers(closers).await;
        result
    }

    /// Spawn the run on a background task and return a handle carrying the
    /// readiness probes and the final-result channel.
    pub fn run_async(self, scope: Scope) -> AppHandle {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let services = self
            .services
            .iter()
            .map(|entry| (entry.info.type_name.clone(), entry.probe.clone()))
            .collect();
        tokio::spawn(async move {
            let _ = tx.send(self.run_with_scope(scope).await);
        });
        AppHandle {
            result: rx,
            services,
            finished: false,
        }
    }

    async fn execute(
        self,
        mut scope: Scope,
        closers: &mut Vec<(String, Arc<dyn Close>)>,
    ) -> Result<()> {
        let App {
            steps,
            services,
            introspector,
        } = self;

        let mut step_infos = Vec::with_capacity(steps.len());
        tracing::info!("running {} setup steps", steps.len());
        for entry in steps {
            let StepEntry { info, attr, source } = entry;
            step_infos.push(info);
            let (setup, close) = match source {
                StepSource::Ready { setup, close } => (setup, close),
                StepSource::Injected(build) => build(&scope).map_err(|err| attr.wrap(err.into()))?,
            };
            tracing::debug!("setup: {}", attr.name());
            let setup_fut = {
                let setup = setup.clone();
                let scope = scope.clone();
                async move { setup.setup(scope).await }
            };
            match guard::guarded(guard::Phase::Initialize, setup_fut).await {
                Ok(next) => scope = next,
                Err(err) => return Err(attr.wrap(err)),
            }
            if let Some(close) = close {
                closers.push((attr.name().to_string(), close));
            }
        }

        let mut launch = Vec::with_capacity(services.len());
        for entry in services {
            let ServiceEntry {
                info,
                exec,
                probe,
                bind,
            } = entry;
            let attr = Attribution::component(info.type_name.clone());
            let close = match bind {
                ServiceBind::Ready { close } => close,
                ServiceBind::Injected(build) => {
                    let parts = build(&scope).map_err(|err| attr.wrap(err.into()))?;
                    exec.bind(parts.run);
                    if let Some(user) = parts.ready {
                        probe.bind_user(user);
                    }
                    parts.close
                }
            };
            if let Some(close) = close {
                closers.push((info.type_name.clone(), close));
            }
            launch.push((info, attr, exec));
        }

        if let Some(entry) = introspector {
            let IntroEntry { attr, source } = entry;
            let introspector = match source {
                IntroSource::Ready(introspector) => introspector,
                IntroSource::Injected(build) => {
                    build(&scope).map_err(|err| attr.wrap(err.into()))?
                }
            };
            let report = Report {
                config_accesses: config::inspector().accesses(),
                dependency_events: container::global().events(),
                setup_steps: step_infos.clone(),
                services: launch.iter().map(|(info, _, _)| info.clone()).collect(),
            };
            tracing::info!(
                "introspecting: {} config accesses, {} dependency events",
                report.config_accesses.len(),
                report.dependency_events.len()
            );
            let intro_fut = {
                let introspector = introspector.clone();
                async move { introspector.introspect(report).await }
            };
            guard::guarded(guard::Phase::Introspect, intro_fut)
                .await
                .map_err(|err| attr.wrap(err))?;
        }

        if launch.is_empty() {
            return Ok(());
        }

        let fanout = scope.derive();
        let first_error: Arc<Mutex<Option<HostError>>> = Arc::new(Mutex::new(None));
        tracing::info!("starting {} services", launch.len());
        let mut handles = Vec::with_capacity(launch.len());
        for (info, attr, exec) in launch {
            let fanout = fanout.clone();
            let first_error = first_error.clone();
            handles.push(tokio::spawn(async move {
                let run_fut = {
                    let exec = exec.clone();
                    let scope = fanout.clone();
                    async move { exec.run(scope).await }
                };
                match guard::guarded(guard::Phase::Run, run_fut).await {
                    Ok(()) => {
                        tracing::debug!("service {} returned", info.type_name);
                    }
                    Err(err) => {
                        let wrapped = attr.wrap(err);
                        tracing::error!("service failed: {}", wrapped);
                        let mut slot = first_error.lock().unwrap();
                        if slot.is_none() {
                            *slot = Some(wrapped);
                        }
                        drop(slot);
                        fanout.cancel();
                    }
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        let failure = first_error.lock().unwrap().take();
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Invoke collected cleanup hooks in strict reverse registration order.
/// Failures and panics are logged, never propagated.
async fn run_closers(closers: Vec<(String, Arc<dyn Close>)>) {
    for (name, closer) in closers.into_iter().rev() {
        tracing::debug!("closing {}", name);
        let close_fut = {
            let closer = closer.clone();
            async move { closer.close().await }
        };
        if let Err(err) = guard::guarded(guard::Phase::Close, close_fut).await {
            tracing::error!("close failed for {}: {:#}", name, err);
        }
    }
}
