//! End-to-end flows through the builder, the derive, and the global
//! container and configuration layers.
//!
//! The container and the active configuration provider are process-wide, so
//! every test takes the shared lock and resets both before touching them.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use hearth::config::{self, ConfigProvider};
use hearth::container;
use hearth::error::HostError;
use hearth::prelude::*;

static LOCK: Mutex<()> = Mutex::new(());

fn isolate() -> MutexGuard<'static, ()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let guard = LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    container::global().clear();
    config::reset();
    guard
}

struct Store {
    motto: &'static str,
}

type Sink = Mutex<Vec<String>>;

fn drain(sink: &Arc<Sink>) -> Vec<String> {
    sink.lock().unwrap().clone()
}

#[derive(Inject)]
struct Greeter {
    #[resolve]
    store: Arc<Store>,
    #[resolve]
    sink: Arc<Sink>,
    #[config(key = "HOST_GREETING")]
    greeting: String,
    #[config(key = "HOST_TIMEOUT", default = "250ms")]
    timeout: Duration,
}

impl Component for Greeter {}

#[async_trait]
impl Run for Greeter {
    async fn run(&self, _scope: Scope) -> anyhow::Result<()> {
        self.sink.lock().unwrap().push(format!(
            "{} {} {}ms",
            self.greeting,
            self.store.motto,
            self.timeout.as_millis()
        ));
        Ok(())
    }
}

#[tokio::test]
async fn injected_service_sees_dependencies_and_config() {
    let _guard = isolate();
    unsafe { std::env::set_var("HOST_GREETING", "hello") };
    unsafe { std::env::remove_var("HOST_TIMEOUT") };

    container::global().register(Store { motto: "onward" });
    container::global().register(Sink::new(Vec::new()));

    App::new()
        .host_injected::<Greeter>()
        .run_with_scope(Scope::background())
        .await
        .unwrap();

    let sink = container::global().resolve::<Sink>().unwrap();
    assert_eq!(drain(&sink), vec!["hello onward 250ms"]);

    // The access log names the serving provider, and flags the default
    // fallback for the absent key.
    let accesses = config::inspector().accesses();
    let greeting = accesses
        .iter()
        .find(|access| access.key == "HOST_GREETING")
        .unwrap();
    assert_eq!(greeting.provider, "env");
    assert!(!greeting.used_default);
    assert_eq!(greeting.owner.as_deref(), Some("host::Greeter"));

    let timeout = accesses
        .iter()
        .find(|access| access.key == "HOST_TIMEOUT")
        .unwrap();
    assert!(timeout.used_default);

    // Every registration precedes its resolution in the event log.
    let events = container::global().events();
    let registered = events
        .iter()
        .position(|event| {
            event.type_name == "host::Store"
                && matches!(event.kind, container::DependencyEventKind::Registered)
        })
        .unwrap();
    let resolved = events
        .iter()
        .position(|event| {
            event.type_name == "host::Store"
                && matches!(event.kind, container::DependencyEventKind::Resolved)
        })
        .unwrap();
    assert!(registered < resolved);
    assert_eq!(events[resolved].owner.as_deref(), Some("host::Greeter"));
    assert!(events.windows(2).all(|pair| pair[0].seq < pair[1].seq));
}

#[derive(Inject)]
struct NeedsString {
    #[resolve]
    label: Arc<String>,
}

impl Component for NeedsString {}

#[async_trait]
impl Run for NeedsString {
    async fn run(&self, _scope: Scope) -> anyhow::Result<()> {
        let _ = &self.label;
        Ok(())
    }
}

#[tokio::test]
async fn missing_dependency_is_attributed_to_the_service() {
    let _guard = isolate();

    let err = App::new()
        .host_injected::<NeedsString>()
        .run_with_scope(Scope::background())
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "error: the dependency type 'string::String' was not registered, \
         component: host::NeedsString"
    );
}

#[derive(Inject)]
struct Cfg {
    #[config(key = "HOST_ABSENT_KEY_XYZ")]
    cfg: String,
}

impl Component for Cfg {}

#[async_trait]
impl Run for Cfg {
    async fn run(&self, _scope: Scope) -> anyhow::Result<()> {
        let _ = &self.cfg;
        Ok(())
    }
}

#[tokio::test]
async fn missing_config_without_default_fails_injection() {
    let _guard = isolate();
    unsafe { std::env::remove_var("HOST_ABSENT_KEY_XYZ") };

    let err = App::new()
        .host_injected::<Cfg>()
        .run_with_scope(Scope::background())
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "error: error getting value for field 'cfg': the configuration key \
         'HOST_ABSENT_KEY_XYZ' is not set, component: host::Cfg"
    );
}

#[derive(Inject)]
struct NamedUser {
    #[resolve(name = "primary")]
    store: Arc<Store>,
    #[resolve]
    sink: Arc<Sink>,
}

impl Component for NamedUser {}

#[async_trait]
impl Run for NamedUser {
    async fn run(&self, _scope: Scope) -> anyhow::Result<()> {
        self.sink.lock().unwrap().push(self.store.motto.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn named_slots_resolve_independently() {
    let _guard = isolate();
    container::global().register(Store { motto: "unnamed" });
    container::global().register_named("primary", Store { motto: "primary" });
    container::global().register(Sink::new(Vec::new()));

    App::new()
        .host_injected::<NamedUser>()
        .run_with_scope(Scope::background())
        .await
        .unwrap();

    let sink = container::global().resolve::<Sink>().unwrap();
    assert_eq!(drain(&sink), vec!["primary"]);
}

struct MapProvider {
    label: &'static str,
    entries: HashMap<&'static str, &'static str>,
}

impl ConfigProvider for MapProvider {
    fn name(&self) -> &str {
        self.label
    }

    fn get(&self, _scope: &Scope, key: &str) -> hearth::Result<String> {
        self.entries
            .get(key)
            .map(|value| (*value).to_string())
            .ok_or_else(|| HostError::NotSet {
                key: key.to_string(),
            })
    }
}

#[tokio::test]
async fn composite_fallback_attributes_the_serving_layer() {
    let _guard = isolate();
    config::install(Arc::new(
        CompositeProvider::new("layered")
            .with(
                "flags",
                Arc::new(MapProvider {
                    label: "flags",
                    entries: HashMap::new(),
                }),
            )
            .with(
                "file",
                Arc::new(MapProvider {
                    label: "file",
                    entries: HashMap::from([("HOST_PORT", "9040")]),
                }),
            ),
    ));

    let scope = Scope::background();
    let port: u16 = config::inspector().get(&scope, "HOST_PORT").unwrap();
    assert_eq!(port, 9040);

    let accesses = config::inspector().accesses();
    assert_eq!(accesses.len(), 1);
    assert_eq!(accesses[0].provider, "file");
    assert!(!accesses[0].used_default);
}

#[derive(Inject)]
struct LateUser {
    #[resolve]
    store: Arc<Store>,
    #[resolve]
    sink: Arc<Sink>,
}

impl Component for LateUser {}

#[async_trait]
impl Run for LateUser {
    async fn run(&self, _scope: Scope) -> anyhow::Result<()> {
        self.sink.lock().unwrap().push(self.store.motto.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn setup_registrations_are_visible_to_injected_services() {
    let _guard = isolate();
    container::global().register(Sink::new(Vec::new()));

    App::new()
        .initialize_fn("seed", |scope| async move {
            container::global().register(Store { motto: "late" });
            Ok(scope)
        })
        .host_injected::<LateUser>()
        .run_with_scope(Scope::background())
        .await
        .unwrap();

    let sink = container::global().resolve::<Sink>().unwrap();
    assert_eq!(drain(&sink), vec!["late"]);
}

#[derive(Inject)]
struct Twice {
    #[resolve]
    store: Arc<Store>,
    #[config(key = "HOST_DETERMINISM_KEY", default = "7")]
    attempts: u32,
}

#[tokio::test]
async fn injection_is_deterministic_for_a_fixed_snapshot() {
    let _guard = isolate();
    unsafe { std::env::remove_var("HOST_DETERMINISM_KEY") };
    container::global().register(Store { motto: "same" });

    let scope = Scope::background();
    let first = <Twice as InjectTrait>::inject(&scope).unwrap();
    let second = <Twice as InjectTrait>::inject(&scope).unwrap();

    // Same container and provider snapshot, identical wiring: the shared
    // handle is the same allocation and the config value is byte-equal.
    assert!(Arc::ptr_eq(&first.store, &second.store));
    assert_eq!(first.attempts, second.attempts);
    assert_eq!(first.attempts, 7);
}

#[derive(Inject)]
struct EmptyDefault {
    #[config(key = "HOST_EMPTY_DEFAULT_KEY", default = "")]
    label: String,
}

#[tokio::test]
async fn empty_default_string_is_a_real_default() {
    let _guard = isolate();
    unsafe { std::env::remove_var("HOST_EMPTY_DEFAULT_KEY") };

    let scope = Scope::background();
    let value = <EmptyDefault as InjectTrait>::inject(&scope).unwrap();
    assert_eq!(value.label, "");

    let access = config::inspector()
        .accesses()
        .into_iter()
        .find(|access| access.key == "HOST_EMPTY_DEFAULT_KEY")
        .unwrap();
    assert!(access.used_default);
}

struct JsonIntro {
    captured: Arc<Mutex<Option<serde_json::Value>>>,
}

impl Component for JsonIntro {}

#[async_trait]
impl Introspector for JsonIntro {
    async fn introspect(&self, report: Report) -> anyhow::Result<()> {
        *self.captured.lock().unwrap() = Some(serde_json::to_value(&report)?);
        Ok(())
    }
}

struct Quick;

impl Component for Quick {}

#[async_trait]
impl Run for Quick {
    async fn run(&self, _scope: Scope) -> anyhow::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn introspection_report_serializes_to_json() {
    let _guard = isolate();
    let captured = Arc::new(Mutex::new(None));

    App::new()
        .initialize_fn("seed", |scope| async move {
            container::global().register(Store { motto: "report" });
            Ok(scope)
        })
        .host(Arc::new(Quick))
        .introspect(Arc::new(JsonIntro {
            captured: captured.clone(),
        }))
        .run_with_scope(Scope::background())
        .await
        .unwrap();

    let value = captured.lock().unwrap().take().unwrap();
    assert_eq!(value["setup_steps"][0]["type_name"], "seed");
    assert_eq!(value["services"][0]["type_name"], "host::Quick");
    let events = value["dependency_events"].as_array().unwrap();
    assert!(events
        .iter()
        .any(|event| event["type_name"] == "host::Store"));
    assert!(value["config_accesses"].is_array());
}
