//! Typed dependency container
//!
//! A thread-safe mapping from `(type, name)` to a shared value. The empty
//! name is the unnamed slot. Values are held behind `Arc` and handed out by
//! reference; the container never copies or disposes them.
//!
//! Every successful register and resolve appends a [`DependencyEvent`] to
//! the container's event log, which the introspection report exposes.
//!
//! A process-wide instance backs the derive-driven field injection; it is
//! mutated during the setup phase and read during injection. [`global`]
//! returns it, and [`Container::clear`] exists for test isolation.

use std::any::{Any, TypeId};
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use dashmap::DashMap;
use serde::Serialize;

use crate::component::short_type_name;
use crate::error::{HostError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DependencyEventKind {
    Registered,
    Resolved,
}

/// Record of one container operation, in a process-monotonic sequence.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyEvent {
    pub kind: DependencyEventKind,
    pub type_name: String,
    pub name: String,
    pub file: String,
    pub line: u32,
    /// Type name of the component whose injection drove the operation, when
    /// the operation came from field injection.
    pub owner: Option<String>,
    pub seq: u64,
}

/// Thread-safe dependency container keyed by `(type, name)`.
pub struct Container {
    slots: DashMap<(TypeId, String), Arc<dyn Any + Send + Sync>>,
    events: Mutex<Vec<DependencyEvent>>,
    seq: AtomicU64,
}

impl Container {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            events: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
        }
    }

    /// Insert the unnamed slot for `T`, overwriting any prior value.
    #[track_caller]
    pub fn register<T: Send + Sync + 'static>(&self, value: T) {
        self.register_named("", value);
    }

    /// Insert the named slot for `T`, overwriting any prior value.
    #[track_caller]
    pub fn register_named<T: Send + Sync + 'static>(&self, name: &str, value: T) {
        let location = Location::caller();
        self.slots
            .insert((TypeId::of::<T>(), name.to_string()), Arc::new(value));
        self.record(DependencyEventKind::Registered, short_type_name::<T>(), name, location, None);
        tracing::debug!(
            "registered dependency {} (name: '{}')",
            short_type_name::<T>(),
            name
        );
    }

    /// Insert the unnamed slot for `T`; fails if the slot is occupied.
    #[track_caller]
    pub fn register_once<T: Send + Sync + 'static>(&self, value: T) -> Result<()> {
        self.register_named_once("", value)
    }

    /// Insert the named slot for `T`; fails if the slot is occupied.
    #[track_caller]
    pub fn register_named_once<T: Send + Sync + 'static>(&self, name: &str, value: T) -> Result<()> {
        let location = Location::caller();
        let key = (TypeId::of::<T>(), name.to_string());
        match self.slots.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(HostError::AlreadyRegistered {
                type_name: short_type_name::<T>().to_string(),
                name: name.to_string(),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(value));
                self.record(
                    DependencyEventKind::Registered,
                    short_type_name::<T>(),
                    name,
                    location,
                    None,
                );
                Ok(())
            }
        }
    }

    /// Resolve the unnamed slot for `T`.
    #[track_caller]
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolve_impl("", Location::caller(), None)
    }

    /// Resolve the named slot for `T`.
    #[track_caller]
    pub fn resolve_named<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        self.resolve_impl(name, Location::caller(), None)
    }

    /// Resolution on behalf of a component's field injection; the event log
    /// records the owning component.
    #[track_caller]
    pub fn resolve_named_for<T: Send + Sync + 'static>(
        &self,
        name: &str,
        owner: &'static str,
    ) -> Result<Arc<T>> {
        self.resolve_impl(name, Location::caller(), Some(owner))
    }

    fn resolve_impl<T: Send + Sync + 'static>(
        &self,
        name: &str,
        location: &'static Location<'static>,
        owner: Option<&'static str>,
    ) -> Result<Arc<T>> {
        let type_id = TypeId::of::<T>();
        let entry = match self.slots.get(&(type_id, name.to_string())) {
            Some(entry) => entry.value().clone(),
            None => {
                // Distinguish an unknown type from an unknown name.
                let type_known = self.slots.iter().any(|entry| entry.key().0 == type_id);
                return Err(if type_known {
                    HostError::NameNotRegistered {
                        type_name: short_type_name::<T>().to_string(),
                        name: name.to_string(),
                    }
                } else {
                    HostError::TypeNotRegistered {
                        type_name: short_type_name::<T>().to_string(),
                    }
                });
            }
        };

        let value = entry
            .downcast::<T>()
            .unwrap_or_else(|_| panic!("container slot holds a mismatched type; this is a bug in hearth"));
        self.record(DependencyEventKind::Resolved, short_type_name::<T>(), name, location, owner);
        Ok(value)
    }

    /// Wipe all slots and the event log. Intended for test isolation.
    pub fn clear(&self) {
        self.slots.clear();
        self.events.lock().unwrap().clear();
        self.seq.store(0, Ordering::SeqCst);
    }

    /// Snapshot of the event log, in sequence order.
    pub fn events(&self) -> Vec<DependencyEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn record(
        &self,
        kind: DependencyEventKind,
        type_name: &str,
        name: &str,
        location: &'static Location<'static>,
        owner: Option<&'static str>,
    ) {
        let mut events = self.events.lock().unwrap();
        events.push(DependencyEvent {
            kind,
            type_name: type_name.to_string(),
            name: name.to_string(),
            file: location.file().to_string(),
            line: location.line(),
            owner: owner.map(|owner| owner.to_string()),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
        });
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: LazyLock<Container> = LazyLock::new(Container::new);

/// The process-wide container used by derive-driven injection.
pub fn global() -> &'static Container {
    &GLOBAL
}
