//! Cancellation scope
//!
//! A `Scope` is the handle every user entry point receives: an immutable
//! carrier for a cancellation signal, an optional deadline, and opaque keyed
//! values. Deriving a scope never mutates its parent; cancelling a scope
//! cancels it and everything derived from it.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// An immutable cancellation and value-propagation carrier.
///
/// Cheap to clone; clones refer to the same scope.
///
/// # Example
///
/// ```rust,ignore
/// let root = Scope::background();
/// let scoped = root.with_value("tenant", "acme".to_string());
/// let worker = scoped.derive();
///
/// assert_eq!(worker.value::<String>("tenant").unwrap().as_str(), "acme");
/// root.cancel();
/// assert!(worker.is_cancelled());
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    token: CancellationToken,
    deadline: Option<Instant>,
    value: Option<(String, Arc<dyn Any + Send + Sync>)>,
    parent: Option<Scope>,
}

impl Scope {
    /// The root scope: never cancelled unless `cancel` is called on it.
    pub fn background() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                token: CancellationToken::new(),
                deadline: None,
                value: None,
                parent: None,
            }),
        }
    }

    /// Derive a child scope. Cancelling the parent cancels the child;
    /// cancelling the child leaves the parent untouched.
    pub fn derive(&self) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                token: self.inner.token.child_token(),
                deadline: self.inner.deadline,
                value: None,
                parent: Some(self.clone()),
            }),
        }
    }

    /// Derive a child scope that is cancelled automatically after `timeout`.
    ///
    /// The effective deadline never extends past the parent's deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a child scope that is cancelled automatically at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.inner.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        let child = Self {
            inner: Arc::new(ScopeInner {
                token: self.inner.token.child_token(),
                deadline: Some(deadline),
                value: None,
                parent: Some(self.clone()),
            }),
        };

        // Watchdog task: fires the token at the deadline, exits early if
        // the scope is cancelled first.
        let token = child.inner.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => token.cancel(),
            }
        });

        child
    }

    /// Derive a scope carrying `value` under `key`. The new scope shares its
    /// parent's cancellation signal and deadline.
    pub fn with_value<V: Any + Send + Sync>(&self, key: impl Into<String>, value: V) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                token: self.inner.token.clone(),
                deadline: self.inner.deadline,
                value: Some((key.into(), Arc::new(value))),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Read a value by key, walking up the derivation chain. Returns `None`
    /// when the key is absent or holds a different type.
    pub fn value<V: Any + Send + Sync>(&self, key: &str) -> Option<Arc<V>> {
        let mut scope = self;
        loop {
            if let Some((k, v)) = &scope.inner.value {
                if k == key {
                    if let Ok(typed) = v.clone().downcast::<V>() {
                        return Some(typed);
                    }
                }
            }
            match &scope.inner.parent {
                Some(parent) => scope = parent,
                None => return None,
            }
        }
    }

    /// Cancel this scope and every scope derived from it.
    pub fn cancel(&self) {
        self.inner.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Completes when the scope is cancelled.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}
