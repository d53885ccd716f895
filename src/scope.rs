//! Bean scopes: built-in singleton/prototype policies and pluggable custom scopes.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use parking_lot::Mutex;

use crate::error::{BeanError, BeanResult};
use crate::key::AnyArc;

/// Scope policy of a bean definition
///
/// # Scope Characteristics
///
/// - **Singleton**: created once per container, cached, destroyed on close
/// - **Prototype**: created on every request, never cached, never destroyed by the container
/// - **Custom**: delegated to a [`Scope`] registered under the given name
///
/// # Examples
///
/// ```rust
/// use ferrous_beans::ScopeKind;
///
/// assert_eq!("singleton".parse::<ScopeKind>().unwrap(), ScopeKind::Singleton);
/// assert_eq!("request".parse::<ScopeKind>().unwrap(), ScopeKind::Custom("request".into()));
/// assert_eq!(ScopeKind::Prototype.to_string(), "prototype");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ScopeKind {
    /// Single shared instance, cached forever
    #[default]
    Singleton,
    /// New instance per request, never cached
    Prototype,
    /// Delegated to a registered [`Scope`] strategy
    Custom(String),
}

impl ScopeKind {
    pub const SINGLETON: &'static str = "singleton";
    pub const PROTOTYPE: &'static str = "prototype";

    pub fn is_singleton(&self) -> bool {
        matches!(self, ScopeKind::Singleton)
    }

    pub fn is_prototype(&self) -> bool {
        matches!(self, ScopeKind::Prototype)
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Singleton => f.write_str(Self::SINGLETON),
            ScopeKind::Prototype => f.write_str(Self::PROTOTYPE),
            ScopeKind::Custom(name) => f.write_str(name),
        }
    }
}

impl FromStr for ScopeKind {
    type Err = BeanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | Self::SINGLETON => Ok(ScopeKind::Singleton),
            Self::PROTOTYPE => Ok(ScopeKind::Prototype),
            other => Ok(ScopeKind::Custom(other.to_string())),
        }
    }
}

/// Callback run when a scoped bean is destroyed.
pub type DestructionCallback = Box<dyn FnOnce() + Send>;

/// Strategy backing a custom scope (request, session, conversation, ...).
///
/// The container hands the scope an object factory that runs the complete
/// creation pipeline; the scope decides when to call it and how long to keep
/// the result.
pub trait Scope: Send + Sync {
    /// Returns the scoped object, creating it through `object_factory` if absent.
    fn get(&self, name: &str, object_factory: &dyn Fn() -> BeanResult<AnyArc>) -> BeanResult<AnyArc>;

    /// Removes the object from the scope, returning it if it was present.
    fn remove(&self, name: &str) -> Option<AnyArc>;

    /// Registers a callback to run when the named object is destroyed by the scope.
    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback);

    /// Identifier of the current underlying conversation, if any.
    fn conversation_id(&self) -> Option<String> {
        None
    }
}

/// Map-backed scope whose lifetime is ended explicitly with [`SimpleScope::reset`].
///
/// # Examples
///
/// ```rust
/// use ferrous_beans::{AnyArc, Scope, SimpleScope};
/// use std::sync::Arc;
///
/// let scope = SimpleScope::new("request-1");
/// let first = scope.get("id", &|| Ok(Arc::new(7u32) as AnyArc)).unwrap();
/// let second = scope.get("id", &|| Ok(Arc::new(8u32) as AnyArc)).unwrap();
/// assert!(Arc::ptr_eq(&first, &second));
///
/// scope.reset();
/// assert!(scope.remove("id").is_none());
/// ```
pub struct SimpleScope {
    id: String,
    objects: Mutex<HashMap<String, AnyArc>>,
    callbacks: Mutex<Vec<(String, DestructionCallback)>>,
}

impl SimpleScope {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            objects: Mutex::new(HashMap::new()),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Number of objects currently held by the scope.
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ends the scope: drops every object and runs destruction callbacks in LIFO order.
    pub fn reset(&self) {
        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        self.objects.lock().clear();
        for (name, callback) in callbacks.into_iter().rev() {
            tracing::debug!(scope = %self.id, bean = %name, "running scoped destruction callback");
            callback();
        }
    }
}

impl Scope for SimpleScope {
    fn get(&self, name: &str, object_factory: &dyn Fn() -> BeanResult<AnyArc>) -> BeanResult<AnyArc> {
        // Never hold the lock while invoking the factory: it may resolve other scoped beans
        if let Some(existing) = self.objects.lock().get(name) {
            return Ok(existing.clone());
        }

        let created = object_factory()?;

        let mut objects = self.objects.lock();
        Ok(objects.entry(name.to_string()).or_insert(created).clone())
    }

    fn remove(&self, name: &str) -> Option<AnyArc> {
        let removed = self.objects.lock().remove(name);
        if removed.is_some() {
            self.callbacks.lock().retain(|(owner, _)| owner != name);
        }
        removed
    }

    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback) {
        self.callbacks.lock().push((name.to_string(), callback));
    }

    fn conversation_id(&self) -> Option<String> {
        Some(self.id.clone())
    }
}
