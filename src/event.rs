//! Application events.
//!
//! The context publishes [`ApplicationEvent::ContextRefreshed`] once a refresh
//! completes and [`ApplicationEvent::ContextClosed`] when it closes. Beans and
//! callers may publish their own [`ApplicationEvent::Custom`] events.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::BoxError;
use crate::key::AnyArc;

/// Event delivered to every [`ApplicationListener`].
#[derive(Clone)]
pub enum ApplicationEvent {
    /// The context finished refreshing; every eager singleton exists.
    ContextRefreshed,
    /// The context is closing; singletons are still alive.
    ContextClosed,
    Custom { kind: String, payload: AnyArc },
}

impl ApplicationEvent {
    pub fn custom<T: Any + Send + Sync>(kind: impl Into<String>, payload: T) -> Self {
        ApplicationEvent::Custom { kind: kind.into(), payload: Arc::new(payload) }
    }

    pub fn kind(&self) -> &str {
        match self {
            ApplicationEvent::ContextRefreshed => "context-refreshed",
            ApplicationEvent::ContextClosed => "context-closed",
            ApplicationEvent::Custom { kind, .. } => kind,
        }
    }

    /// Payload of a custom event, if it is a `T`.
    pub fn payload<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            ApplicationEvent::Custom { payload, .. } => payload.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for ApplicationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationEvent::Custom { kind, .. } => f.debug_struct("Custom").field("kind", kind).finish_non_exhaustive(),
            other => f.write_str(other.kind()),
        }
    }
}

/// Receives application events
///
/// Closures taking `&ApplicationEvent` are listeners too. A listener bean is
/// picked up during refresh when its definition exposes `dyn ApplicationListener`.
///
/// ```
/// use ferrous_beans::{ApplicationEvent, ApplicationListener, BoxError};
///
/// let listener = |event: &ApplicationEvent| -> Result<(), BoxError> {
///     println!("received {}", event.kind());
///     Ok(())
/// };
/// listener.on_event(&ApplicationEvent::ContextRefreshed).unwrap();
/// ```
pub trait ApplicationListener: Send + Sync {
    fn on_event(&self, event: &ApplicationEvent) -> Result<(), BoxError>;
}

impl<F> ApplicationListener for F
where
    F: Fn(&ApplicationEvent) -> Result<(), BoxError> + Send + Sync,
{
    fn on_event(&self, event: &ApplicationEvent) -> Result<(), BoxError> {
        self(event)
    }
}

/// Delivers events to registered listeners.
pub trait EventMulticaster: Send + Sync {
    fn add_listener(&self, listener: Arc<dyn ApplicationListener>);

    fn listener_count(&self) -> usize;

    fn multicast(&self, event: &ApplicationEvent);
}

/// Delivers events synchronously, in registration order
///
/// A failing listener is logged at `warn` and does not stop delivery to the
/// others.
#[derive(Default)]
pub struct SimpleEventMulticaster {
    listeners: RwLock<Vec<Arc<dyn ApplicationListener>>>,
}

impl SimpleEventMulticaster {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventMulticaster for SimpleEventMulticaster {
    fn add_listener(&self, listener: Arc<dyn ApplicationListener>) {
        let mut listeners = self.listeners.write();
        // The same listener may be registered explicitly and found as a bean
        if !listeners.iter().any(|existing| Arc::ptr_eq(existing, &listener)) {
            listeners.push(listener);
        }
    }

    fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn multicast(&self, event: &ApplicationEvent) {
        // Snapshot so listeners may register further listeners
        let listeners = self.listeners.read().clone();
        tracing::trace!(event = event.kind(), listeners = listeners.len(), "publishing event");
        for listener in listeners {
            if let Err(err) = listener.on_event(event) {
                tracing::warn!(event = event.kind(), error = %err, "event listener failed");
            }
        }
    }
}
