//! Diagnostic observers for bean creation.
//!
//! Observers are notified around every run of the creation pipeline. They
//! see prototype and custom-scope creations as well as singletons, but never
//! cache hits.

use std::sync::Arc;
use std::time::Duration;

use crate::error::BeanError;
use crate::scope::ScopeKind;

/// Observer of bean creation events.
///
/// Observer calls are made synchronously on the creating thread, so keep
/// implementations lightweight.
///
/// # Examples
///
/// ```
/// use ferrous_beans::{BeanError, CreationObserver, ScopeKind};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct CountingObserver {
///     created: AtomicUsize,
/// }
///
/// impl CreationObserver for CountingObserver {
///     fn created(&self, _name: &str, _scope: &ScopeKind, _duration: Duration) {
///         self.created.fetch_add(1, Ordering::Relaxed);
///     }
/// }
/// ```
pub trait CreationObserver: Send + Sync {
    /// Called before the creation pipeline runs for `name`.
    fn creating(&self, _name: &str, _scope: &ScopeKind) {}

    /// Called when a bean was created successfully.
    ///
    /// `duration` covers the whole pipeline, nested creations included.
    fn created(&self, _name: &str, _scope: &ScopeKind, _duration: Duration) {}

    /// Called when creating `name` failed.
    fn creation_failed(&self, _name: &str, _error: &BeanError) {}
}

/// Container for registered observers.
///
/// Designed to have minimal overhead when no observers are registered.
#[derive(Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn CreationObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn CreationObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn creating(&self, name: &str, scope: &ScopeKind) {
        for observer in &self.observers {
            observer.creating(name, scope);
        }
    }

    #[inline]
    pub(crate) fn created(&self, name: &str, scope: &ScopeKind, duration: Duration) {
        for observer in &self.observers {
            observer.created(name, scope, duration);
        }
    }

    #[inline]
    pub(crate) fn creation_failed(&self, name: &str, error: &BeanError) {
        for observer in &self.observers {
            observer.creation_failed(name, error);
        }
    }
}

/// Built-in observer emitting `tracing` events.
///
/// Creations slower than the threshold are reported at `info`, everything
/// else at `debug`; failures at `warn`.
///
/// ```
/// use ferrous_beans::{ApplicationContext, TracingObserver};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let mut context = ApplicationContext::new();
/// context.add_observer(Arc::new(TracingObserver::with_threshold(Duration::from_millis(50))));
/// ```
pub struct TracingObserver {
    slow_threshold: Duration,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self { slow_threshold: Duration::from_millis(100) }
    }

    pub fn with_threshold(slow_threshold: Duration) -> Self {
        Self { slow_threshold }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl CreationObserver for TracingObserver {
    fn creating(&self, name: &str, scope: &ScopeKind) {
        tracing::trace!(bean = name, scope = %scope, "creating bean");
    }

    fn created(&self, name: &str, scope: &ScopeKind, duration: Duration) {
        if duration >= self.slow_threshold {
            tracing::info!(bean = name, scope = %scope, elapsed = ?duration, "slow bean creation");
        } else {
            tracing::debug!(bean = name, scope = %scope, elapsed = ?duration, "created bean");
        }
    }

    fn creation_failed(&self, name: &str, error: &BeanError) {
        tracing::warn!(bean = name, error = %error, "bean creation failed");
    }
}
