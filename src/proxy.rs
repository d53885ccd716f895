//! Proxy substitution through the post-processor pipeline.
//!
//! The container does not build proxies itself: a [`ProxyFactory`] wraps a
//! finished bean and [`AutoProxyPostProcessor`] adopts the wrapper as the
//! canonical instance. A proxy is stored as an `Arc<T>` (see [`erase`]), so
//! typed lookups for `T` return it while lookups for the concrete target type
//! no longer match.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::definition::MergedDefinition;
use crate::error::BoxError;
use crate::key::{view_as, AnyArc};
use crate::processor::BeanPostProcessor;

/// Builds proxies around bean instances.
///
/// # Examples
///
/// ```rust
/// use ferrous_beans::{proxy, AnyArc, BoxError, MergedDefinition, ProxyFactory, TypeKey};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
///
/// struct Shouting { inner: Arc<dyn Greeter> }
/// impl Greeter for Shouting {
///     fn greet(&self) -> String { self.inner.greet().to_uppercase() }
/// }
///
/// struct ShoutingProxies;
///
/// impl ProxyFactory for ShoutingProxies {
///     fn applies_to(&self, _name: &str, definition: &MergedDefinition) -> bool {
///         definition.has_type(TypeKey::of::<dyn Greeter>())
///     }
///
///     fn create_proxy(&self, _name: &str, definition: &MergedDefinition, target: AnyArc) -> Result<AnyArc, BoxError> {
///         let inner = proxy::target_as::<dyn Greeter>(&target, definition).ok_or("not a greeter")?;
///         Ok(proxy::erase(Arc::new(Shouting { inner }) as Arc<dyn Greeter>))
///     }
/// }
/// ```
pub trait ProxyFactory: Send + Sync {
    /// Whether the bean should be proxied at all.
    fn applies_to(&self, name: &str, definition: &MergedDefinition) -> bool;

    /// Wraps `target`, returning the proxy to adopt as canonical instance.
    fn create_proxy(&self, name: &str, definition: &MergedDefinition, target: AnyArc) -> Result<AnyArc, BoxError>;
}

/// Erases a proxy so typed lookups for `T` find it directly.
pub fn erase<T>(proxy: Arc<T>) -> AnyArc
where
    T: ?Sized + Send + Sync + 'static,
{
    Arc::new(proxy)
}

/// Views a (possibly already proxied) target as `T`.
pub fn target_as<T>(target: &AnyArc, definition: &MergedDefinition) -> Option<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    view_as::<T>(target, &definition.views)
}

/// Post-processor applying every matching [`ProxyFactory`] after initialization
///
/// When a singleton is handed out early to break a circular reference, the
/// proxy is created at that point instead and the after-initialization stage
/// leaves that same raw instance alone; the container then adopts the early
/// proxy as the canonical instance, so both parties of the cycle see the same
/// object. A different raw instance under the same name (a retry after a
/// failed creation) is wrapped as usual.
pub struct AutoProxyPostProcessor {
    factories: Vec<Arc<dyn ProxyFactory>>,
    /// bean name -> raw instance proxied early
    early_proxied: Mutex<HashMap<String, AnyArc>>,
    order: i32,
}

impl Default for AutoProxyPostProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoProxyPostProcessor {
    pub fn new() -> Self {
        Self { factories: Vec::new(), early_proxied: Mutex::new(HashMap::new()), order: i32::MAX }
    }

    pub fn with_factory(mut self, factory: impl ProxyFactory + 'static) -> Self {
        self.factories.push(Arc::new(factory));
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    fn wrap(&self, name: &str, definition: &MergedDefinition, instance: AnyArc) -> Result<AnyArc, BoxError> {
        let mut current = instance;
        for factory in &self.factories {
            if factory.applies_to(name, definition) {
                tracing::debug!(bean = name, "creating proxy");
                current = factory.create_proxy(name, definition, current)?;
            }
        }
        Ok(current)
    }
}

impl BeanPostProcessor for AutoProxyPostProcessor {
    fn early_reference(&self, name: &str, definition: &MergedDefinition, instance: AnyArc) -> Result<AnyArc, BoxError> {
        self.early_proxied.lock().insert(name.to_string(), instance.clone());
        self.wrap(name, definition, instance)
    }

    fn after_initialization(&self, name: &str, definition: &MergedDefinition, instance: AnyArc) -> Result<AnyArc, BoxError> {
        let early = self.early_proxied.lock().remove(name);
        if early.map_or(false, |raw| Arc::ptr_eq(&raw, &instance)) {
            return Ok(instance);
        }
        self.wrap(name, definition, instance)
    }

    fn order(&self) -> i32 {
        self.order
    }
}
