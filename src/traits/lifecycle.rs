//! Lifecycle callbacks a bean can implement itself.
//!
//! The container only sees these through a type view: expose the trait on the
//! definition with [`BeanDefinition::exposes`](crate::BeanDefinition::exposes)
//! and the callback runs automatically.

use crate::error::BoxError;

/// Invoked once all properties are populated, before any declared init method.
///
/// # Examples
///
/// ```
/// use ferrous_beans::{BeanDefinition, BeanFactory, BoxError, InitializingBean};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Cache { warmed: AtomicBool }
///
/// impl InitializingBean for Cache {
///     fn after_properties_set(&self) -> Result<(), BoxError> {
///         self.warmed.store(true, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let factory = BeanFactory::new();
/// factory.register_definition("cache", BeanDefinition::of::<Cache>()
///     .constructor(vec![], |_| Ok(Cache::default()))
///     .exposes::<dyn InitializingBean, Cache>(|c| c as Arc<dyn InitializingBean>)).unwrap();
///
/// let cache = factory.get_bean("cache").unwrap().downcast::<Cache>().unwrap();
/// assert!(cache.warmed.load(Ordering::SeqCst));
/// ```
pub trait InitializingBean: Send + Sync {
    fn after_properties_set(&self) -> Result<(), BoxError>;
}

/// Invoked when the owning container or scope destroys the bean, before any
/// declared destroy method. Failures are logged, never propagated.
pub trait DisposableBean: Send + Sync {
    fn destroy(&self) -> Result<(), BoxError>;
}
