//! The application context: register, refresh, use, close.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::config::ContextConfig;
use crate::definition::BeanDefinition;
use crate::error::{BeanError, BeanResult};
use crate::event::{ApplicationEvent, ApplicationListener, EventMulticaster, SimpleEventMulticaster};
use crate::factory::BeanFactory;
use crate::key::TypeKey;
use crate::observer::CreationObserver;
use crate::processor::{sort_factory_processors, BeanFactoryPostProcessor, BeanPostProcessor};
use crate::scope::Scope;
use crate::traits::BeanProvider;
use crate::value::{Bean, DependencySpec};

/// Lifecycle state of an [`ApplicationContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Accepting registrations; beans cannot be requested yet.
    Created,
    Refreshing,
    Active,
    /// Closed or failed to refresh; terminal.
    Closed,
}

/// Application context
///
/// Wraps a [`BeanFactory`] with the container lifecycle:
///
/// 1. register definitions, singletons, aliases, processors, scopes and listeners
/// 2. [`refresh`](Self::refresh) once: factory post-processors rewrite the
///    definitions, the definitions are frozen, post-processor and listener
///    beans are registered, eager singletons are created and
///    [`ApplicationEvent::ContextRefreshed`] is published
/// 3. request beans
/// 4. [`close`](Self::close): [`ApplicationEvent::ContextClosed`] is published
///    and singletons are destroyed, dependents first
///
/// A refresh failure destroys whatever was created and leaves the context
/// closed. Dropping an active context closes it.
///
/// # Examples
///
/// ```rust
/// use ferrous_beans::{ApplicationContext, BeanDefinition, Beans, Param};
/// use std::sync::Arc;
///
/// trait Store: Send + Sync { fn name(&self) -> &str; }
///
/// struct Memory;
/// impl Store for Memory { fn name(&self) -> &str { "memory" } }
///
/// struct Service { store: Arc<dyn Store> }
///
/// let mut context = ApplicationContext::new();
/// context.register("store", BeanDefinition::of::<Memory>()
///     .constructor(vec![], |_| Ok(Memory))
///     .exposes::<dyn Store, Memory>(|m| m as Arc<dyn Store>)).unwrap();
/// context.register("service", BeanDefinition::of::<Service>()
///     .constructor(vec![Param::autowire::<dyn Store>("store")], |args| {
///         Ok(Service { store: args.bean::<dyn Store>(0)? })
///     })).unwrap();
/// context.refresh().unwrap();
///
/// let service = context.get::<Service>("service").unwrap();
/// assert_eq!(service.store.name(), "memory");
/// context.close();
/// ```
pub struct ApplicationContext {
    factory: BeanFactory,
    config: ContextConfig,
    factory_processors: Vec<Arc<dyn BeanFactoryPostProcessor>>,
    multicaster: Arc<dyn EventMulticaster>,
    state: Mutex<ContextState>,
    closing: AtomicBool,
}

impl Default for ApplicationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationContext {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        let mut factory = BeanFactory::new();
        factory.set_allow_circular_references(config.allow_circular_references);
        factory.set_allow_definition_overriding(config.allow_definition_overriding);
        Self {
            factory,
            config,
            factory_processors: Vec::new(),
            multicaster: Arc::new(SimpleEventMulticaster::new()),
            state: Mutex::new(ContextState::Created),
            closing: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn display_name(&self) -> &str {
        &self.config.display_name
    }

    pub fn state(&self) -> ContextState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.state() == ContextState::Active
    }

    /// The underlying factory, for introspection.
    pub fn bean_factory(&self) -> &BeanFactory {
        &self.factory
    }

    // ----- setup -----

    pub fn register(&mut self, name: impl Into<String>, definition: BeanDefinition) -> BeanResult<()> {
        self.factory.register_definition(name, definition)
    }

    pub fn register_singleton<T: std::any::Any + Send + Sync>(&mut self, name: impl Into<String>, instance: T) -> BeanResult<()> {
        self.factory.register_singleton(name, instance)
    }

    pub fn register_alias(&mut self, name: &str, alias: impl Into<String>) -> BeanResult<()> {
        self.factory.register_alias(name, alias)
    }

    pub fn add_factory_post_processor(&mut self, processor: Arc<dyn BeanFactoryPostProcessor>) {
        self.factory_processors.push(processor);
    }

    pub fn add_bean_post_processor(&mut self, processor: Arc<dyn BeanPostProcessor>) {
        self.factory.add_bean_post_processor(processor);
    }

    pub fn register_scope(&mut self, name: impl Into<String>, scope: Arc<dyn Scope>) -> BeanResult<()> {
        self.factory.register_scope(name, scope)
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ApplicationListener>) {
        self.multicaster.add_listener(listener);
    }

    /// Replaces the event multicaster; listeners registered so far stay with the old one.
    pub fn set_event_multicaster(&mut self, multicaster: Arc<dyn EventMulticaster>) {
        self.multicaster = multicaster;
    }

    pub fn add_observer(&mut self, observer: Arc<dyn CreationObserver>) {
        self.factory.add_observer(observer);
    }

    // ----- lifecycle -----

    /// Refreshes the context; legal exactly once.
    pub fn refresh(&self) -> BeanResult<()> {
        {
            let mut state = self.state.lock();
            if *state != ContextState::Created {
                return Err(BeanError::IllegalState(format!(
                    "context '{}' cannot be refreshed in state {:?}",
                    self.display_name(),
                    *state
                )));
            }
            *state = ContextState::Refreshing;
        }
        tracing::info!(context = %self.display_name(), "refreshing application context");
        let started = Instant::now();

        match self.do_refresh() {
            Ok(()) => {
                *self.state.lock() = ContextState::Active;
                tracing::info!(
                    context = %self.display_name(),
                    singletons = self.factory.singleton_count(),
                    elapsed = ?started.elapsed(),
                    "application context refreshed"
                );
                self.multicaster.multicast(&ApplicationEvent::ContextRefreshed);
                Ok(())
            }
            Err(err) => {
                tracing::error!(context = %self.display_name(), error = %err, "refresh failed; destroying created singletons");
                self.closing.store(true, Ordering::SeqCst);
                self.factory.destroy_singletons();
                *self.state.lock() = ContextState::Closed;
                Err(err)
            }
        }
    }

    fn do_refresh(&self) -> BeanResult<()> {
        self.invoke_factory_post_processors()?;
        self.factory.freeze_configuration();
        self.register_post_processor_beans()?;
        self.register_listener_beans()?;
        self.factory.pre_instantiate_singletons()
    }

    fn invoke_factory_post_processors(&self) -> BeanResult<()> {
        let mut explicit = self.factory_processors.clone();
        sort_factory_processors(&mut explicit);
        for processor in &explicit {
            self.run_factory_post_processor(processor.as_ref())?;
        }

        // Processors may register further processor beans; repeat until none are new
        let key = TypeKey::of::<dyn BeanFactoryPostProcessor>();
        let mut processed = HashSet::new();
        loop {
            let pending: Vec<String> =
                self.factory.names_for_type(key)?.into_iter().filter(|name| !processed.contains(name)).collect();
            if pending.is_empty() {
                return Ok(());
            }
            let mut group = Vec::with_capacity(pending.len());
            for name in pending {
                group.push(self.factory.get_bean(&name)?.downcast::<dyn BeanFactoryPostProcessor>()?);
                processed.insert(name);
            }
            sort_factory_processors(&mut group);
            for processor in &group {
                self.run_factory_post_processor(processor.as_ref())?;
            }
        }
    }

    fn run_factory_post_processor(&self, processor: &dyn BeanFactoryPostProcessor) -> BeanResult<()> {
        self.factory
            .with_registry_mut(|registry| processor.post_process(registry))
            .map_err(|err| BeanError::from_callback("<factory post-processor>", err))
    }

    fn register_post_processor_beans(&self) -> BeanResult<()> {
        for name in self.factory.names_for_type(TypeKey::of::<dyn BeanPostProcessor>())? {
            let processor = self.factory.get_bean(&name)?.downcast::<dyn BeanPostProcessor>()?;
            tracing::debug!(bean = %name, "registered bean post-processor");
            self.factory.add_bean_post_processor(processor);
        }
        Ok(())
    }

    fn register_listener_beans(&self) -> BeanResult<()> {
        for name in self.factory.names_for_type(TypeKey::of::<dyn ApplicationListener>())? {
            let listener = self.factory.get_bean(&name)?.downcast::<dyn ApplicationListener>()?;
            self.multicaster.add_listener(listener);
        }
        Ok(())
    }

    /// Closes the context; later calls do nothing.
    pub fn close(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        let previous = self.state();
        if previous == ContextState::Active {
            tracing::info!(context = %self.display_name(), "closing application context");
            self.multicaster.multicast(&ApplicationEvent::ContextClosed);
        }
        self.factory.destroy_singletons();
        *self.state.lock() = ContextState::Closed;
    }

    pub fn publish_event(&self, event: ApplicationEvent) {
        self.multicaster.multicast(&event);
    }

    // ----- lookup -----

    fn check_active(&self) -> BeanResult<()> {
        match self.state() {
            ContextState::Refreshing | ContextState::Active => Ok(()),
            state => Err(BeanError::IllegalState(format!(
                "context '{}' is not active ({:?})",
                self.display_name(),
                state
            ))),
        }
    }

    pub fn get_bean(&self, name: &str) -> BeanResult<Bean> {
        self.check_active()?;
        self.factory.get_bean(name)
    }

    pub fn get_bean_of_type(&self, key: TypeKey) -> BeanResult<Bean> {
        self.check_active()?;
        self.factory.get_bean_of_type(key)
    }

    pub fn get_beans_of_type(&self, key: TypeKey) -> BeanResult<Vec<Bean>> {
        self.check_active()?;
        self.factory.get_beans_of_type(key)
    }

    pub fn resolve_dependency(&self, consumer: &str, spec: &DependencySpec) -> BeanResult<Option<Bean>> {
        self.check_active()?;
        self.factory.resolve_dependency(consumer, spec)
    }

    pub fn contains_bean(&self, name: &str) -> bool {
        self.factory.contains_bean(name)
    }

    pub fn is_singleton(&self, name: &str) -> BeanResult<bool> {
        self.factory.is_singleton(name)
    }

    pub fn is_prototype(&self, name: &str) -> BeanResult<bool> {
        self.factory.is_prototype(name)
    }

    pub fn bean_names(&self) -> Vec<String> {
        self.factory.bean_names()
    }

    pub fn aliases(&self, name: &str) -> Vec<String> {
        self.factory.with_registry(|registry| registry.aliases(name))
    }

    /// Removes a custom-scoped bean from its scope, running its destruction.
    pub fn destroy_scoped_bean(&self, name: &str) -> BeanResult<()> {
        self.factory.destroy_scoped_bean(name)
    }
}

impl BeanProvider for ApplicationContext {
    fn get_bean(&self, name: &str) -> BeanResult<Bean> {
        ApplicationContext::get_bean(self, name)
    }

    fn get_bean_of_type(&self, key: TypeKey) -> BeanResult<Bean> {
        ApplicationContext::get_bean_of_type(self, key)
    }

    fn get_beans_of_type(&self, key: TypeKey) -> BeanResult<Vec<Bean>> {
        ApplicationContext::get_beans_of_type(self, key)
    }

    fn contains_bean(&self, name: &str) -> bool {
        ApplicationContext::contains_bean(self, name)
    }
}

impl Drop for ApplicationContext {
    fn drop(&mut self) {
        if self.state() == ContextState::Active {
            tracing::warn!(context = %self.display_name(), "application context dropped while active; closing it");
            self.close();
        }
    }
}
