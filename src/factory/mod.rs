//! The bean factory: turns merged definitions into live, wired instances.
//!
//! [`BeanFactory`] owns the definition registry, the singleton registry, the
//! post-processor chain and the custom scopes, and runs the creation pipeline:
//!
//! 1. before-instantiation hooks (a replacement short-circuits to step 6's
//!    after-initialization hooks)
//! 2. constructor selection and argument resolution, recursively creating
//!    referenced beans
//! 3. raw instantiation (constructor, factory method or provided instance)
//! 4. after-instantiation hooks, which may skip property population
//! 5. property population through setters
//! 6. before-initialization hooks, init callbacks, after-initialization hooks;
//!    the result becomes the canonical instance
//!
//! The bean sits in the per-thread in-creation set for the whole pipeline.

mod constructor;

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::definition::{BeanDefinition, DefinitionRegistry, Instantiation, MergedDefinition};
use crate::error::{BeanError, BeanResult};
use crate::internal::CreationTracker;
use crate::key::{view_as, AnyArc, TypeKey};
use crate::observer::{CreationObserver, Observers};
use crate::processor::{BeanPostProcessor, PostProcessorChain};
use crate::resolver::DependencyResolver;
use crate::scope::{Scope, ScopeKind};
use crate::singletons::{Disposable, EarlyReference, SingletonRegistry};
use crate::traits::{BeanProvider, DisposableBean, InitializingBean};
use crate::value::{AnyArcDebug, Bean, DependencySpec, Injected, ValueSpec};

/// Consumer name used for type lookups made from outside any bean.
const EXTERNAL_CONSUMER: &str = "<external>";

/// Result of one run of the creation pipeline.
struct CreatedBean {
    /// Canonical instance (possibly a proxy)
    instance: AnyArc,
    /// Raw instance lifecycle callbacks run on
    target: AnyArc,
}

/// Runs destruction for one bean: destruction hooks, then `DisposableBean`,
/// then the destroy callback. Failures are logged and swallowed.
struct DisposableAdapter {
    name: String,
    disposable: Disposable,
    processors: Vec<Arc<dyn BeanPostProcessor>>,
}

impl DisposableAdapter {
    fn destroy(self) {
        let DisposableAdapter { name, disposable, processors } = self;
        for processor in &processors {
            if let Err(err) = processor.before_destruction(&name, &disposable.exposed) {
                tracing::warn!(bean = %name, error = %err, "destruction post-processor failed");
            }
        }
        if let Some(bean) = view_as::<dyn DisposableBean>(&disposable.target, &disposable.definition.views) {
            if let Err(err) = bean.destroy() {
                tracing::warn!(bean = %name, error = %err, "destroy failed");
            }
        }
        if let Some(callback) = &disposable.definition.destroy {
            if let Err(err) = callback.invoke(&disposable.target) {
                tracing::warn!(bean = %name, method = callback.name(), error = %err, "destroy method failed");
            }
        }
        tracing::debug!(bean = %name, "destroyed bean");
    }
}

/// Bean factory
///
/// Usable on its own; [`ApplicationContext`](crate::ApplicationContext) adds
/// the refresh/close lifecycle, factory post-processing and events on top.
///
/// # Circular references
///
/// Singletons are only exposed early (before initialization) to break a
/// setter-injection cycle when [`set_allow_circular_references`](Self::set_allow_circular_references)
/// is on. It is off by default: every cycle then fails with
/// [`BeanError::CircularDependency`]. Constructor-only cycles always fail.
///
/// # Examples
///
/// ```rust
/// use ferrous_beans::{BeanDefinition, BeanFactory, Param};
/// use std::sync::Arc;
///
/// struct Pool;
/// struct Repository { pool: Arc<Pool> }
///
/// let factory = BeanFactory::new();
/// factory.register_definition("pool", BeanDefinition::of::<Pool>().constructor(vec![], |_| Ok(Pool))).unwrap();
/// factory.register_definition("repository", BeanDefinition::of::<Repository>()
///     .constructor(vec![Param::autowire::<Pool>("pool")], |args| {
///         Ok(Repository { pool: args.bean::<Pool>(0)? })
///     })).unwrap();
///
/// let repository = factory.get_bean("repository").unwrap().downcast::<Repository>().unwrap();
/// let pool = factory.get_bean("pool").unwrap().downcast::<Pool>().unwrap();
/// assert!(Arc::ptr_eq(&repository.pool, &pool));
/// ```
pub struct BeanFactory {
    registry: RwLock<DefinitionRegistry>,
    singletons: SingletonRegistry,
    tracker: CreationTracker,
    processors: PostProcessorChain,
    scopes: RwLock<HashMap<String, Arc<dyn Scope>>>,
    observers: Observers,
    allow_circular_references: bool,
}

impl Default for BeanFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BeanFactory {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(DefinitionRegistry::new()),
            singletons: SingletonRegistry::new(),
            tracker: CreationTracker::new(),
            processors: PostProcessorChain::new(),
            scopes: RwLock::new(HashMap::new()),
            observers: Observers::default(),
            allow_circular_references: false,
        }
    }

    // ----- configuration -----

    /// Opts into early exposure of singletons to break setter-injection cycles.
    pub fn set_allow_circular_references(&mut self, allow: bool) {
        self.allow_circular_references = allow;
    }

    pub fn allows_circular_references(&self) -> bool {
        self.allow_circular_references
    }

    pub fn set_allow_definition_overriding(&self, allow: bool) {
        self.registry.write().set_allow_overriding(allow);
    }

    pub fn add_observer(&mut self, observer: Arc<dyn CreationObserver>) {
        self.observers.add(observer);
    }

    pub fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>) {
        self.processors.add(processor);
    }

    pub fn bean_post_processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Registers a custom scope under `name`; the built-in names are reserved.
    pub fn register_scope(&self, name: impl Into<String>, scope: Arc<dyn Scope>) -> BeanResult<()> {
        let name = name.into();
        if name == ScopeKind::SINGLETON || name == ScopeKind::PROTOTYPE {
            return Err(BeanError::IllegalState(format!("cannot replace built-in scope '{}'", name)));
        }
        tracing::debug!(scope = %name, "registered scope");
        self.scopes.write().insert(name, scope);
        Ok(())
    }

    pub fn registered_scope(&self, name: &str) -> Option<Arc<dyn Scope>> {
        self.scopes.read().get(name).cloned()
    }

    // ----- definitions -----

    pub fn register_definition(&self, name: impl Into<String>, definition: BeanDefinition) -> BeanResult<()> {
        self.registry.write().register(name, definition)
    }

    pub fn register_alias(&self, name: &str, alias: impl Into<String>) -> BeanResult<()> {
        self.registry.write().register_alias(name, alias)
    }

    /// Registers a ready-made singleton instance under `name`.
    pub fn register_singleton<T: std::any::Any + Send + Sync>(&self, name: impl Into<String>, instance: T) -> BeanResult<()> {
        self.register_definition(name, BeanDefinition::instance(instance))
    }

    /// Read access to the definition registry.
    pub fn with_registry<R>(&self, f: impl FnOnce(&DefinitionRegistry) -> R) -> R {
        f(&self.registry.read())
    }

    /// Write access to the definition registry (factory post-processing).
    pub fn with_registry_mut<R>(&self, f: impl FnOnce(&mut DefinitionRegistry) -> R) -> R {
        f(&mut self.registry.write())
    }

    /// Freezes the definitions; no registration or mutation is accepted afterwards.
    pub fn freeze_configuration(&self) {
        self.registry.write().freeze();
    }

    pub fn merged_definition(&self, name: &str) -> BeanResult<Arc<MergedDefinition>> {
        self.registry.read().merged(name)
    }

    pub fn canonical_name(&self, name: &str) -> String {
        self.registry.read().canonical_name(name)
    }

    pub fn bean_names(&self) -> Vec<String> {
        self.registry.read().names().map(String::from).collect()
    }

    pub fn names_for_type(&self, key: TypeKey) -> BeanResult<Vec<String>> {
        self.registry.read().names_for_type(key)
    }

    // ----- lookup -----

    /// Returns the bean named `name` (or one of its aliases), creating it if needed.
    pub fn get_bean(&self, name: &str) -> BeanResult<Bean> {
        let name = self.canonical_name(name);
        let merged = self.merged_definition(&name)?;

        if let Some(instance) = self.singletons.get(&name) {
            tracing::trace!(bean = %name, "returning cached singleton");
            return Ok(Bean::new(name, instance, merged.views.clone()));
        }
        if merged.is_abstract {
            return Err(BeanError::invalid(&name, "abstract definitions cannot be instantiated"));
        }

        self.create_depends_on(&name, &merged)?;

        let instance = match &merged.scope {
            ScopeKind::Singleton => self.get_singleton(&name, &merged)?,
            ScopeKind::Prototype => self.create_bean(&name, &merged)?.instance,
            ScopeKind::Custom(scope_name) => self.get_scoped(scope_name, &name, &merged)?,
        };
        Ok(Bean::new(name, instance, merged.views.clone()))
    }

    /// Returns the single bean exposing `key`, disambiguated like an
    /// autowired dependency (unique, then primary).
    pub fn get_bean_of_type(&self, key: TypeKey) -> BeanResult<Bean> {
        let spec = DependencySpec { required_type: key, qualifier: None, name_hint: None, optional: false };
        match self.resolve_name(EXTERNAL_CONSUMER, &spec)? {
            Some(name) => self.get_bean(&name),
            None => Err(BeanError::NoSuchDependency { consumer: EXTERNAL_CONSUMER.into(), required_type: key.name() }),
        }
    }

    /// Every non-abstract bean exposing `key`, in registration order.
    pub fn get_beans_of_type(&self, key: TypeKey) -> BeanResult<Vec<Bean>> {
        self.names_for_type(key)?.iter().map(|name| self.get_bean(name)).collect()
    }

    /// Resolves a dependency on behalf of `consumer` and returns the bean.
    pub fn resolve_dependency(&self, consumer: &str, spec: &DependencySpec) -> BeanResult<Option<Bean>> {
        match self.resolve_name(consumer, spec)? {
            Some(name) => {
                self.singletons.register_dependent(&name, consumer);
                self.get_bean(&name).map(Some)
            }
            None => Ok(None),
        }
    }

    pub fn contains_bean(&self, name: &str) -> bool {
        self.registry.read().contains(name)
    }

    pub fn contains_singleton(&self, name: &str) -> bool {
        self.singletons.contains(&self.canonical_name(name))
    }

    pub fn is_singleton(&self, name: &str) -> BeanResult<bool> {
        Ok(self.merged_definition(name)?.scope.is_singleton())
    }

    pub fn is_prototype(&self, name: &str) -> BeanResult<bool> {
        Ok(self.merged_definition(name)?.scope.is_prototype())
    }

    /// True while `name` is being created on the calling thread.
    pub fn is_currently_in_creation(&self, name: &str) -> bool {
        self.tracker.is_in_creation(&self.canonical_name(name))
    }

    pub fn singleton_count(&self) -> usize {
        self.singletons.len()
    }

    /// Singleton names in the order their creation completed.
    pub fn singleton_creation_order(&self) -> Vec<String> {
        self.singletons.creation_order()
    }

    /// Beans that depend on `name`.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.singletons.dependents_of(&self.canonical_name(name))
    }

    /// Beans `name` depends on.
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.singletons.dependencies_of(&self.canonical_name(name))
    }

    // ----- lifecycle -----

    /// Creates every non-abstract, non-lazy singleton in registration order.
    pub fn pre_instantiate_singletons(&self) -> BeanResult<()> {
        for name in self.bean_names() {
            let merged = self.merged_definition(&name)?;
            if !merged.is_abstract && merged.scope.is_singleton() && !merged.lazy_init {
                self.get_bean(&name)?;
            }
        }
        Ok(())
    }

    /// Destroys every singleton: dependents first, newest first.
    pub fn destroy_singletons(&self) {
        let processors = self.processors.snapshot();
        tracing::debug!(count = self.singletons.len(), "destroying singletons");
        self.singletons.destroy_all(&mut |name, disposable| {
            DisposableAdapter { name: name.to_string(), disposable, processors: processors.clone() }.destroy();
        });
    }

    /// Removes `name` from its custom scope and runs its destruction.
    pub fn destroy_scoped_bean(&self, name: &str) -> BeanResult<()> {
        let name = self.canonical_name(name);
        let merged = self.merged_definition(&name)?;
        let ScopeKind::Custom(scope_name) = &merged.scope else {
            return Err(BeanError::IllegalState(format!("bean '{}' is not in a custom scope", name)));
        };
        let scope = self.registered_scope(scope_name).ok_or_else(|| BeanError::NoSuchScope(scope_name.clone()))?;
        if let Some(instance) = scope.remove(&name) {
            let disposable = Disposable { target: instance.clone(), exposed: instance, definition: merged.clone() };
            DisposableAdapter { name, disposable, processors: self.processors.snapshot() }.destroy();
        }
        Ok(())
    }

    // ----- creation -----

    fn create_depends_on(&self, name: &str, merged: &MergedDefinition) -> BeanResult<()> {
        for dependency in &merged.depends_on {
            let dependency = self.resolve_reference(dependency)?;
            if self.singletons.is_dependent(name, &dependency) {
                return Err(BeanError::CircularDependency {
                    chain: vec![name.to_string(), dependency, name.to_string()],
                });
            }
            self.singletons.register_dependent(&dependency, name);
            self.get_bean(&dependency)?;
        }
        Ok(())
    }

    fn get_singleton(&self, name: &str, merged: &Arc<MergedDefinition>) -> BeanResult<AnyArc> {
        let _lock = self.singletons.lock_creation();

        // Another thread may have finished while this one waited
        if let Some(instance) = self.singletons.get(name) {
            return Ok(instance);
        }

        if let Some(early) = self.singletons.early_reference(name) {
            return match early {
                EarlyReference::Exposed(instance) => Ok(instance),
                EarlyReference::Pending { raw, definition } => {
                    tracing::debug!(bean = name, "exposing early reference to break a circular reference");
                    let instance = self.processors.early_reference(name, &definition, raw)?;
                    self.singletons.expose_early(name, instance.clone());
                    Ok(instance)
                }
            };
        }

        match self.create_bean(name, merged) {
            Ok(created) => {
                self.singletons.add_completed(name, created.instance.clone());
                self.singletons.register_disposable(
                    name,
                    Disposable { target: created.target, exposed: created.instance.clone(), definition: merged.clone() },
                );
                Ok(created.instance)
            }
            Err(err) => {
                let processors = self.processors.snapshot();
                self.singletons.discard(name, &mut |dependent, disposable| {
                    tracing::debug!(bean = dependent, failed = name, "destroying dependent of failed singleton");
                    DisposableAdapter { name: dependent.to_string(), disposable, processors: processors.clone() }
                        .destroy();
                });
                Err(err)
            }
        }
    }

    fn get_scoped(&self, scope_name: &str, name: &str, merged: &Arc<MergedDefinition>) -> BeanResult<AnyArc> {
        let scope = self
            .registered_scope(scope_name)
            .ok_or_else(|| BeanError::NoSuchScope(scope_name.to_string()))?;

        // Only the object the scope keeps gets a destruction callback
        let pending = RefCell::new(None);
        let instance = scope.get(name, &|| {
            let created = self.create_bean(name, merged)?;
            let adapter = DisposableAdapter {
                name: name.to_string(),
                disposable: Disposable {
                    target: created.target,
                    exposed: created.instance.clone(),
                    definition: merged.clone(),
                },
                processors: self.processors.snapshot(),
            };
            *pending.borrow_mut() = Some(adapter);
            Ok(created.instance)
        })?;

        if let Some(adapter) = pending.into_inner() {
            if Arc::ptr_eq(&adapter.disposable.exposed, &instance) {
                scope.register_destruction_callback(name, Box::new(move || adapter.destroy()));
            } else {
                tracing::debug!(bean = name, scope = scope_name, "scoped bean created concurrently; dropping the unused instance");
            }
        }
        Ok(instance)
    }

    fn create_bean(&self, name: &str, merged: &Arc<MergedDefinition>) -> BeanResult<CreatedBean> {
        let _guard = self.tracker.enter(name)?;
        tracing::debug!(bean = name, scope = %merged.scope, "creating bean");

        if !self.observers.has_observers() {
            return self.run_pipeline(name, merged);
        }
        self.observers.creating(name, &merged.scope);
        let started = Instant::now();
        let result = self.run_pipeline(name, merged);
        match &result {
            Ok(_) => self.observers.created(name, &merged.scope, started.elapsed()),
            Err(err) => self.observers.creation_failed(name, err),
        }
        result
    }

    fn run_pipeline(&self, name: &str, merged: &Arc<MergedDefinition>) -> BeanResult<CreatedBean> {
        if let Some(instance) = self.processors.before_instantiation(name, merged)? {
            tracing::trace!(bean = name, "instantiation short-circuited by post-processor");
            let instance = self.processors.after_initialization(name, merged, instance)?;
            return Ok(CreatedBean { target: instance.clone(), instance });
        }

        let raw = self.instantiate(name, merged)?;

        let early_exposure = merged.scope.is_singleton() && self.allow_circular_references;
        if early_exposure {
            self.singletons.add_early(name, raw.clone(), merged.clone());
        }

        if self.processors.after_instantiation(name, &raw)? {
            self.populate(name, merged, &raw)?;
        } else {
            tracing::trace!(bean = name, "property population skipped by post-processor");
        }

        let exposed = self.initialize(name, merged, &raw)?;

        let instance = match self.singletons.exposed_early(name).filter(|_| early_exposure) {
            // Nothing replaced the raw object: adopt what was handed out early
            Some(early) if Arc::ptr_eq(&exposed, &raw) => early,
            Some(early) if Arc::ptr_eq(&exposed, &early) => exposed,
            Some(_) => {
                return Err(BeanError::creation(
                    name,
                    format!(
                        "bean '{}' was injected into other beans in its raw form as part of a circular \
                         reference, but has since been wrapped by a post-processor",
                        name
                    ),
                ))
            }
            None => exposed,
        };
        Ok(CreatedBean { instance, target: raw })
    }

    fn instantiate(&self, name: &str, merged: &MergedDefinition) -> BeanResult<AnyArc> {
        match &merged.instantiation {
            None => Err(BeanError::invalid(name, "no constructor, factory method or instance")),
            Some(Instantiation::Instance(instance)) => Ok(instance.clone()),
            Some(Instantiation::Constructors(candidates)) => {
                let selected = constructor::select_constructor(self, name, merged, candidates)?;
                let args = constructor::resolve_args(self, name, merged, selected.params())?;
                selected.invoke(&args).map_err(|err| BeanError::from_callback(name, err))
            }
            Some(Instantiation::FactoryMethod(method)) => {
                let factory = match method.factory_bean() {
                    Some(factory_name) => {
                        let factory_name = self.resolve_reference(factory_name)?;
                        self.singletons.register_dependent(&factory_name, name);
                        Some(self.get_bean(&factory_name)?)
                    }
                    None => None,
                };
                let args = constructor::resolve_args(self, name, merged, method.params())?;
                tracing::trace!(bean = name, method = method.method(), "invoking factory method");
                method.call(factory.as_ref(), &args).map_err(|err| BeanError::from_callback(name, err))
            }
        }
    }

    fn populate(&self, name: &str, merged: &MergedDefinition, raw: &AnyArc) -> BeanResult<()> {
        for property in &merged.properties {
            let value = self.resolve_value(name, property.value())?;
            property.apply(raw, &value).map_err(|err| BeanError::from_callback(name, err))?;
        }
        Ok(())
    }

    fn initialize(&self, name: &str, merged: &MergedDefinition, raw: &AnyArc) -> BeanResult<AnyArc> {
        let instance = self.processors.before_initialization(name, merged, raw.clone())?;

        if let Some(bean) = view_as::<dyn InitializingBean>(raw, &merged.views) {
            bean.after_properties_set().map_err(|err| BeanError::from_callback(name, err))?;
        }
        if let Some(callback) = &merged.init {
            tracing::trace!(bean = name, method = callback.name(), "invoking init method");
            callback.invoke(raw).map_err(|err| BeanError::from_callback(name, err))?;
        }

        self.processors.after_initialization(name, merged, instance)
    }

    // ----- value resolution -----

    fn resolve_reference(&self, name: &str) -> BeanResult<String> {
        let registry = self.registry.read();
        DependencyResolver::new(&registry).resolve_reference(name)
    }

    fn resolve_name(&self, consumer: &str, spec: &DependencySpec) -> BeanResult<Option<String>> {
        let registry = self.registry.read();
        DependencyResolver::new(&registry).resolve(consumer, spec)
    }

    fn candidates(&self, consumer: &str, key: TypeKey) -> BeanResult<Vec<String>> {
        let registry = self.registry.read();
        DependencyResolver::new(&registry).candidates(consumer, key)
    }

    /// Resolves a value for `consumer`, creating referenced beans.
    pub(crate) fn resolve_value(&self, consumer: &str, spec: &ValueSpec) -> BeanResult<Injected> {
        match spec {
            ValueSpec::Literal(value) => Ok(Injected::Value(AnyArcDebug(value.clone()))),
            ValueSpec::Text(text) => Ok(Injected::Text(text.clone())),
            ValueSpec::Ref(reference) => {
                let provider = self.resolve_reference(reference)?;
                self.singletons.register_dependent(&provider, consumer);
                Ok(Injected::Bean(self.get_bean(&provider)?))
            }
            ValueSpec::Autowire(dependency) => match self.resolve_dependency(consumer, dependency)? {
                Some(bean) => Ok(Injected::Bean(bean)),
                None => Ok(Injected::Absent),
            },
            ValueSpec::All(key) => {
                let mut beans = Vec::new();
                for provider in self.candidates(consumer, *key)? {
                    self.singletons.register_dependent(&provider, consumer);
                    beans.push(self.get_bean(&provider)?);
                }
                Ok(Injected::Beans(beans))
            }
        }
    }

    /// Checks that a value would resolve for `consumer` without creating anything.
    pub(crate) fn check_value(&self, consumer: &str, spec: &ValueSpec) -> BeanResult<()> {
        match spec {
            ValueSpec::Literal(_) | ValueSpec::Text(_) | ValueSpec::All(_) => Ok(()),
            ValueSpec::Ref(reference) => self.resolve_reference(reference).map(|_| ()),
            ValueSpec::Autowire(dependency) => self.resolve_name(consumer, dependency).map(|_| ()),
        }
    }

    // ----- diagnostics -----

    /// Human-readable dump of definitions, singletons and dependency edges.
    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let registry = self.registry.read();
        let _ = writeln!(out, "BeanFactory ({} definitions, {} singletons)", registry.len(), self.singletons.len());
        for name in registry.names() {
            let Ok(merged) = registry.merged(name) else {
                let _ = writeln!(out, "  {} <invalid definition>", name);
                continue;
            };
            let mut flags = Vec::new();
            if merged.is_abstract {
                flags.push("abstract");
            }
            if merged.primary {
                flags.push("primary");
            }
            if merged.lazy_init {
                flags.push("lazy");
            }
            let state = if self.singletons.contains(name) { "created" } else { "-" };
            let _ = writeln!(
                out,
                "  {} [{}] {} type={} {}",
                name,
                merged.scope,
                state,
                merged.declared_type().map_or("?", |key| key.name()),
                flags.join(",")
            );
            let dependencies = self.singletons.dependencies_of(name);
            if !dependencies.is_empty() {
                let _ = writeln!(out, "    depends on: {}", dependencies.join(", "));
            }
        }
        out
    }
}

impl BeanProvider for BeanFactory {
    fn get_bean(&self, name: &str) -> BeanResult<Bean> {
        BeanFactory::get_bean(self, name)
    }

    fn get_bean_of_type(&self, key: TypeKey) -> BeanResult<Bean> {
        BeanFactory::get_bean_of_type(self, key)
    }

    fn get_beans_of_type(&self, key: TypeKey) -> BeanResult<Vec<Bean>> {
        BeanFactory::get_beans_of_type(self, key)
    }

    fn contains_bean(&self, name: &str) -> bool {
        BeanFactory::contains_bean(self, name)
    }
}
