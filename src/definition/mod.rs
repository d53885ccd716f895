//! Bean definitions: declarative descriptions of how to build a bean.
//!
//! A [`BeanDefinition`] carries everything a reflective container would
//! discover on its own: the types the bean can be injected as, how it is
//! instantiated, which values go into its constructor and setters, and its
//! lifecycle callbacks. Definitions may inherit from a parent definition;
//! [`MergedDefinition`] is the flattened result used during creation.

mod registry;

pub use registry::DefinitionRegistry;

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::BoxError;
use crate::key::{AnyArc, TypeKey, TypeView};
use crate::scope::ScopeKind;
use crate::value::{Args, Bean, Injected, Param, ValueSpec};

type BuildFn = Arc<dyn Fn(&Args) -> Result<AnyArc, BoxError> + Send + Sync>;
type FactoryFn = Arc<dyn Fn(Option<&Bean>, &Args) -> Result<AnyArc, BoxError> + Send + Sync>;
type SetterFn = Arc<dyn Fn(&AnyArc, &Injected) -> Result<(), BoxError> + Send + Sync>;
type CallbackFn = Arc<dyn Fn(&AnyArc) -> Result<(), BoxError> + Send + Sync>;

/// Informational role of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// Part of the application itself
    #[default]
    Application,
    /// Supporting piece of a larger configuration
    Support,
    /// Container-internal plumbing
    Infrastructure,
}

/// A candidate constructor: parameter specs plus the closure building the instance.
#[derive(Clone)]
pub struct Constructor {
    params: Vec<Param>,
    build: BuildFn,
}

impl Constructor {
    /// Constructor producing a `T`.
    ///
    /// ```rust
    /// use ferrous_beans::{Constructor, Param};
    /// use std::sync::Arc;
    ///
    /// struct Pool { size: u32 }
    /// struct Repository { pool: Arc<Pool> }
    ///
    /// let ctor = Constructor::new(vec![Param::autowire::<Pool>("pool")], |args| {
    ///     Ok(Repository { pool: args.bean::<Pool>(0)? })
    /// });
    /// assert_eq!(ctor.arity(), 1);
    /// ```
    pub fn new<T, F>(params: Vec<Param>, build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            params,
            build: Arc::new(move |args: &Args| build(args).map(|value| Arc::new(value) as AnyArc)),
        }
    }

    /// Constructor producing an already type-erased instance.
    pub fn erased<F>(params: Vec<Param>, build: F) -> Self
    where
        F: Fn(&Args) -> Result<AnyArc, BoxError> + Send + Sync + 'static,
    {
        Self { params, build: Arc::new(build) }
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub(crate) fn invoke(&self, args: &Args) -> Result<AnyArc, BoxError> {
        (self.build)(args)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor").field("params", &self.params).finish()
    }
}

/// Instantiation through a method, either on another bean or free-standing.
#[derive(Clone)]
pub struct FactoryMethod {
    factory_bean: Option<String>,
    method: String,
    params: Vec<Param>,
    invoke: FactoryFn,
}

impl FactoryMethod {
    /// A method called on the bean named `factory_bean`, viewed as `F`.
    pub fn on_bean<F, T, M>(factory_bean: impl Into<String>, method: impl Into<String>, params: Vec<Param>, call: M) -> Self
    where
        F: ?Sized + Send + Sync + 'static,
        T: Any + Send + Sync,
        M: Fn(Arc<F>, &Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let factory_bean = factory_bean.into();
        let owner = factory_bean.clone();
        Self {
            factory_bean: Some(factory_bean),
            method: method.into(),
            params,
            invoke: Arc::new(move |factory: Option<&Bean>, args: &Args| {
                let factory = factory
                    .ok_or_else(|| format!("factory bean '{}' was not supplied", owner))?
                    .downcast::<F>()?;
                call(factory, args).map(|value| Arc::new(value) as AnyArc)
            }),
        }
    }

    /// A free-standing (static) factory method.
    pub fn free<T, M>(method: impl Into<String>, params: Vec<Param>, call: M) -> Self
    where
        T: Any + Send + Sync,
        M: Fn(&Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            factory_bean: None,
            method: method.into(),
            params,
            invoke: Arc::new(move |_: Option<&Bean>, args: &Args| call(args).map(|value| Arc::new(value) as AnyArc)),
        }
    }

    pub fn factory_bean(&self) -> Option<&str> {
        self.factory_bean.as_deref()
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub(crate) fn call(&self, factory: Option<&Bean>, args: &Args) -> Result<AnyArc, BoxError> {
        (self.invoke)(factory, args)
    }
}

impl fmt::Debug for FactoryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryMethod")
            .field("factory_bean", &self.factory_bean)
            .field("method", &self.method)
            .field("params", &self.params)
            .finish()
    }
}

/// How the raw instance of a bean is obtained. The variants are mutually exclusive.
#[derive(Clone)]
pub enum Instantiation {
    /// One or more candidate constructors
    Constructors(Vec<Constructor>),
    /// A factory method, optionally on a factory bean
    FactoryMethod(FactoryMethod),
    /// A pre-built instance registered as is
    Instance(AnyArc),
}

impl fmt::Debug for Instantiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instantiation::Constructors(ctors) => f.debug_tuple("Constructors").field(ctors).finish(),
            Instantiation::FactoryMethod(method) => f.debug_tuple("FactoryMethod").field(method).finish(),
            Instantiation::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

/// A property value applied through its setter after instantiation.
#[derive(Clone)]
pub struct PropertyValue {
    name: String,
    value: ValueSpec,
    setter: SetterFn,
}

impl PropertyValue {
    /// Property of a bean whose raw instance is a `T`.
    ///
    /// Instances are shared behind `Arc`, so setters write through interior
    /// mutability (`OnceLock`, `Mutex`, atomics).
    pub fn new<T, S>(name: impl Into<String>, value: ValueSpec, setter: S) -> Self
    where
        T: Any + Send + Sync,
        S: Fn(&T, &Injected) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        let property = name.clone();
        Self {
            name,
            value,
            setter: Arc::new(move |target: &AnyArc, value: &Injected| {
                let target = target.downcast_ref::<T>().ok_or_else(|| {
                    format!("property '{}' expects a {}", property, std::any::type_name::<T>())
                })?;
                setter(target, value)
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &ValueSpec {
        &self.value
    }

    pub fn set_value(&mut self, value: ValueSpec) {
        self.value = value;
    }

    pub(crate) fn apply(&self, target: &AnyArc, value: &Injected) -> Result<(), BoxError> {
        (self.setter)(target, value)
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyValue").field("name", &self.name).field("value", &self.value).finish()
    }
}

/// An init or destroy method.
#[derive(Clone)]
pub struct LifecycleCallback {
    name: String,
    run: CallbackFn,
}

impl LifecycleCallback {
    pub fn new<T, F>(name: impl Into<String>, callback: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        let method = name.clone();
        Self {
            name,
            run: Arc::new(move |target: &AnyArc| {
                let target = target.downcast_ref::<T>().ok_or_else(|| {
                    format!("method '{}' expects a {}", method, std::any::type_name::<T>())
                })?;
                callback(target)
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn invoke(&self, target: &AnyArc) -> Result<(), BoxError> {
        (self.run)(target)
    }
}

impl fmt::Debug for LifecycleCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LifecycleCallback").field(&self.name).finish()
    }
}

/// Declarative description of a bean, as registered
///
/// Scalar settings left unset are inherited from the parent definition (if
/// any) and otherwise default to singleton scope, eager initialization and no
/// callbacks.
///
/// # Examples
///
/// ```rust
/// use ferrous_beans::{BeanDefinition, Param, ScopeKind};
/// use std::sync::Arc;
///
/// trait Clock: Send + Sync { fn now(&self) -> u64; }
/// struct FixedClock(u64);
/// impl Clock for FixedClock { fn now(&self) -> u64 { self.0 } }
///
/// struct Scheduler { clock: Arc<dyn Clock> }
///
/// let clock = BeanDefinition::of::<FixedClock>()
///     .exposes::<dyn Clock, FixedClock>(|c| c as Arc<dyn Clock>)
///     .constructor(vec![], |_| Ok(FixedClock(42)));
///
/// let scheduler = BeanDefinition::of::<Scheduler>()
///     .scope(ScopeKind::Prototype)
///     .constructor(vec![Param::autowire::<dyn Clock>("clock")], |args| {
///         Ok(Scheduler { clock: args.bean::<dyn Clock>(0)? })
///     });
///
/// assert_eq!(clock.views().len(), 2);
/// assert_eq!(scheduler.scope_kind(), Some(&ScopeKind::Prototype));
/// ```
#[derive(Clone, Debug)]
pub struct BeanDefinition {
    parent: Option<String>,
    views: Vec<TypeView>,
    scope: Option<ScopeKind>,
    lazy_init: Option<bool>,
    is_abstract: bool,
    primary: bool,
    autowire_candidate: bool,
    role: Role,
    depends_on: Vec<String>,
    instantiation: Option<Instantiation>,
    constructor_args: BTreeMap<usize, ValueSpec>,
    properties: Vec<PropertyValue>,
    init: Option<LifecycleCallback>,
    destroy: Option<LifecycleCallback>,
    description: Option<String>,
}

impl Default for BeanDefinition {
    fn default() -> Self {
        Self::new()
    }
}

impl BeanDefinition {
    /// Empty definition: no declared type and no instantiation strategy.
    pub fn new() -> Self {
        Self {
            parent: None,
            views: Vec::new(),
            scope: None,
            lazy_init: None,
            is_abstract: false,
            primary: false,
            autowire_candidate: true,
            role: Role::Application,
            depends_on: Vec::new(),
            instantiation: None,
            constructor_args: BTreeMap::new(),
            properties: Vec::new(),
            init: None,
            destroy: None,
            description: None,
        }
    }

    /// Definition whose declared type is the concrete `T`.
    pub fn of<T: Any + Send + Sync>() -> Self {
        Self::new().view(TypeView::concrete::<T>())
    }

    /// Definition for a pre-built instance.
    pub fn instance<T: Any + Send + Sync>(value: T) -> Self {
        Self::of::<T>().instantiation(Instantiation::Instance(Arc::new(value)))
    }

    /// Child definition inheriting from `parent`.
    pub fn child_of(parent: impl Into<String>) -> Self {
        let mut definition = Self::new();
        definition.parent = Some(parent.into());
        definition
    }

    pub fn view(mut self, view: TypeView) -> Self {
        if !self.views.iter().any(|existing| existing.target() == view.target()) {
            self.views.push(view);
        }
        self
    }

    /// Makes the bean injectable as `I` (usually a `dyn Trait` implemented by `C`).
    pub fn exposes<I, C>(self, upcast: fn(Arc<C>) -> Arc<I>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        C: Any + Send + Sync,
    {
        self.view(TypeView::of::<I, C>(upcast))
    }

    /// Adds a candidate constructor.
    pub fn constructor<T, F>(mut self, params: Vec<Param>, build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.add_constructor(Constructor::new(params, build));
        self
    }

    pub fn factory_method(self, method: FactoryMethod) -> Self {
        self.instantiation(Instantiation::FactoryMethod(method))
    }

    pub fn instantiation(mut self, instantiation: Instantiation) -> Self {
        self.instantiation = Some(instantiation);
        self
    }

    pub fn scope(mut self, scope: ScopeKind) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy_init = Some(lazy);
        self
    }

    pub fn abstract_(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn autowire_candidate(mut self, candidate: bool) -> Self {
        self.autowire_candidate = candidate;
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.depends_on.contains(&name) {
            self.depends_on.push(name);
        }
        self
    }

    /// Overrides the value of the constructor parameter at `index`.
    pub fn constructor_arg(mut self, index: usize, value: ValueSpec) -> Self {
        self.constructor_args.insert(index, value);
        self
    }

    pub fn property(mut self, property: PropertyValue) -> Self {
        self.set_property(property);
        self
    }

    pub fn init_method(mut self, callback: LifecycleCallback) -> Self {
        self.init = Some(callback);
        self
    }

    pub fn destroy_method(mut self, callback: LifecycleCallback) -> Self {
        self.destroy = Some(callback);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    // Mutators for factory post-processors

    pub fn add_constructor(&mut self, constructor: Constructor) {
        match &mut self.instantiation {
            Some(Instantiation::Constructors(ctors)) => ctors.push(constructor),
            _ => self.instantiation = Some(Instantiation::Constructors(vec![constructor])),
        }
    }

    pub fn set_scope(&mut self, scope: ScopeKind) {
        self.scope = Some(scope);
    }

    pub fn set_lazy_init(&mut self, lazy: bool) {
        self.lazy_init = Some(lazy);
    }

    pub fn set_primary(&mut self, primary: bool) {
        self.primary = primary;
    }

    pub fn set_parent(&mut self, parent: Option<String>) {
        self.parent = parent;
    }

    pub fn set_constructor_arg(&mut self, index: usize, value: ValueSpec) {
        self.constructor_args.insert(index, value);
    }

    /// Adds or replaces (by name) a property value.
    pub fn set_property(&mut self, property: PropertyValue) {
        match self.properties.iter_mut().find(|existing| existing.name == property.name) {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
    }

    pub fn remove_property(&mut self, name: &str) -> Option<PropertyValue> {
        let index = self.properties.iter().position(|property| property.name == name)?;
        Some(self.properties.remove(index))
    }

    pub fn add_depends_on(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.depends_on.contains(&name) {
            self.depends_on.push(name);
        }
    }

    pub fn properties_mut(&mut self) -> &mut [PropertyValue] {
        &mut self.properties
    }

    pub fn constructor_args_mut(&mut self) -> &mut BTreeMap<usize, ValueSpec> {
        &mut self.constructor_args
    }

    /// Parameter specs of every constructor or of the factory method.
    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        match &mut self.instantiation {
            Some(Instantiation::Constructors(ctors)) => {
                ctors.iter_mut().flat_map(|ctor| ctor.params.iter_mut()).collect()
            }
            Some(Instantiation::FactoryMethod(method)) => method.params.iter_mut().collect(),
            _ => Vec::new(),
        }
    }

    // Accessors

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn views(&self) -> &[TypeView] {
        &self.views
    }

    pub fn scope_kind(&self) -> Option<&ScopeKind> {
        self.scope.as_ref()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn depends_on_names(&self) -> &[String] {
        &self.depends_on
    }

    pub fn properties(&self) -> &[PropertyValue] {
        &self.properties
    }

    pub fn constructor_args(&self) -> &BTreeMap<usize, ValueSpec> {
        &self.constructor_args
    }

    pub fn get_instantiation(&self) -> Option<&Instantiation> {
        self.instantiation.as_ref()
    }
}

/// A definition with its parent chain resolved, as used during creation.
#[derive(Clone, Debug)]
pub struct MergedDefinition {
    pub name: String,
    pub views: Arc<[TypeView]>,
    pub scope: ScopeKind,
    pub lazy_init: bool,
    pub is_abstract: bool,
    pub primary: bool,
    pub autowire_candidate: bool,
    pub role: Role,
    pub depends_on: Vec<String>,
    pub instantiation: Option<Instantiation>,
    pub constructor_args: BTreeMap<usize, ValueSpec>,
    pub properties: Vec<PropertyValue>,
    pub init: Option<LifecycleCallback>,
    pub destroy: Option<LifecycleCallback>,
    pub description: Option<String>,
}

impl MergedDefinition {
    /// Flattens a chain of definitions ordered root first, ending with the bean's own.
    pub(crate) fn merge(name: &str, chain: &[&BeanDefinition]) -> Self {
        let mut scope = None;
        let mut lazy_init = None;
        let mut views: Vec<TypeView> = Vec::new();
        let mut depends_on: Vec<String> = Vec::new();
        let mut instantiation = None;
        let mut constructor_args = BTreeMap::new();
        let mut properties: Vec<PropertyValue> = Vec::new();
        let mut init = None;
        let mut destroy = None;
        let mut description = None;

        for definition in chain {
            if !definition.views.is_empty() {
                views = definition.views.clone();
            }
            if definition.instantiation.is_some() {
                instantiation = definition.instantiation.clone();
            }
            scope = definition.scope.clone().or(scope);
            lazy_init = definition.lazy_init.or(lazy_init);
            init = definition.init.clone().or(init);
            destroy = definition.destroy.clone().or(destroy);
            description = definition.description.clone().or(description);
            for dependency in &definition.depends_on {
                if !depends_on.contains(dependency) {
                    depends_on.push(dependency.clone());
                }
            }
            for (index, value) in &definition.constructor_args {
                constructor_args.insert(*index, value.clone());
            }
            for property in &definition.properties {
                match properties.iter_mut().find(|existing| existing.name == property.name) {
                    Some(existing) => *existing = property.clone(),
                    None => properties.push(property.clone()),
                }
            }
        }

        // Flags not inherited: the bean's own definition decides
        let own = chain.last().copied();
        Self {
            name: name.to_string(),
            views: views.into(),
            scope: scope.unwrap_or_default(),
            lazy_init: lazy_init.unwrap_or(false),
            is_abstract: own.map_or(false, |d| d.is_abstract),
            primary: own.map_or(false, |d| d.primary),
            autowire_candidate: own.map_or(true, |d| d.autowire_candidate),
            role: own.map_or(Role::Application, |d| d.role),
            depends_on,
            instantiation,
            constructor_args,
            properties,
            init,
            destroy,
            description,
        }
    }

    /// The declared type (first view), if any.
    pub fn declared_type(&self) -> Option<TypeKey> {
        self.views.first().map(TypeView::target)
    }

    pub fn has_type(&self, key: TypeKey) -> bool {
        self.views.iter().any(|view| view.target() == key)
    }
}
