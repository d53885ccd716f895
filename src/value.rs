//! Value specifications for constructor arguments and properties, and the
//! resolved values handed to constructors and setters.

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{BeanError, BeanResult};
use crate::key::{view_as, AnyArc, TypeKey, TypeView};

/// How a constructor argument or property value is obtained.
#[derive(Clone)]
pub enum ValueSpec {
    /// A ready-made value injected as is
    Literal(AnyArc),
    /// Text, subject to `${placeholder}` resolution during refresh
    Text(String),
    /// Explicit reference to a bean by name
    Ref(String),
    /// Type-based lookup through the dependency resolver
    Autowire(DependencySpec),
    /// Every candidate of the type, in registration order
    All(TypeKey),
}

impl ValueSpec {
    pub fn literal<T: Any + Send + Sync>(value: T) -> Self {
        ValueSpec::Literal(Arc::new(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        ValueSpec::Text(value.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        ValueSpec::Ref(name.into())
    }

    pub fn autowire<T: ?Sized + 'static>() -> Self {
        ValueSpec::Autowire(DependencySpec::of::<T>())
    }

    pub fn all<T: ?Sized + 'static>() -> Self {
        ValueSpec::All(TypeKey::of::<T>())
    }
}

impl fmt::Debug for ValueSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSpec::Literal(_) => f.write_str("Literal(..)"),
            ValueSpec::Text(text) => f.debug_tuple("Text").field(text).finish(),
            ValueSpec::Ref(name) => f.debug_tuple("Ref").field(name).finish(),
            ValueSpec::Autowire(spec) => f.debug_tuple("Autowire").field(spec).finish(),
            ValueSpec::All(key) => f.debug_tuple("All").field(key).finish(),
        }
    }
}

/// A type-based dependency: required type plus disambiguation hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    pub required_type: TypeKey,
    /// Explicit qualifier, matched against candidate names and aliases
    pub qualifier: Option<String>,
    /// Fallback hint (usually the parameter name), used like a qualifier
    pub name_hint: Option<String>,
    /// Absent instead of an error when nothing matches
    pub optional: bool,
}

impl DependencySpec {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self { required_type: TypeKey::of::<T>(), qualifier: None, name_hint: None, optional: false }
    }

    pub fn qualified(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub(crate) fn hint(&self) -> Option<&str> {
        self.qualifier.as_deref().or(self.name_hint.as_deref())
    }
}

/// A constructor or factory-method parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: Option<String>,
    pub spec: ValueSpec,
}

impl Param {
    pub fn new(spec: ValueSpec) -> Self {
        Self { name: None, spec }
    }

    /// Parameter resolved by type; the parameter name doubles as a qualifier hint.
    pub fn autowire<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut dependency = DependencySpec::of::<T>();
        dependency.name_hint = Some(name.clone());
        Self { name: Some(name), spec: ValueSpec::Autowire(dependency) }
    }

    /// Optional parameter resolved by type.
    pub fn optional<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        let mut param = Self::autowire::<T>(name);
        if let ValueSpec::Autowire(dependency) = &mut param.spec {
            dependency.optional = true;
        }
        param
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(ValueSpec::reference(name))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(ValueSpec::text(value))
    }

    pub fn literal<T: Any + Send + Sync>(value: T) -> Self {
        Self::new(ValueSpec::literal(value))
    }

    pub fn all<T: ?Sized + 'static>() -> Self {
        Self::new(ValueSpec::all::<T>())
    }
}

/// A resolved bean: canonical instance plus the views it can be used as.
#[derive(Clone)]
pub struct Bean {
    name: String,
    instance: AnyArc,
    views: Arc<[TypeView]>,
}

impl Bean {
    pub(crate) fn new(name: String, instance: AnyArc, views: Arc<[TypeView]>) -> Self {
        Self { name, instance, views }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type-erased canonical instance.
    pub fn instance(&self) -> &AnyArc {
        &self.instance
    }

    /// Views the bean as `T` (a concrete type or a `dyn Trait` it exposes).
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> BeanResult<Arc<T>> {
        view_as::<T>(&self.instance, &self.views).ok_or_else(|| BeanError::TypeMismatch {
            name: self.name.clone(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// True when both handles point at the same instance.
    pub fn same_instance(&self, other: &Bean) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }
}

impl fmt::Debug for Bean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bean").field("name", &self.name).field("views", &self.views).finish()
    }
}

/// A value ready for injection into a constructor or setter.
#[derive(Debug, Clone)]
pub enum Injected {
    Bean(Bean),
    Value(AnyArcDebug),
    Text(String),
    Beans(Vec<Bean>),
    /// Optional dependency with no candidate
    Absent,
}

/// Literal wrapper so [`Injected`] can derive `Debug`.
#[derive(Clone)]
pub struct AnyArcDebug(pub AnyArc);

impl fmt::Debug for AnyArcDebug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Literal(..)")
    }
}

impl Injected {
    /// The injected bean viewed as `T`.
    pub fn bean<T: ?Sized + Send + Sync + 'static>(&self) -> BeanResult<Arc<T>> {
        match self {
            Injected::Bean(bean) => bean.downcast::<T>(),
            other => Err(other.mismatch::<T>()),
        }
    }

    /// Like [`Injected::bean`] but absent optional dependencies yield `None`.
    pub fn optional_bean<T: ?Sized + Send + Sync + 'static>(&self) -> BeanResult<Option<Arc<T>>> {
        match self {
            Injected::Absent => Ok(None),
            other => other.bean::<T>().map(Some),
        }
    }

    /// Every bean of a collection injection, viewed as `T`.
    pub fn beans<T: ?Sized + Send + Sync + 'static>(&self) -> BeanResult<Vec<Arc<T>>> {
        match self {
            Injected::Beans(beans) => beans.iter().map(Bean::downcast::<T>).collect(),
            Injected::Absent => Ok(Vec::new()),
            other => Err(other.mismatch::<Vec<Arc<T>>>()),
        }
    }

    /// A literal value, or the text itself when `T` is `String`.
    pub fn value<T: Any + Send + Sync + Clone>(&self) -> BeanResult<T> {
        match self {
            Injected::Value(AnyArcDebug(value)) => {
                value.downcast_ref::<T>().cloned().ok_or_else(|| self.mismatch::<T>())
            }
            Injected::Text(text) => {
                (text as &dyn Any).downcast_ref::<T>().cloned().ok_or_else(|| self.mismatch::<T>())
            }
            other => Err(other.mismatch::<T>()),
        }
    }

    pub fn text(&self) -> BeanResult<&str> {
        match self {
            Injected::Text(text) => Ok(text),
            other => Err(other.mismatch::<String>()),
        }
    }

    /// Parses textual values (after placeholder resolution) into `T`.
    pub fn parse<T: FromStr>(&self) -> BeanResult<T>
    where
        T::Err: fmt::Display,
    {
        let text = self.text()?;
        text.parse::<T>().map_err(|err| BeanError::Config {
            key: text.to_string(),
            message: format!("cannot parse as {}: {}", std::any::type_name::<T>(), err),
        })
    }

    fn mismatch<T: ?Sized>(&self) -> BeanError {
        let name = match self {
            Injected::Bean(bean) => bean.name().to_string(),
            Injected::Value(_) => "<literal>".to_string(),
            Injected::Text(text) => format!("\"{}\"", text),
            Injected::Beans(_) => "<collection>".to_string(),
            Injected::Absent => "<absent>".to_string(),
        };
        BeanError::TypeMismatch { name, expected: std::any::type_name::<T>() }
    }
}

/// Resolved constructor or factory-method arguments, by position.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<Injected>,
}

impl Args {
    pub(crate) fn new(values: Vec<Injected>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> BeanResult<&Injected> {
        self.values.get(index).ok_or_else(|| {
            BeanError::IllegalState(format!("no argument at index {} ({} resolved)", index, self.values.len()))
        })
    }

    pub fn bean<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> BeanResult<Arc<T>> {
        self.get(index)?.bean::<T>()
    }

    pub fn optional_bean<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> BeanResult<Option<Arc<T>>> {
        self.get(index)?.optional_bean::<T>()
    }

    pub fn beans<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> BeanResult<Vec<Arc<T>>> {
        self.get(index)?.beans::<T>()
    }

    pub fn value<T: Any + Send + Sync + Clone>(&self, index: usize) -> BeanResult<T> {
        self.get(index)?.value::<T>()
    }

    pub fn parse<T: FromStr>(&self, index: usize) -> BeanResult<T>
    where
        T::Err: fmt::Display,
    {
        self.get(index)?.parse::<T>()
    }
}
