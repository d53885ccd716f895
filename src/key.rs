//! Type keys and type views used for type-based matching and typed access.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Type-erased bean instance.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

type Caster = Arc<dyn Fn(&AnyArc) -> Option<AnyArc> + Send + Sync>;

/// Identity of a type a bean can be requested as.
///
/// Works for concrete types and for trait objects alike, since `TypeId` is
/// available for any `'static` type including `dyn Trait`.
///
/// # Examples
///
/// ```rust
/// use ferrous_beans::TypeKey;
///
/// trait Repository: Send + Sync {}
///
/// let concrete = TypeKey::of::<String>();
/// let abstract_ = TypeKey::of::<dyn Repository>();
/// assert_ne!(concrete, abstract_);
/// assert!(abstract_.name().contains("Repository"));
/// ```
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: std::any::type_name::<T>() }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Human-readable type name, for diagnostics only.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// One type a bean can be injected as, together with the conversion from the
/// raw instance to that type.
///
/// Every view produces an `Arc<Arc<T>>` erased to [`AnyArc`], so concrete and
/// trait-object lookups share a single extraction path. A bean whose canonical
/// instance was replaced by a post-processor with an `Arc<T>` (a proxy) is
/// matched directly without going through the caster.
#[derive(Clone)]
pub struct TypeView {
    target: TypeKey,
    cast: Caster,
}

impl TypeView {
    /// View of a concrete type: the bean is exactly a `T`.
    pub fn concrete<T: Any + Send + Sync>() -> Self {
        Self {
            target: TypeKey::of::<T>(),
            cast: Arc::new(|instance: &AnyArc| {
                instance
                    .clone()
                    .downcast::<T>()
                    .ok()
                    .map(|typed| Arc::new(typed) as AnyArc)
            }),
        }
    }

    /// View of an abstract type (usually `dyn Trait`) implemented by the concrete `C`.
    ///
    /// ```rust
    /// use ferrous_beans::TypeView;
    /// use std::sync::Arc;
    ///
    /// trait Greeter: Send + Sync { fn greet(&self) -> String; }
    /// struct English;
    /// impl Greeter for English { fn greet(&self) -> String { "hello".into() } }
    ///
    /// let view = TypeView::of::<dyn Greeter, English>(|c| c as Arc<dyn Greeter>);
    /// assert!(view.target().name().contains("Greeter"));
    /// ```
    pub fn of<T, C>(upcast: fn(Arc<C>) -> Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        C: Any + Send + Sync,
    {
        Self {
            target: TypeKey::of::<T>(),
            cast: Arc::new(move |instance: &AnyArc| {
                instance
                    .clone()
                    .downcast::<C>()
                    .ok()
                    .map(|typed| Arc::new(upcast(typed)) as AnyArc)
            }),
        }
    }

    pub fn target(&self) -> TypeKey {
        self.target
    }

    pub(crate) fn apply(&self, instance: &AnyArc) -> Option<AnyArc> {
        (self.cast)(instance)
    }
}

impl fmt::Debug for TypeView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeView").field(&self.target.name).finish()
    }
}

/// Converts an instance to `Arc<T>` using the bean's views.
///
/// Proxies stored as `Arc<T>` pass through; otherwise the view targeting `T`
/// performs the conversion.
pub(crate) fn view_as<T>(instance: &AnyArc, views: &[TypeView]) -> Option<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    if let Some(direct) = instance.clone().downcast::<Arc<T>>().ok() {
        return Some((*direct).clone());
    }
    let target = TypeKey::of::<T>();
    views
        .iter()
        .filter(|view| view.target == target)
        .find_map(|view| view.apply(instance))
        .and_then(|erased| erased.downcast::<Arc<T>>().ok())
        .map(|typed| (*typed).clone())
}
