//! Bean lookup traits.

use std::sync::Arc;

use crate::error::BeanResult;
use crate::key::TypeKey;
use crate::value::Bean;

/// Object-safe bean lookup
///
/// Implemented by [`BeanFactory`](crate::BeanFactory) and
/// [`ApplicationContext`](crate::ApplicationContext). Most callers use the
/// typed helpers on [`Beans`] instead.
pub trait BeanProvider: Send + Sync {
    /// Bean by name or alias.
    fn get_bean(&self, name: &str) -> BeanResult<Bean>;

    /// The single bean exposing `key`; several candidates are disambiguated
    /// through `primary`.
    fn get_bean_of_type(&self, key: TypeKey) -> BeanResult<Bean>;

    /// Every bean exposing `key`, in registration order.
    fn get_beans_of_type(&self, key: TypeKey) -> BeanResult<Vec<Bean>>;

    fn contains_bean(&self, name: &str) -> bool;
}

/// Typed lookups on top of [`BeanProvider`].
///
/// ```
/// use ferrous_beans::{ApplicationContext, Beans};
///
/// let mut context = ApplicationContext::new();
/// context.register_singleton("greeting", String::from("hello")).unwrap();
/// context.refresh().unwrap();
///
/// assert_eq!(context.get::<String>("greeting").unwrap().as_str(), "hello");
/// assert_eq!(context.get_by_type::<String>().unwrap().as_str(), "hello");
/// ```
pub trait Beans: BeanProvider {
    /// Bean `name`, viewed as `T`.
    fn get<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> BeanResult<Arc<T>> {
        self.get_bean(name)?.downcast::<T>()
    }

    /// The single bean exposing `T`.
    fn get_by_type<T: ?Sized + Send + Sync + 'static>(&self) -> BeanResult<Arc<T>> {
        self.get_bean_of_type(TypeKey::of::<T>())?.downcast::<T>()
    }

    /// Every bean exposing `T`.
    fn get_all<T: ?Sized + Send + Sync + 'static>(&self) -> BeanResult<Vec<Arc<T>>> {
        self.get_beans_of_type(TypeKey::of::<T>())?
            .iter()
            .map(Bean::downcast::<T>)
            .collect()
    }
}

impl<P: BeanProvider + ?Sized> Beans for P {}
