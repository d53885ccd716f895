//! Core traits implemented by beans and bean containers.

mod lifecycle;
mod provider;

pub use lifecycle::{DisposableBean, InitializingBean};
pub use provider::{BeanProvider, Beans};
