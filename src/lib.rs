//! # ferrous-beans
//!
//! A bean lifecycle engine for Rust: declarative bean definitions become a
//! graph of constructed, dependency-wired, optionally proxied and
//! lifecycle-managed objects.
//!
//! ## Features
//!
//! - **Definitions**: constructors, factory methods or ready instances; parent/child
//!   inheritance; aliases; `depends_on`; lazy, abstract and primary flags
//! - **Scopes**: singleton, prototype and pluggable custom scopes
//! - **Autowiring**: by explicit name, unique type, `primary`, then qualifier
//! - **Post-processors**: definition rewriting before instantiation and
//!   per-instance hooks that may substitute proxies
//! - **Cycle detection**: every circular dependency is reported with its full chain
//! - **Ordered teardown**: dependents are destroyed before what they depend on
//!
//! Rust has no runtime reflection, so a definition carries what a reflective
//! container would discover: the type views the bean can be injected as, the
//! candidate constructors with their parameter specs, property setters and
//! lifecycle callbacks.
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_beans::{ApplicationContext, BeanDefinition, Beans, Param};
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let mut context = ApplicationContext::new();
//! context.register_singleton("database", Database { url: "postgres://localhost".into() }).unwrap();
//! context.register("users", BeanDefinition::of::<UserService>()
//!     .constructor(vec![Param::autowire::<Database>("db")], |args| {
//!         Ok(UserService { db: args.bean::<Database>(0)? })
//!     })).unwrap();
//! context.refresh().unwrap();
//!
//! let users = context.get::<UserService>("users").unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! context.close();
//! ```
//!
//! ## Trait views
//!
//! A bean is injectable as every type its definition exposes:
//!
//! ```rust
//! use ferrous_beans::{ApplicationContext, BeanDefinition, Beans};
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, message: &str) -> String;
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, message: &str) -> String { format!("[LOG] {}", message) }
//! }
//!
//! let mut context = ApplicationContext::new();
//! context.register("logger", BeanDefinition::instance(ConsoleLogger)
//!     .exposes::<dyn Logger, ConsoleLogger>(|l| l as Arc<dyn Logger>)).unwrap();
//! context.refresh().unwrap();
//!
//! let logger = context.get_by_type::<dyn Logger>().unwrap();
//! assert_eq!(logger.log("hello"), "[LOG] hello");
//! ```
//!
//! ## Circular references
//!
//! Constructor cycles always fail with [`BeanError::CircularDependency`].
//! Setter-injection cycles between singletons can be resolved by exposing a
//! partially built bean early, but only when
//! [`ContextConfig::allow_circular_references`] is set; it is off by default.

// Module declarations
pub mod config;
pub mod context;
pub mod definition;
pub mod error;
pub mod event;
pub mod factory;
pub mod key;
pub mod observer;
pub mod processor;
pub mod proxy;
pub mod scope;
pub mod traits;
pub mod value;

// Internal modules
mod internal;
mod resolver;
mod singletons;

// Re-export core types
pub use config::{ConfigProvider, ConfigSource, ConfigValue, ContextConfig, EnvironmentConfigSource, MapConfigSource, PlaceholderConfigurer};
#[cfg(feature = "config")]
pub use config::JsonConfigSource;
pub use context::{ApplicationContext, ContextState};
pub use definition::{
    BeanDefinition, Constructor, DefinitionRegistry, FactoryMethod, Instantiation, LifecycleCallback, MergedDefinition,
    PropertyValue, Role,
};
pub use error::{BeanError, BeanResult, BoxError};
pub use event::{ApplicationEvent, ApplicationListener, EventMulticaster, SimpleEventMulticaster};
pub use factory::BeanFactory;
pub use key::{AnyArc, TypeKey, TypeView};
pub use observer::{CreationObserver, TracingObserver};
pub use processor::{BeanFactoryPostProcessor, BeanPostProcessor};
pub use proxy::{AutoProxyPostProcessor, ProxyFactory};
pub use scope::{DestructionCallback, Scope, ScopeKind, SimpleScope};
pub use traits::{BeanProvider, Beans, DisposableBean, InitializingBean};
pub use value::{AnyArcDebug, Args, Bean, DependencySpec, Injected, Param, ValueSpec};
