//! Post-processor extension points.
//!
//! Factory-level processors ([`BeanFactoryPostProcessor`]) rewrite the
//! definition registry once during refresh, before any regular bean exists.
//! Instance-level processors ([`BeanPostProcessor`]) intercept every bean
//! creation at fixed hook points and may replace the instance, e.g. with a
//! proxy.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::definition::{DefinitionRegistry, MergedDefinition};
use crate::error::{BeanError, BeanResult, BoxError};
use crate::key::AnyArc;

/// Rewrites bean definitions before instantiation starts.
///
/// # Examples
///
/// ```rust
/// use ferrous_beans::{BeanFactoryPostProcessor, BoxError, DefinitionRegistry};
///
/// struct LazyEverything;
///
/// impl BeanFactoryPostProcessor for LazyEverything {
///     fn post_process(&self, registry: &mut DefinitionRegistry) -> Result<(), BoxError> {
///         let names: Vec<String> = registry.names().map(String::from).collect();
///         for name in names {
///             registry.get_mut(&name)?.set_lazy_init(true);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait BeanFactoryPostProcessor: Send + Sync {
    fn post_process(&self, registry: &mut DefinitionRegistry) -> Result<(), BoxError>;

    /// Lower values run first; ties keep registration order.
    fn order(&self) -> i32 {
        0
    }
}

/// Per-instance hooks around bean creation and destruction
///
/// Every hook has a pass-through default, so implementors override only the
/// stages they care about. Each hook receives the output of the previous
/// processor in the chain.
///
/// # Hook order
///
/// 1. [`before_instantiation`](Self::before_instantiation): a `Some` result
///    replaces the whole creation; only `after_initialization` still runs
/// 2. [`after_instantiation`](Self::after_instantiation): `false` skips property population
/// 3. [`early_reference`](Self::early_reference): wraps a raw singleton handed out early to break a cycle
/// 4. [`before_initialization`](Self::before_initialization), then the init callback
/// 5. [`after_initialization`](Self::after_initialization): the result becomes the canonical instance
/// 6. [`before_destruction`](Self::before_destruction) on close
pub trait BeanPostProcessor: Send + Sync {
    fn before_instantiation(&self, _name: &str, _definition: &MergedDefinition) -> Result<Option<AnyArc>, BoxError> {
        Ok(None)
    }

    fn after_instantiation(&self, _name: &str, _instance: &AnyArc) -> Result<bool, BoxError> {
        Ok(true)
    }

    fn early_reference(&self, _name: &str, _definition: &MergedDefinition, instance: AnyArc) -> Result<AnyArc, BoxError> {
        Ok(instance)
    }

    fn before_initialization(&self, _name: &str, _definition: &MergedDefinition, instance: AnyArc) -> Result<AnyArc, BoxError> {
        Ok(instance)
    }

    fn after_initialization(&self, _name: &str, _definition: &MergedDefinition, instance: AnyArc) -> Result<AnyArc, BoxError> {
        Ok(instance)
    }

    fn before_destruction(&self, _name: &str, _instance: &AnyArc) -> Result<(), BoxError> {
        Ok(())
    }

    /// Lower values run first; ties keep registration order.
    fn order(&self) -> i32 {
        0
    }
}

/// Ordered chain of instance-level post-processors.
#[derive(Default)]
pub(crate) struct PostProcessorChain {
    processors: RwLock<Vec<Arc<dyn BeanPostProcessor>>>,
}

impl PostProcessorChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a processor, keeping the chain stable-sorted by `order()`.
    pub(crate) fn add(&self, processor: Arc<dyn BeanPostProcessor>) {
        let mut processors = self.processors.write();
        if processors.iter().any(|existing| Arc::ptr_eq(existing, &processor)) {
            return;
        }
        processors.push(processor);
        processors.sort_by_key(|processor| processor.order());
    }

    pub(crate) fn len(&self) -> usize {
        self.processors.read().len()
    }

    // Hooks run on a snapshot so processors may create beans themselves.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn BeanPostProcessor>> {
        self.processors.read().clone()
    }

    pub(crate) fn before_instantiation(&self, name: &str, definition: &MergedDefinition) -> BeanResult<Option<AnyArc>> {
        for processor in self.snapshot() {
            if let Some(instance) = processor
                .before_instantiation(name, definition)
                .map_err(|err| BeanError::from_callback(name, err))?
            {
                return Ok(Some(instance));
            }
        }
        Ok(None)
    }

    pub(crate) fn after_instantiation(&self, name: &str, instance: &AnyArc) -> BeanResult<bool> {
        for processor in self.snapshot() {
            let proceed = processor
                .after_instantiation(name, instance)
                .map_err(|err| BeanError::from_callback(name, err))?;
            if !proceed {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub(crate) fn early_reference(&self, name: &str, definition: &MergedDefinition, instance: AnyArc) -> BeanResult<AnyArc> {
        self.fold(name, instance, |processor, current| processor.early_reference(name, definition, current))
    }

    pub(crate) fn before_initialization(&self, name: &str, definition: &MergedDefinition, instance: AnyArc) -> BeanResult<AnyArc> {
        self.fold(name, instance, |processor, current| processor.before_initialization(name, definition, current))
    }

    pub(crate) fn after_initialization(&self, name: &str, definition: &MergedDefinition, instance: AnyArc) -> BeanResult<AnyArc> {
        self.fold(name, instance, |processor, current| processor.after_initialization(name, definition, current))
    }

    fn fold<F>(&self, name: &str, instance: AnyArc, mut hook: F) -> BeanResult<AnyArc>
    where
        F: FnMut(&dyn BeanPostProcessor, AnyArc) -> Result<AnyArc, BoxError>,
    {
        let mut current = instance;
        for processor in self.snapshot() {
            current = hook(processor.as_ref(), current).map_err(|err| BeanError::from_callback(name, err))?;
        }
        Ok(current)
    }
}

/// Sorts factory post-processors by `order()`, keeping registration order for ties.
pub(crate) fn sort_factory_processors(processors: &mut [Arc<dyn BeanFactoryPostProcessor>]) {
    processors.sort_by_key(|processor| processor.order());
}
