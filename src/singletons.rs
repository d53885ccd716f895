//! Singleton registry: completed instances, early references, dependency
//! edges and disposal bookkeeping.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};

use crate::definition::MergedDefinition;
use crate::internal::DisposeBag;
use crate::key::AnyArc;

/// Early reference to a singleton whose raw instance exists but is not yet initialized.
#[derive(Clone)]
pub(crate) enum EarlyReference {
    /// Not requested yet; the early-reference hooks have not run
    Pending { raw: AnyArc, definition: Arc<MergedDefinition> },
    /// Handed out to another bean
    Exposed(AnyArc),
}

/// What destruction needs to know about a finished singleton.
pub(crate) struct Disposable {
    /// Instance the destroy callback runs on (the raw object when there is one)
    pub(crate) target: AnyArc,
    /// Canonical instance handed to the destruction hooks
    pub(crate) exposed: AnyArc,
    pub(crate) definition: Arc<MergedDefinition>,
}

/// Storage for singleton instances owned by one factory
///
/// Completed singletons are read through an `RwLock` fast path. Creation is
/// serialized by a single re-entrant lock: the creating thread may re-enter
/// it while resolving nested dependencies, other threads block until the
/// outermost creation finishes and then observe the cached instance.
pub(crate) struct SingletonRegistry {
    creation_lock: ReentrantMutex<()>,
    completed: RwLock<HashMap<String, AnyArc>>,
    early: Mutex<HashMap<String, EarlyReference>>,
    creation_order: Mutex<Vec<String>>,
    /// provider -> beans depending on it, in registration order
    dependents: Mutex<HashMap<String, Vec<String>>>,
    /// consumer -> beans it depends on
    dependencies: Mutex<HashMap<String, Vec<String>>>,
    disposables: Mutex<DisposeBag<Disposable>>,
}

impl SingletonRegistry {
    pub(crate) fn new() -> Self {
        Self {
            creation_lock: ReentrantMutex::new(()),
            completed: RwLock::new(HashMap::new()),
            early: Mutex::new(HashMap::new()),
            creation_order: Mutex::new(Vec::new()),
            dependents: Mutex::new(HashMap::new()),
            dependencies: Mutex::new(HashMap::new()),
            disposables: Mutex::new(DisposeBag::default()),
        }
    }

    /// Acquires the creation lock guarding check-cache-then-create.
    pub(crate) fn lock_creation(&self) -> ReentrantMutexGuard<'_, ()> {
        self.creation_lock.lock()
    }

    pub(crate) fn get(&self, name: &str) -> Option<AnyArc> {
        self.completed.read().get(name).cloned()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.completed.read().contains_key(name)
    }

    /// Stores a fully initialized singleton; its early reference is discarded.
    pub(crate) fn add_completed(&self, name: &str, instance: AnyArc) {
        self.early.lock().remove(name);
        let mut completed = self.completed.write();
        if completed.insert(name.to_string(), instance).is_none() {
            self.creation_order.lock().push(name.to_string());
        }
    }

    pub(crate) fn add_early(&self, name: &str, raw: AnyArc, definition: Arc<MergedDefinition>) {
        self.early.lock().insert(name.to_string(), EarlyReference::Pending { raw, definition });
    }

    pub(crate) fn early_reference(&self, name: &str) -> Option<EarlyReference> {
        self.early.lock().get(name).cloned()
    }

    pub(crate) fn expose_early(&self, name: &str, instance: AnyArc) {
        self.early.lock().insert(name.to_string(), EarlyReference::Exposed(instance));
    }

    /// The early object handed out for `name`, if any was.
    pub(crate) fn exposed_early(&self, name: &str) -> Option<AnyArc> {
        match self.early.lock().get(name) {
            Some(EarlyReference::Exposed(instance)) => Some(instance.clone()),
            _ => None,
        }
    }

    /// Forgets a singleton whose creation failed so a later request retries.
    ///
    /// Completed beans depending on it are destroyed and uncached as well:
    /// they may hold its early reference, which is now dead.
    pub(crate) fn discard(&self, name: &str, destroy: &mut dyn FnMut(&str, Disposable)) {
        self.early.lock().remove(name);
        let disposable = self.disposables.lock().take(name);
        self.destroy_one(name, disposable, destroy);
    }

    /// Completed singleton names in creation order.
    pub(crate) fn creation_order(&self) -> Vec<String> {
        self.creation_order.lock().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.completed.read().len()
    }

    /// Records that `consumer` depends on `provider`.
    pub(crate) fn register_dependent(&self, provider: &str, consumer: &str) {
        if provider == consumer {
            return;
        }
        {
            let mut dependents = self.dependents.lock();
            let consumers = dependents.entry(provider.to_string()).or_default();
            if !consumers.iter().any(|existing| existing == consumer) {
                consumers.push(consumer.to_string());
            }
        }
        let mut dependencies = self.dependencies.lock();
        let providers = dependencies.entry(consumer.to_string()).or_default();
        if !providers.iter().any(|existing| existing == provider) {
            providers.push(provider.to_string());
        }
    }

    pub(crate) fn dependents_of(&self, provider: &str) -> Vec<String> {
        self.dependents.lock().get(provider).cloned().unwrap_or_default()
    }

    pub(crate) fn dependencies_of(&self, consumer: &str) -> Vec<String> {
        self.dependencies.lock().get(consumer).cloned().unwrap_or_default()
    }

    /// True if `candidate` depends on `name`, directly or transitively.
    pub(crate) fn is_dependent(&self, name: &str, candidate: &str) -> bool {
        let dependents = self.dependents.lock();
        let mut seen = HashSet::new();
        let mut pending = vec![name];
        while let Some(current) = pending.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(consumers) = dependents.get(current) {
                if consumers.iter().any(|consumer| consumer == candidate) {
                    return true;
                }
                pending.extend(consumers.iter().map(String::as_str));
            }
        }
        false
    }

    pub(crate) fn register_disposable(&self, name: &str, disposable: Disposable) {
        self.disposables.lock().push(name, disposable);
    }

    /// Destroys every singleton, newest first, destroying dependents before
    /// the beans they depend on. All bookkeeping is cleared afterwards.
    pub(crate) fn destroy_all(&self, destroy: &mut dyn FnMut(&str, Disposable)) {
        loop {
            let next = self.disposables.lock().pop();
            match next {
                Some((name, disposable)) => self.destroy_one(&name, Some(disposable), destroy),
                None => break,
            }
        }
        self.completed.write().clear();
        self.early.lock().clear();
        self.creation_order.lock().clear();
        self.dependents.lock().clear();
        self.dependencies.lock().clear();
    }

    fn destroy_one(&self, name: &str, disposable: Option<Disposable>, destroy: &mut dyn FnMut(&str, Disposable)) {
        self.completed.write().remove(name);

        let dependents = self.dependents.lock().remove(name).unwrap_or_default();
        for dependent in dependents.iter().rev() {
            let entry = self.disposables.lock().take(dependent);
            self.destroy_one(dependent, entry, destroy);
        }

        if let Some(disposable) = disposable {
            destroy(name, disposable);
        }

        self.dependencies.lock().remove(name);
        self.creation_order.lock().retain(|existing| existing != name);
    }
}
