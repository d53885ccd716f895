//! Dependency resolution: which bean satisfies a type-based dependency.

use crate::definition::DefinitionRegistry;
use crate::error::{BeanError, BeanResult};
use crate::key::TypeKey;
use crate::value::DependencySpec;

/// Resolves dependencies against a definition registry
///
/// The disambiguation order is fixed:
///
/// 1. an explicit name reference is used directly
/// 2. otherwise candidates are the non-abstract, autowire-candidate
///    definitions exposing the required type, excluding the consumer
/// 3. a single candidate is selected
/// 4. among several, the single `primary` one is selected
/// 5. then a qualifier (or the parameter name) matching a candidate's name or alias
/// 6. anything else is ambiguous; no candidate at all is an error unless the
///    dependency is optional
pub(crate) struct DependencyResolver<'a> {
    registry: &'a DefinitionRegistry,
}

impl<'a> DependencyResolver<'a> {
    pub(crate) fn new(registry: &'a DefinitionRegistry) -> Self {
        Self { registry }
    }

    /// Canonical name of an explicitly referenced bean.
    pub(crate) fn resolve_reference(&self, name: &str) -> BeanResult<String> {
        let canonical = self.registry.canonical_name(name);
        if !self.registry.contains(&canonical) {
            return Err(BeanError::NoSuchDefinition(name.to_string()));
        }
        Ok(canonical)
    }

    /// Autowire candidates for `key`, in registration order.
    pub(crate) fn candidates(&self, consumer: &str, key: TypeKey) -> BeanResult<Vec<String>> {
        let consumer = self.registry.canonical_name(consumer);
        let mut candidates = Vec::new();
        for name in self.registry.names_for_type(key)? {
            if name == consumer {
                continue;
            }
            if self.registry.merged(&name)?.autowire_candidate {
                candidates.push(name);
            }
        }
        Ok(candidates)
    }

    /// Name of the bean satisfying `spec` for `consumer`; `None` when an
    /// optional dependency has no candidate.
    pub(crate) fn resolve(&self, consumer: &str, spec: &DependencySpec) -> BeanResult<Option<String>> {
        let mut candidates = self.candidates(consumer, spec.required_type)?;

        match candidates.len() {
            0 if spec.optional => {
                tracing::trace!(consumer, required = spec.required_type.name(), "optional dependency absent");
                Ok(None)
            }
            0 => Err(BeanError::NoSuchDependency {
                consumer: consumer.to_string(),
                required_type: spec.required_type.name(),
            }),
            1 => Ok(candidates.pop()),
            _ => self.disambiguate(consumer, spec, candidates).map(Some),
        }
    }

    fn disambiguate(&self, consumer: &str, spec: &DependencySpec, candidates: Vec<String>) -> BeanResult<String> {
        let mut primaries = Vec::new();
        for name in &candidates {
            if self.registry.merged(name)?.primary {
                primaries.push(name.clone());
            }
        }
        if primaries.len() == 1 {
            tracing::trace!(consumer, selected = %primaries[0], "selected primary candidate");
            return Ok(primaries.remove(0));
        }

        if let Some(hint) = spec.hint() {
            let target = self.registry.canonical_name(hint);
            if let Some(selected) = candidates.iter().find(|name| **name == target) {
                tracing::trace!(consumer, selected = %selected, hint, "selected candidate by name");
                return Ok(selected.clone());
            }
        }

        Err(BeanError::AmbiguousDependency {
            consumer: consumer.to_string(),
            required_type: spec.required_type.name(),
            candidates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::BeanDefinition;
    use std::sync::Arc;

    trait Store: Send + Sync {}
    struct Disk;
    struct Memory;
    impl Store for Disk {}
    impl Store for Memory {}

    fn disk() -> BeanDefinition {
        BeanDefinition::of::<Disk>()
            .exposes::<dyn Store, Disk>(|d| d as Arc<dyn Store>)
            .constructor(vec![], |_| Ok(Disk))
    }

    fn memory() -> BeanDefinition {
        BeanDefinition::of::<Memory>()
            .exposes::<dyn Store, Memory>(|m| m as Arc<dyn Store>)
            .constructor(vec![], |_| Ok(Memory))
    }

    #[test]
    fn unique_candidate_is_selected() {
        let mut registry = DefinitionRegistry::new();
        registry.register("disk", disk()).unwrap();
        let resolver = DependencyResolver::new(&registry);
        let name = resolver.resolve("service", &DependencySpec::of::<dyn Store>()).unwrap();
        assert_eq!(name.as_deref(), Some("disk"));
    }

    #[test]
    fn primary_wins_before_qualifier() {
        let mut registry = DefinitionRegistry::new();
        registry.register("disk", disk()).unwrap();
        registry.register("memory", memory().primary()).unwrap();
        let resolver = DependencyResolver::new(&registry);
        let spec = DependencySpec::of::<dyn Store>().qualified("disk");
        assert_eq!(resolver.resolve("service", &spec).unwrap().as_deref(), Some("memory"));
    }

    #[test]
    fn qualifier_matches_aliases() {
        let mut registry = DefinitionRegistry::new();
        registry.register("disk", disk()).unwrap();
        registry.register("memory", memory()).unwrap();
        registry.register_alias("memory", "cache").unwrap();
        let spec = DependencySpec::of::<dyn Store>().qualified("cache");
        let name = DependencyResolver::new(&registry).resolve("service", &spec).unwrap();
        assert_eq!(name.as_deref(), Some("memory"));
    }

    #[test]
    fn ambiguity_lists_all_candidates() {
        let mut registry = DefinitionRegistry::new();
        registry.register("disk", disk()).unwrap();
        registry.register("memory", memory()).unwrap();
        let err = DependencyResolver::new(&registry)
            .resolve("service", &DependencySpec::of::<dyn Store>())
            .unwrap_err();
        match err {
            BeanError::AmbiguousDependency { candidates, .. } => assert_eq!(candidates, vec!["disk", "memory"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn consumer_and_non_candidates_are_excluded() {
        let mut registry = DefinitionRegistry::new();
        registry.register("disk", disk()).unwrap();
        registry.register("memory", memory().autowire_candidate(false)).unwrap();
        let resolver = DependencyResolver::new(&registry);
        assert!(resolver.resolve("disk", &DependencySpec::of::<dyn Store>().optional()).unwrap().is_none());
        assert!(matches!(
            resolver.resolve("disk", &DependencySpec::of::<dyn Store>()),
            Err(BeanError::NoSuchDependency { .. })
        ));
    }
}
