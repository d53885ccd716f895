//! Definition store: registration order, aliases, merged-definition cache.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{BeanDefinition, MergedDefinition};
use crate::error::{BeanError, BeanResult};
use crate::key::TypeKey;

/// Registry of bean definitions keyed by name
///
/// Registration order is preserved and determines the default instantiation
/// order. Merged definitions are cached and the cache is invalidated whenever
/// a definition is registered, removed or handed out mutably. Once frozen,
/// the registry rejects every mutation.
///
/// # Examples
///
/// ```rust
/// use ferrous_beans::{BeanDefinition, DefinitionRegistry, ScopeKind};
///
/// struct Service;
///
/// let mut registry = DefinitionRegistry::new();
/// registry.register("base", BeanDefinition::of::<Service>().scope(ScopeKind::Prototype).abstract_()).unwrap();
/// registry.register("service", BeanDefinition::child_of("base").constructor(vec![], |_| Ok(Service))).unwrap();
/// registry.register_alias("service", "svc").unwrap();
///
/// let merged = registry.merged("svc").unwrap();
/// assert_eq!(merged.name, "service");
/// assert_eq!(merged.scope, ScopeKind::Prototype);
/// assert_eq!(registry.names().collect::<Vec<_>>(), vec!["base", "service"]);
/// ```
#[derive(Default)]
pub struct DefinitionRegistry {
    definitions: HashMap<String, BeanDefinition>,
    order: Vec<String>,
    /// alias -> name it stands for (possibly another alias)
    aliases: HashMap<String, String>,
    merged: Mutex<HashMap<String, Arc<MergedDefinition>>>,
    by_type: Mutex<HashMap<TypeKey, Vec<String>>>,
    allow_overriding: bool,
    frozen: bool,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overriding(allow_overriding: bool) -> Self {
        Self { allow_overriding, ..Self::default() }
    }

    pub fn set_allow_overriding(&mut self, allow: bool) {
        self.allow_overriding = allow;
    }

    pub fn allows_overriding(&self) -> bool {
        self.allow_overriding
    }

    /// Registers a definition.
    ///
    /// An allowed override keeps the original registration position.
    pub fn register(&mut self, name: impl Into<String>, definition: BeanDefinition) -> BeanResult<()> {
        let name = name.into();
        self.check_mutable()?;
        if name.trim().is_empty() {
            return Err(BeanError::invalid(name, "bean name must not be empty"));
        }
        if self.aliases.contains_key(&name) {
            return Err(BeanError::invalid(&name, format!("'{}' is already used as an alias", name)));
        }
        if self.definitions.contains_key(&name) {
            if !self.allow_overriding {
                return Err(BeanError::DuplicateDefinition { name });
            }
            tracing::info!(bean = %name, "overriding bean definition");
        } else {
            self.order.push(name.clone());
        }
        self.definitions.insert(name, definition);
        self.invalidate();
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> BeanResult<BeanDefinition> {
        self.check_mutable()?;
        let name = self.canonical_name(name);
        let definition = self
            .definitions
            .remove(&name)
            .ok_or_else(|| BeanError::NoSuchDefinition(name.clone()))?;
        self.order.retain(|existing| existing != &name);
        let target = name.clone();
        self.aliases.retain(|_, points_to| *points_to != target);
        self.invalidate();
        Ok(definition)
    }

    pub fn get(&self, name: &str) -> BeanResult<&BeanDefinition> {
        let name = self.canonical_name(name);
        self.definitions.get(&name).ok_or(BeanError::NoSuchDefinition(name))
    }

    /// Mutable access for factory post-processors; invalidates merged definitions.
    pub fn get_mut(&mut self, name: &str) -> BeanResult<&mut BeanDefinition> {
        self.check_mutable()?;
        self.invalidate();
        let name = self.canonical_name(name);
        self.definitions.get_mut(&name).ok_or(BeanError::NoSuchDefinition(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(&self.canonical_name(name))
    }

    /// Definition names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Registers `alias` as another name for `name`.
    pub fn register_alias(&mut self, name: &str, alias: impl Into<String>) -> BeanResult<()> {
        let alias = alias.into();
        self.check_mutable()?;
        if alias == name {
            self.aliases.remove(&alias);
            return Ok(());
        }
        if self.definitions.contains_key(&alias) {
            return Err(BeanError::invalid(&alias, "alias collides with a bean name"));
        }
        if let Some(existing) = self.aliases.get(&alias) {
            if existing == name {
                return Ok(());
            }
            if !self.allow_overriding {
                return Err(BeanError::invalid(
                    &alias,
                    format!("alias already registered for '{}'", existing),
                ));
            }
        }
        if self.resolves_through(name, &alias) {
            return Err(BeanError::invalid(&alias, format!("alias cycle through '{}'", name)));
        }
        self.aliases.insert(alias, name.to_string());
        self.invalidate();
        Ok(())
    }

    /// Resolves aliases to the name the definition is registered under.
    pub fn canonical_name(&self, name: &str) -> String {
        let mut current = name;
        let mut seen = HashSet::new();
        while let Some(next) = self.aliases.get(current) {
            if !seen.insert(current) {
                break;
            }
            current = next;
        }
        current.to_string()
    }

    fn resolves_through(&self, name: &str, alias: &str) -> bool {
        let mut current = name;
        for _ in 0..=self.aliases.len() {
            if current == alias {
                return true;
            }
            match self.aliases.get(current) {
                Some(next) => current = next,
                None => return false,
            }
        }
        false
    }

    /// Every alias that resolves to `name`.
    pub fn aliases(&self, name: &str) -> Vec<String> {
        let canonical = self.canonical_name(name);
        let mut aliases: Vec<String> = self
            .aliases
            .keys()
            .filter(|alias| self.canonical_name(alias) == canonical)
            .cloned()
            .collect();
        aliases.sort();
        aliases
    }

    /// The definition with its parent chain resolved.
    pub fn merged(&self, name: &str) -> BeanResult<Arc<MergedDefinition>> {
        let name = self.canonical_name(name);
        if let Some(cached) = self.merged.lock().get(&name) {
            return Ok(cached.clone());
        }

        let mut chain = Vec::new();
        let mut visited = vec![name.clone()];
        let mut current = self.definitions.get(&name).ok_or_else(|| BeanError::NoSuchDefinition(name.clone()))?;
        chain.push(current);
        while let Some(parent) = current.parent() {
            let parent = self.canonical_name(parent);
            if visited.contains(&parent) {
                visited.push(parent);
                return Err(BeanError::invalid(&name, format!("parent cycle: {}", visited.join(" -> "))));
            }
            current = self.definitions.get(&parent).ok_or_else(|| {
                BeanError::invalid(&name, format!("parent definition '{}' does not exist", parent))
            })?;
            visited.push(parent);
            chain.push(current);
        }
        chain.reverse();

        let merged = Arc::new(MergedDefinition::merge(&name, &chain));
        self.merged.lock().insert(name, merged.clone());
        Ok(merged)
    }

    /// Non-abstract definitions exposing `key`, in registration order.
    pub fn names_for_type(&self, key: TypeKey) -> BeanResult<Vec<String>> {
        if let Some(cached) = self.by_type.lock().get(&key) {
            return Ok(cached.clone());
        }
        let mut names = Vec::new();
        for name in &self.order {
            let merged = self.merged(name)?;
            if !merged.is_abstract && merged.has_type(key) {
                names.push(name.clone());
            }
        }
        self.by_type.lock().insert(key, names.clone());
        Ok(names)
    }

    /// Rejects all further mutation.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn check_mutable(&self) -> BeanResult<()> {
        if self.frozen {
            return Err(BeanError::IllegalState("bean definitions are frozen".into()));
        }
        Ok(())
    }

    fn invalidate(&self) {
        self.merged.lock().clear();
        self.by_type.lock().clear();
    }
}
