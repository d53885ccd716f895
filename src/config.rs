//! Configuration for ferrous-beans.
//!
//! Layered configuration sources (environment, in-memory maps, JSON files
//! behind the `config` feature), the [`ContextConfig`] switches of an
//! application context, and [`PlaceholderConfigurer`], which substitutes
//! `${key}` placeholders in textual bean values before instantiation.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::definition::DefinitionRegistry;
use crate::error::{BeanError, BeanResult, BoxError};
use crate::processor::BeanFactoryPostProcessor;
use crate::value::ValueSpec;

/// Configuration provider: sources queried in priority order
pub struct ConfigProvider {
    /// Configuration sources in priority order
    sources: Vec<Box<dyn ConfigSource>>,
    cache: RwLock<HashMap<String, ConfigValue>>,
}

impl fmt::Debug for ConfigProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigProvider")
            .field("sources", &format!("{} sources", self.sources.len()))
            .field("cache", &*self.cache.read())
            .finish()
    }
}

/// A configuration value that can be various types
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(untagged))]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Array(Vec<ConfigValue>),
    Object(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Parses raw text the way environment values are read.
    pub fn parse(raw: &str) -> Self {
        if let Ok(int_val) = raw.parse::<i64>() {
            ConfigValue::Integer(int_val)
        } else if let Ok(float_val) = raw.parse::<f64>() {
            ConfigValue::Float(float_val)
        } else if let Ok(bool_val) = raw.parse::<bool>() {
            ConfigValue::Boolean(bool_val)
        } else {
            ConfigValue::String(raw.to_string())
        }
    }

    pub fn as_string(&self, key: &str) -> BeanResult<&str> {
        match self {
            ConfigValue::String(s) => Ok(s),
            _ => Err(mismatch(key, "a string")),
        }
    }

    pub fn as_i64(&self, key: &str) -> BeanResult<i64> {
        match self {
            ConfigValue::Integer(i) => Ok(*i),
            _ => Err(mismatch(key, "an integer")),
        }
    }

    pub fn as_bool(&self, key: &str) -> BeanResult<bool> {
        match self {
            ConfigValue::Boolean(b) => Ok(*b),
            ConfigValue::String(s) => s.parse().map_err(|_| mismatch(key, "a boolean")),
            _ => Err(mismatch(key, "a boolean")),
        }
    }
}

/// Scalars render as their plain text; arrays and objects as JSON-like text.
impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(s) => f.write_str(s),
            ConfigValue::Integer(i) => write!(f, "{}", i),
            ConfigValue::Float(x) => write!(f, "{}", x),
            ConfigValue::Boolean(b) => write!(f, "{}", b),
            ConfigValue::Array(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            ConfigValue::Object(fields) => {
                let mut keys: Vec<&String> = fields.keys().collect();
                keys.sort();
                f.write_str("{")?;
                for (index, key) in keys.into_iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}:{}", key, fields[key])?;
                }
                f.write_str("}")
            }
        }
    }
}

fn mismatch(key: &str, expected: &str) -> BeanError {
    BeanError::Config { key: key.to_string(), message: format!("value is not {}", expected) }
}

/// Source of configuration values.
pub trait ConfigSource: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Option<ConfigValue>;

    /// All keys this source knows about.
    fn keys(&self) -> Vec<String>;
}

/// Environment variable configuration source
///
/// Keys map to variable names by upper-casing and replacing `.` and `-` with
/// `_`; a prefix is prepended with a `_` separator, so `beans.display_name`
/// with prefix `app` reads `APP_BEANS_DISPLAY_NAME`.
#[derive(Debug, Default)]
pub struct EnvironmentConfigSource {
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()) }
    }

    fn variable_name(&self, key: &str) -> String {
        let key = key.replace(['.', '-'], "_").to_uppercase();
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key),
            None => key,
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        env::var(self.variable_name(key)).ok().map(|value| ConfigValue::parse(&value))
    }

    fn keys(&self) -> Vec<String> {
        env::vars()
            .filter_map(|(key, _)| match &self.prefix {
                Some(prefix) => {
                    let prefix = format!("{}_", prefix.to_uppercase());
                    key.strip_prefix(&prefix).map(str::to_lowercase)
                }
                None => Some(key.to_lowercase()),
            })
            .collect()
    }
}

/// In-memory configuration source.
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource {
    values: HashMap<String, ConfigValue>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ConfigValue) {
        self.values.insert(key.into(), value);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapConfigSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let values = iter
            .into_iter()
            .map(|(key, value)| (key.into(), ConfigValue::String(value.into())))
            .collect();
        Self { values }
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// JSON file configuration source
///
/// Nested objects are addressable with dotted keys: `{"beans": {"display_name": "x"}}`
/// answers `beans.display_name`.
#[cfg(feature = "config")]
#[derive(Debug)]
pub struct JsonConfigSource {
    file_path: String,
    config: RwLock<Option<HashMap<String, ConfigValue>>>,
}

#[cfg(feature = "config")]
impl JsonConfigSource {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self { file_path: file_path.into(), config: RwLock::new(None) }
    }

    /// Reload configuration from file
    pub fn reload(&self) -> BeanResult<()> {
        let content = std::fs::read_to_string(&self.file_path).map_err(|err| BeanError::Config {
            key: self.file_path.clone(),
            message: format!("cannot read configuration file: {}", err),
        })?;
        let parsed: HashMap<String, ConfigValue> = serde_json::from_str(&content).map_err(|err| BeanError::Config {
            key: self.file_path.clone(),
            message: format!("invalid JSON configuration: {}", err),
        })?;
        *self.config.write() = Some(parsed);
        Ok(())
    }

    fn lookup(values: &HashMap<String, ConfigValue>, key: &str) -> Option<ConfigValue> {
        if let Some(value) = values.get(key) {
            return Some(value.clone());
        }
        let (head, rest) = key.split_once('.')?;
        match values.get(head)? {
            ConfigValue::Object(nested) => Self::lookup(nested, rest),
            _ => None,
        }
    }
}

#[cfg(feature = "config")]
impl ConfigSource for JsonConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        if self.config.read().is_none() {
            if let Err(err) = self.reload() {
                tracing::warn!(error = %err, "failed to load JSON configuration");
                return None;
            }
        }
        self.config.read().as_ref().and_then(|values| Self::lookup(values, key))
    }

    fn keys(&self) -> Vec<String> {
        self.config.read().as_ref().map(|values| values.keys().cloned().collect()).unwrap_or_default()
    }
}

impl ConfigProvider {
    pub fn new() -> Self {
        Self { sources: Vec::new(), cache: RwLock::new(HashMap::new()) }
    }

    /// Add a configuration source (higher priority sources should be added first)
    pub fn add_source(&mut self, source: Box<dyn ConfigSource>) {
        self.sources.push(source);
        self.invalidate_cache();
    }

    pub fn with_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.add_source(Box::new(source));
        self
    }

    /// Get a configuration value, checking sources in priority order
    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        if let Some(value) = self.cache.read().get(key) {
            return Some(value.clone());
        }
        let value = self.sources.iter().find_map(|source| source.get(key))?;
        self.cache.write().insert(key.to_string(), value.clone());
        Some(value)
    }

    pub fn get_string(&self, key: &str) -> BeanResult<String> {
        self.required(key)?.as_string(key).map(str::to_string)
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    pub fn get_i64(&self, key: &str) -> BeanResult<i64> {
        self.required(key)?.as_i64(key)
    }

    pub fn get_bool(&self, key: &str) -> BeanResult<bool> {
        self.required(key)?.as_bool(key)
    }

    /// Boolean value; a missing key yields `default`, a malformed one an error.
    pub fn get_bool_or(&self, key: &str, default: bool) -> BeanResult<bool> {
        match self.get(key) {
            Some(value) => value.as_bool(key),
            None => Ok(default),
        }
    }

    /// Clear the configuration cache (forces reload from sources)
    pub fn invalidate_cache(&self) {
        self.cache.write().clear();
    }

    /// Get all configuration keys from all sources
    pub fn all_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sources.iter().flat_map(|source| source.keys()).collect();
        keys.sort();
        keys.dedup();
        keys
    }

    fn required(&self, key: &str) -> BeanResult<ConfigValue> {
        self.get(key)
            .ok_or_else(|| BeanError::Config { key: key.to_string(), message: "key not found".into() })
    }
}

impl Default for ConfigProvider {
    fn default() -> Self {
        let mut provider = Self::new();
        provider.add_source(Box::new(EnvironmentConfigSource::new()));
        provider
    }
}

/// Settings of an [`ApplicationContext`](crate::ApplicationContext).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ContextConfig {
    /// Later registrations may replace earlier ones under the same name.
    pub allow_definition_overriding: bool,
    /// Singletons may be exposed early to break setter-injection cycles.
    pub allow_circular_references: bool,
    pub display_name: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            allow_definition_overriding: false,
            allow_circular_references: false,
            display_name: "application".to_string(),
        }
    }
}

impl ContextConfig {
    /// Loads the `beans.*` keys, keeping defaults for missing ones.
    pub fn load(config: &ConfigProvider) -> BeanResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            allow_definition_overriding: config
                .get_bool_or("beans.allow_definition_overriding", defaults.allow_definition_overriding)?,
            allow_circular_references: config
                .get_bool_or("beans.allow_circular_references", defaults.allow_circular_references)?,
            display_name: config.get_string_or("beans.display_name", &defaults.display_name),
        })
    }
}

/// Factory post-processor resolving `${key}` and `${key:default}` placeholders
///
/// Applies to textual values ([`ValueSpec::Text`]) of explicit constructor
/// arguments, constructor and factory-method parameters, and properties.
/// Replacement text is resolved again, so placeholders may nest through
/// configuration values. An unresolvable placeholder fails the refresh with
/// [`BeanError::Config`].
///
/// ```
/// use ferrous_beans::{ApplicationContext, BeanDefinition, ConfigProvider, MapConfigSource, Param, PlaceholderConfigurer};
/// use std::sync::Arc;
///
/// struct Endpoint { url: String }
///
/// let config = ConfigProvider::new()
///     .with_source([("db.host", "localhost")].into_iter().collect::<MapConfigSource>());
///
/// let mut context = ApplicationContext::new();
/// context.add_factory_post_processor(Arc::new(PlaceholderConfigurer::new(Arc::new(config))));
/// context.register("endpoint", BeanDefinition::of::<Endpoint>()
///     .constructor(vec![Param::text("postgres://${db.host}:${db.port:5432}")], |args| {
///         Ok(Endpoint { url: args.value::<String>(0)? })
///     })).unwrap();
/// context.refresh().unwrap();
///
/// let endpoint = context.get_bean("endpoint").unwrap().downcast::<Endpoint>().unwrap();
/// assert_eq!(endpoint.url, "postgres://localhost:5432");
/// ```
pub struct PlaceholderConfigurer {
    config: Arc<ConfigProvider>,
    order: i32,
}

const PLACEHOLDER_PREFIX: &str = "${";
const PLACEHOLDER_SUFFIX: &str = "}";
const DEFAULT_SEPARATOR: char = ':';
const MAX_NESTING: usize = 32;

/// Offset of the suffix closing a placeholder body, skipping nested placeholders.
fn closing_suffix(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut index = 0;
    while index < body.len() {
        let rest = &body[index..];
        if rest.starts_with(PLACEHOLDER_PREFIX) {
            depth += 1;
            index += PLACEHOLDER_PREFIX.len();
        } else if rest.starts_with(PLACEHOLDER_SUFFIX) {
            if depth == 0 {
                return Some(index);
            }
            depth -= 1;
            index += PLACEHOLDER_SUFFIX.len();
        } else {
            index += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    None
}

/// Splits `key:default` at the first separator outside nested placeholders.
fn split_default(body: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    let mut index = 0;
    while index < body.len() {
        let rest = &body[index..];
        if rest.starts_with(PLACEHOLDER_PREFIX) {
            depth += 1;
            index += PLACEHOLDER_PREFIX.len();
            continue;
        }
        if rest.starts_with(PLACEHOLDER_SUFFIX) {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && rest.starts_with(DEFAULT_SEPARATOR) {
            return (&body[..index], Some(&rest[DEFAULT_SEPARATOR.len_utf8()..]));
        }
        index += rest.chars().next().map_or(1, char::len_utf8);
    }
    (body, None)
}

impl PlaceholderConfigurer {
    pub fn new(config: Arc<ConfigProvider>) -> Self {
        Self { config, order: i32::MIN }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Replaces every placeholder in `text`.
    pub fn resolve(&self, text: &str) -> BeanResult<String> {
        self.resolve_nested(text, 0)
    }

    fn resolve_nested(&self, text: &str, depth: usize) -> BeanResult<String> {
        if depth > MAX_NESTING {
            return Err(BeanError::Config { key: text.to_string(), message: "placeholders nest too deeply".into() });
        }
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(PLACEHOLDER_PREFIX) {
            out.push_str(&rest[..start]);
            let body_start = start + PLACEHOLDER_PREFIX.len();
            let Some(end) = closing_suffix(&rest[body_start..]) else {
                return Err(BeanError::Config { key: text.to_string(), message: "unterminated placeholder".into() });
            };
            let body = &rest[body_start..body_start + end];
            let (key, default) = split_default(body);
            let key = self.resolve_nested(key, depth + 1)?;
            let replacement = match (self.config.get(&key), default) {
                (Some(value), _) => self.resolve_nested(&value.to_string(), depth + 1)?,
                (None, Some(default)) => self.resolve_nested(default, depth + 1)?,
                (None, None) => {
                    return Err(BeanError::Config {
                        key,
                        message: format!("could not resolve placeholder in \"{}\"", text),
                    })
                }
            };
            out.push_str(&replacement);
            rest = &rest[body_start + end + PLACEHOLDER_SUFFIX.len()..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn resolve_spec(&self, spec: &mut ValueSpec) -> BeanResult<()> {
        if let ValueSpec::Text(text) = spec {
            if text.contains(PLACEHOLDER_PREFIX) {
                *text = self.resolve(text)?;
            }
        }
        Ok(())
    }
}

impl BeanFactoryPostProcessor for PlaceholderConfigurer {
    fn post_process(&self, registry: &mut DefinitionRegistry) -> Result<(), BoxError> {
        let names: Vec<String> = registry.names().map(String::from).collect();
        for name in names {
            let definition = registry.get_mut(&name)?;
            for spec in definition.constructor_args_mut().values_mut() {
                self.resolve_spec(spec)?;
            }
            for param in definition.params_mut() {
                self.resolve_spec(&mut param.spec)?;
            }
            for property in definition.properties_mut() {
                if let ValueSpec::Text(text) = property.value() {
                    if text.contains(PLACEHOLDER_PREFIX) {
                        let resolved = self.resolve(text)?;
                        property.set_value(ValueSpec::Text(resolved));
                    }
                }
            }
            tracing::trace!(bean = %name, "resolved placeholders");
        }
        Ok(())
    }

    fn order(&self) -> i32 {
        self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{BeanDefinition, PropertyValue};
    use crate::value::Param;
    use serial_test::serial;

    #[test]
    #[serial]
    fn environment_source_maps_dotted_keys() {
        env::set_var("BEANS_TEST_DISPLAY_NAME", "orders");
        env::set_var("BEANS_TEST_WORKERS", "4");

        let source = EnvironmentConfigSource::with_prefix("beans_test");
        assert_eq!(source.get("display.name"), Some(ConfigValue::String("orders".into())));
        assert_eq!(source.get("workers"), Some(ConfigValue::Integer(4)));
        assert!(source.keys().contains(&"display_name".to_string()));

        env::remove_var("BEANS_TEST_DISPLAY_NAME");
        env::remove_var("BEANS_TEST_WORKERS");
    }

    #[test]
    #[serial]
    fn context_config_reads_beans_keys() {
        env::set_var("CTX_TEST_BEANS_ALLOW_CIRCULAR_REFERENCES", "true");
        let provider = ConfigProvider::new()
            .with_source(EnvironmentConfigSource::with_prefix("ctx_test"))
            .with_source(MapConfigSource::new().with("beans.display_name", ConfigValue::String("shop".into())));

        let config = ContextConfig::load(&provider).unwrap();
        assert!(config.allow_circular_references);
        assert!(!config.allow_definition_overriding);
        assert_eq!(config.display_name, "shop");

        env::remove_var("CTX_TEST_BEANS_ALLOW_CIRCULAR_REFERENCES");
    }

    #[test]
    fn malformed_switches_are_rejected() {
        let provider = ConfigProvider::new()
            .with_source(MapConfigSource::new().with("beans.allow_definition_overriding", ConfigValue::Integer(3)));
        assert!(matches!(ContextConfig::load(&provider), Err(BeanError::Config { .. })));
    }

    #[test]
    fn earlier_sources_win() {
        let provider = ConfigProvider::new()
            .with_source(MapConfigSource::new().with("port", ConfigValue::Integer(1)))
            .with_source(MapConfigSource::new().with("port", ConfigValue::Integer(2)).with("host", ConfigValue::String("h".into())));
        assert_eq!(provider.get_i64("port").unwrap(), 1);
        assert_eq!(provider.get_string("host").unwrap(), "h");
        assert_eq!(provider.all_keys(), vec!["host".to_string(), "port".to_string()]);
        assert!(provider.get_i64("host").is_err());
    }

    fn configurer() -> PlaceholderConfigurer {
        let source: MapConfigSource =
            [("host", "db.local"), ("url", "postgres://${host}"), ("self", "${self}")].into_iter().collect();
        PlaceholderConfigurer::new(Arc::new(ConfigProvider::new().with_source(source)))
    }

    #[test]
    fn placeholders_resolve_with_defaults_and_nesting() {
        let configurer = configurer();
        assert_eq!(configurer.resolve("${url}/app").unwrap(), "postgres://db.local/app");
        assert_eq!(configurer.resolve("${port:5432}").unwrap(), "5432");
        assert_eq!(configurer.resolve("no placeholders").unwrap(), "no placeholders");
        assert!(matches!(configurer.resolve("${missing}"), Err(BeanError::Config { key, .. }) if key == "missing"));
        assert!(configurer.resolve("${self}").is_err());
        assert!(configurer.resolve("${host").is_err());
    }

    #[test]
    fn nested_placeholders_match_their_own_braces() {
        let configurer = configurer();
        assert_eq!(configurer.resolve("${replica:${host}}").unwrap(), "db.local");
        assert_eq!(configurer.resolve("${a:${b:c}}").unwrap(), "c");
        assert_eq!(configurer.resolve("[${a:${b:${port:5432}}}]").unwrap(), "[5432]");
        assert_eq!(configurer.resolve("${${name:host}}").unwrap(), "db.local");
        assert!(configurer.resolve("${a:${b:c}").is_err());
    }

    struct Target;

    #[test]
    fn post_processing_rewrites_every_textual_value() {
        let mut registry = DefinitionRegistry::new();
        registry
            .register(
                "target",
                BeanDefinition::of::<Target>()
                    .constructor(vec![Param::text("${host}")], |_| Ok(Target))
                    .constructor_arg(1, ValueSpec::text("${url}"))
                    .property(PropertyValue::new::<Target, _>("name", ValueSpec::text("${name:fallback}"), |_, _| Ok(()))),
            )
            .unwrap();

        configurer().post_process(&mut registry).unwrap();

        let definition = registry.get("target").unwrap();
        assert!(matches!(definition.constructor_args().get(&1), Some(ValueSpec::Text(url)) if url == "postgres://db.local"));
        assert!(matches!(definition.properties()[0].value(), ValueSpec::Text(name) if name == "fallback"));
        let merged = registry.merged("target").unwrap();
        let Some(crate::definition::Instantiation::Constructors(ctors)) = &merged.instantiation else {
            panic!("expected constructors");
        };
        assert!(matches!(&ctors[0].params()[0].spec, ValueSpec::Text(host) if host == "db.local"));
    }
}
