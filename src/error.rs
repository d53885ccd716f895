//! Error types for the bean container.

use thiserror::Error;

/// Boxed error returned by user callbacks (constructors, setters, init and
/// destroy methods, scope factories).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Bean container errors
///
/// Structural errors raised by the container itself (missing definitions,
/// ambiguous candidates, cycles) propagate unchanged through nested creations.
/// Failures raised by user code or post-processor hooks are wrapped once in
/// [`BeanError::CreationFailed`] carrying the name of the bean being built.
///
/// # Examples
///
/// ```rust
/// use ferrous_beans::BeanError;
///
/// let circular = BeanError::CircularDependency {
///     chain: vec!["a".into(), "b".into(), "a".into()],
/// };
/// assert_eq!(circular.to_string(), "circular dependency: a -> b -> a");
///
/// let missing = BeanError::NoSuchDefinition("repository".into());
/// assert!(missing.to_string().contains("repository"));
/// ```
#[derive(Debug, Error)]
pub enum BeanError {
    /// No definition is registered under the name
    #[error("no bean definition named '{0}'")]
    NoSuchDefinition(String),

    /// A definition already exists and overriding is disallowed
    #[error("bean definition '{name}' is already registered and overriding is disabled")]
    DuplicateDefinition { name: String },

    /// Type-based resolution found no candidate for a required dependency
    #[error("no bean of type {required_type} available for '{consumer}'")]
    NoSuchDependency { consumer: String, required_type: &'static str },

    /// Type-based resolution found several candidates and nothing breaks the tie
    #[error(
        "expected a single bean of type {required_type} for '{consumer}' but found {}: {}",
        .candidates.len(),
        .candidates.join(", ")
    )]
    AmbiguousDependency {
        consumer: String,
        required_type: &'static str,
        candidates: Vec<String>,
    },

    /// Several constructors resolve equally well
    #[error("bean '{name}' has {tied} equally resolvable constructors with {arity} parameters")]
    AmbiguousConstructor { name: String, arity: usize, tied: usize },

    /// A dependency cycle that cannot be broken (includes the chain)
    #[error("circular dependency: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// A user callback or post-processor hook failed while building the bean
    #[error("error creating bean '{name}': {source}")]
    CreationFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    /// The bean exists but cannot be viewed as the requested type
    #[error("bean '{name}' cannot be used as {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    /// A definition names a scope nobody registered
    #[error("no scope registered under '{0}'")]
    NoSuchScope(String),

    /// A definition is structurally unusable (abstract, no strategy, parent cycle)
    #[error("invalid bean definition '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },

    /// The operation is not legal in the current container state
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A configuration key is missing or has the wrong shape
    #[error("configuration error for '{key}': {message}")]
    Config { key: String, message: String },
}

impl BeanError {
    /// Wraps a user or hook failure for the named bean.
    pub fn creation(name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        BeanError::CreationFailed { name: name.into(), source: source.into() }
    }

    /// Converts a callback or hook failure for the named bean.
    ///
    /// Container errors raised further down (a nested bean failing, a cycle)
    /// pass through unchanged; anything else is wrapped in `CreationFailed`.
    pub(crate) fn from_callback(name: &str, err: BoxError) -> Self {
        match err.downcast::<BeanError>() {
            Ok(inner) => *inner,
            Err(other) => BeanError::CreationFailed { name: name.to_string(), source: other },
        }
    }

    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        BeanError::InvalidDefinition { name: name.into(), reason: reason.into() }
    }

    /// Returns the cycle chain if this error, or a wrapped cause, is a circular dependency.
    pub fn circular_chain(&self) -> Option<&[String]> {
        match self {
            BeanError::CircularDependency { chain } => Some(chain.as_slice()),
            BeanError::CreationFailed { source, .. } => {
                source.downcast_ref::<BeanError>().and_then(BeanError::circular_chain)
            }
            _ => None,
        }
    }

    /// The innermost container error, following `CreationFailed` wrappers.
    pub fn root_cause(&self) -> &BeanError {
        match self {
            BeanError::CreationFailed { source, .. } => source
                .downcast_ref::<BeanError>()
                .map(BeanError::root_cause)
                .unwrap_or(self),
            _ => self,
        }
    }
}

/// Result type for container operations
pub type BeanResult<T> = Result<T, BeanError>;
