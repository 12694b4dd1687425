//! Error types for the reflection core.
//!
//! Every failure aborts the current dynamic call chain immediately; nothing
//! is retried and nothing falls back to a silent default. Callers at the
//! edge of the reflection layer (inspectors, serializers) are expected to
//! catch and report.

/// Result type used throughout the reflection core.
pub type Result<T> = std::result::Result<T, ReflectError>;

/// Reflection error taxonomy.
///
/// All variants are programmer-visible configuration or usage errors, not
/// transient conditions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReflectError {
    /// A type or function name was absent from the full registry chain.
    #[error("`{name}` is not registered")]
    NotRegistered {
        /// The name or identity that missed every registry in the chain.
        name: String,
    },

    /// An invocation received the wrong number of arguments.
    #[error("wrong number of arguments: expected {expected}, got {got}")]
    ArityMismatch {
        /// Arity the function was registered with (owner included).
        expected: usize,
        /// Number of arguments actually supplied.
        got: usize,
    },

    /// Typed access was attempted with a non-matching identity and no
    /// conversion path applies.
    #[error("no trivial conversion from {from} to {to}")]
    TypeMismatch {
        /// Identity of the stored value.
        from: String,
        /// Identity that was requested.
        to: String,
    },

    /// No registered constructor of the target type accepts the source type.
    #[error("no conversion from {from} to {to}")]
    ConversionFailed {
        /// Identity of the argument being converted.
        from: String,
        /// Identity the call site expected.
        to: String,
    },

    /// None of a type's registered constructors fit the supplied arguments.
    #[error("no registered constructor of `{type_name}` matches the supplied arguments")]
    NoMatchingConstructor {
        /// Name of the type that could not be constructed.
        type_name: String,
    },

    /// A lifecycle operation was invoked that the concrete type did not
    /// support when the value was captured.
    #[error("value of type {type_name} does not support {op}")]
    UnsupportedOperation {
        /// The operation that is unavailable.
        op: &'static str,
        /// Identity of the value the operation was attempted on.
        type_name: String,
    },

    /// An operation was attempted on a value whose address is null, for
    /// example after its storage was moved out.
    #[error("value address is null or has been moved out")]
    InvalidValue,

    /// A type was registered twice in the same registry chain.
    ///
    /// Duplicate registration is a logic error and fails fast rather than
    /// silently overwriting.
    #[error("`{name}` is already registered")]
    AlreadyRegistered {
        /// Name under which the duplicate registration was attempted.
        name: String,
    },
}
