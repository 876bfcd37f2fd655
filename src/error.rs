//! Error types for directory modify operations.
//!
//! This module provides comprehensive error handling for the write path,
//! following Rust's error handling best practices with detailed error information.
//! Every error carries a human-readable detail message; only the transactional
//! controller translates errors into client-visible LDAP result codes.

use crate::backend::BackendError;

/// Main error type for entry modification operations.
///
/// This enum covers all error conditions that can occur while validating,
/// applying, and committing a modify request, providing detailed context
/// for each error type.
#[derive(Debug, thiserror::Error)]
pub enum ModifyError {
    /// The target attribute is not defined in the schema
    #[error("Undefined attribute type: {attribute}")]
    UndefinedAttributeType { attribute: String },

    /// An added value already exists on the attribute
    #[error("Attribute '{attribute}' already has value '{value}'")]
    ValueAlreadyExists { attribute: String, value: String },

    /// A deleted attribute or value does not exist on the entry
    #[error("No such attribute: {attribute}: {detail}")]
    NoSuchAttribute { attribute: String, detail: String },

    /// The attribute would exceed the per-attribute value bound
    #[error("Attribute '{attribute}' cannot hold {count} values (maximum {max})")]
    TooManyValues {
        attribute: String,
        count: usize,
        max: usize,
    },

    /// The same value appears more than once in a single modification
    #[error("Duplicate value in modification of attribute '{attribute}'")]
    DuplicateValue { attribute: String },

    /// A single-valued attribute would end up with more than one value
    #[error("Attribute '{attribute}' is single-valued")]
    SingleValueViolation { attribute: String },

    /// A value or request field violates a data constraint
    #[error("Constraint violation on '{attribute}': {detail}")]
    DataConstraintViolation { attribute: String, detail: String },

    /// A value does not conform to the attribute's syntax
    #[error("Invalid syntax for attribute '{attribute}': {detail}")]
    InvalidAttributeSyntax { attribute: String, detail: String },

    /// A distinguished name could not be parsed
    #[error("Invalid DN '{dn}': {detail}")]
    InvalidDnSyntax { dn: String, detail: String },

    /// The server refuses to perform the request
    #[error("Unwilling to perform: {detail}")]
    UnwillingToPerform { detail: String },

    /// Rename of an entry that still has children
    #[error("Cannot rename non-leaf entry '{dn}'")]
    NotAllowedOnNonLeaf { dn: String },

    /// The actor lacks write access to the entry
    #[error("Insufficient access rights on '{dn}'")]
    InsufficientAccessRights { dn: String },

    /// The mutated entry no longer conforms to the schema
    #[error("Schema violation: {detail}")]
    SchemaViolation { detail: String },

    /// The backend reported transient lock contention on every attempt
    #[error("Transaction deadlock persisted after {attempts} attempts")]
    LockDeadlock { attempts: u32 },

    /// The server is in read-only mode
    #[error("Server is read-only")]
    ReadOnly,

    /// A plugin hook rejected the operation
    #[error("Plugin rejected operation at {stage}: {detail}")]
    Plugin { stage: &'static str, detail: String },

    /// The replication log writer failed before commit
    #[error("Replication log error: {detail}")]
    Replication { detail: String },

    /// Errors surfaced by the backend store
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Internal invariant failures
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ModifyError {
    /// Create a no-such-attribute error with detail text.
    pub fn no_such_attribute(attribute: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::NoSuchAttribute {
            attribute: attribute.into(),
            detail: detail.into(),
        }
    }

    /// Create a constraint violation error.
    pub fn constraint(attribute: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::DataConstraintViolation {
            attribute: attribute.into(),
            detail: detail.into(),
        }
    }

    /// Create an unwilling-to-perform error.
    pub fn unwilling(detail: impl Into<String>) -> Self {
        Self::UnwillingToPerform {
            detail: detail.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the transactional controller may retry the operation.
    ///
    /// Only transient backend lock contention is retryable; every other
    /// error is surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(BackendError::Deadlock))
    }

    /// The LDAP result code this error translates to.
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::UndefinedAttributeType { .. } => ResultCode::UndefinedAttributeType,
            Self::ValueAlreadyExists { .. } | Self::DuplicateValue { .. } => {
                ResultCode::AttributeOrValueExists
            }
            Self::NoSuchAttribute { .. } => ResultCode::NoSuchAttribute,
            Self::TooManyValues { .. }
            | Self::SingleValueViolation { .. }
            | Self::DataConstraintViolation { .. } => ResultCode::ConstraintViolation,
            Self::InvalidAttributeSyntax { .. } => ResultCode::InvalidAttributeSyntax,
            Self::InvalidDnSyntax { .. } => ResultCode::InvalidDnSyntax,
            Self::UnwillingToPerform { .. } | Self::ReadOnly => ResultCode::UnwillingToPerform,
            Self::NotAllowedOnNonLeaf { .. } => ResultCode::NotAllowedOnNonLeaf,
            Self::InsufficientAccessRights { .. } => ResultCode::InsufficientAccessRights,
            Self::SchemaViolation { .. } => ResultCode::ObjectClassViolation,
            Self::LockDeadlock { .. } => ResultCode::Busy,
            Self::Plugin { .. } | Self::Replication { .. } | Self::Internal { .. } => {
                ResultCode::OperationsError
            }
            Self::Backend(e) => match e {
                BackendError::Deadlock => ResultCode::Busy,
                BackendError::NoSuchEntry { .. } => ResultCode::NoSuchObject,
                BackendError::DanglingReference { .. } => ResultCode::ConstraintViolation,
                BackendError::Storage { .. } => ResultCode::OperationsError,
            },
        }
    }
}

/// LDAP result codes produced by the modify entry point (RFC 4511 appendix A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Success,
    OperationsError,
    NoSuchAttribute,
    UndefinedAttributeType,
    ConstraintViolation,
    AttributeOrValueExists,
    InvalidAttributeSyntax,
    NoSuchObject,
    InvalidDnSyntax,
    InsufficientAccessRights,
    Busy,
    UnwillingToPerform,
    ObjectClassViolation,
    NotAllowedOnNonLeaf,
}

impl ResultCode {
    /// The numeric wire value of this result code.
    pub fn code(&self) -> u32 {
        match self {
            Self::Success => 0,
            Self::OperationsError => 1,
            Self::NoSuchAttribute => 16,
            Self::UndefinedAttributeType => 17,
            Self::ConstraintViolation => 19,
            Self::AttributeOrValueExists => 20,
            Self::InvalidAttributeSyntax => 21,
            Self::NoSuchObject => 32,
            Self::InvalidDnSyntax => 34,
            Self::InsufficientAccessRights => 50,
            Self::Busy => 51,
            Self::UnwillingToPerform => 53,
            Self::ObjectClassViolation => 65,
            Self::NotAllowedOnNonLeaf => 66,
        }
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// Errors that can occur while loading or building a schema registry.
///
/// These are typically configuration errors and should be caught during
/// server startup rather than per-request.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Schema definition could not be parsed
    #[error("Schema parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Schema file could not be read
    #[error("Schema I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Two attribute definitions share a name
    #[error("Duplicate attribute definition: {name}")]
    DuplicateAttribute { name: String },
}

/// Errors that can occur while building an engine.
///
/// These are typically programming errors and should be caught during
/// development rather than runtime.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Schema loading failed
    #[error("Failed to load schema: {0}")]
    Schema(#[from] SchemaError),
}

// Result type aliases for convenience
pub type ModifyResult<T> = Result<T, ModifyError>;
pub type SchemaResult<T> = Result<T, SchemaError>;
pub type BuildResult<T> = Result<T, BuildError>;
