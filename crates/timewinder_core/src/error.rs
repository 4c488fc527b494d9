//! Core error types for timewinder.
//!
//! Every variant is a usage error: a mismatch between what the caller
//! mounted or stored and what it later asked for. None of them are retried.

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A mount with this name already exists
    #[error("Mount already exists: {name}")]
    DuplicateMount { name: String },

    /// No mount with this name
    #[error("No mount named {name}")]
    UnknownMount { name: String },

    /// A mounted entity has no entry in the snapshot being restored
    #[error("Snapshot {hash} has no state for mount {name}")]
    MissingMount { name: String, hash: String },

    /// Hash not present in the content store
    #[error("Unknown state hash: {hash}")]
    UnknownHash { hash: String },

    /// A nondeterministic choice was found where a flat value is required
    #[error("Value at {path} is not flat")]
    NotFlat { path: String },

    /// A field or local variable does not exist
    #[error("{owner} has no field {field}")]
    FieldNotFound { owner: String, field: String },

    /// A value had a different kind than expected
    #[error("Type mismatch at {path}: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// List access past the end
    #[error("Index {index} out of bounds for {path} (len {len})")]
    IndexOutOfBounds { path: String, index: usize, len: usize },

    /// A mount is not of the requested concrete type
    #[error("Mount {name} is not a {expected}")]
    WrongModelType { name: String, expected: &'static str },

    /// Capacity exceeded
    #[error("Capacity exceeded for {resource}: {limit}")]
    CapacityExceeded { resource: String, limit: usize },

    /// Canonical encoding failed
    #[error("Encoding failed: {reason}")]
    Encoding { reason: String },
}

impl From<postcard::Error> for CoreError {
    fn from(err: postcard::Error) -> Self {
        Self::Encoding {
            reason: err.to_string(),
        }
    }
}
