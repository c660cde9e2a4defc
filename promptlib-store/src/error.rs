//! Error types for the persistent stores.

use serde_json::Error as SerdeError;
use thiserror::Error;

/// Errors emitted by the role and template stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure while reading or writing a document.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// Serialization or deserialization error.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: SerdeError,
    },
    /// A record failed field validation.
    #[error(transparent)]
    Validation(#[from] promptlib_primitives::Error),
    /// Another role already uses the name.
    #[error("role with name \"{name}\" already exists")]
    DuplicateRoleName {
        /// Name that collided.
        name: String,
    },
    /// A record with the requested id already exists.
    #[error("{kind} with id \"{id}\" already exists")]
    DuplicateId {
        /// Record kind (`role` or `template`).
        kind: &'static str,
        /// Colliding identifier.
        id: String,
    },
    /// No record with the requested id exists.
    #[error("{kind} with id \"{id}\" not found")]
    NotFound {
        /// Record kind (`role` or `template`).
        kind: &'static str,
        /// Missing identifier.
        id: String,
    },
    /// Built-in roles can be edited but not removed.
    #[error("built-in role \"{id}\" cannot be deleted")]
    BuiltinRole {
        /// Identifier of the built-in role.
        id: String,
    },
}

impl StoreError {
    /// Helper to construct not-found errors.
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Returns `true` when the error reports a missing record.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
