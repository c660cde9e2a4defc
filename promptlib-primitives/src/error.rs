//! Shared error definitions for library primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the prompt library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing or validating primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided prompt identifier could not be parsed.
    #[error("invalid prompt id: {source}")]
    InvalidPromptId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// A string identifier failed validation.
    #[error("invalid {kind} id `{id}`: {reason}")]
    InvalidId {
        /// Kind of identifier (`role`, `template`, ...).
        kind: &'static str,
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Required fields were left empty.
    #[error("{entity} is missing required fields: {}", fields.join(", "))]
    MissingFields {
        /// Entity being validated.
        entity: &'static str,
        /// Display names of the missing fields, in form order.
        fields: Vec<&'static str>,
    },

    /// Generic validation failure.
    #[error("invalid {entity}: {reason}")]
    Invalid {
        /// Entity being validated.
        entity: &'static str,
        /// Human-readable reason for rejection.
        reason: String,
    },
}

impl Error {
    /// Convenience constructor for generic validation failures.
    #[must_use]
    pub fn invalid(entity: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            entity,
            reason: reason.into(),
        }
    }
}
