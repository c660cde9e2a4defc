//! Error type of the application store.

use promptlib_adapters::EnhanceError;
use promptlib_primitives::{PromptId, RoleId, TagId};
use promptlib_store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the application store.
#[derive(Debug, Error)]
pub enum AppError {
    /// A persistent store rejected the operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Entity validation failed before reaching a store.
    #[error(transparent)]
    Validation(#[from] promptlib_primitives::Error),

    /// The enhancement client failed.
    #[error(transparent)]
    Enhance(#[from] EnhanceError),

    /// Session state could not be encoded or decoded.
    #[error("failed to encode session: {0}")]
    Session(#[from] serde_json::Error),

    /// A template referenced a role that does not exist.
    #[error("role `{id}` does not exist")]
    UnknownRole {
        /// Referenced role identifier.
        id: RoleId,
    },

    /// No prompt with the supplied identifier.
    #[error("prompt `{id}` not found")]
    PromptNotFound {
        /// Missing prompt identifier.
        id: PromptId,
    },

    /// No version with the supplied identifier belongs to the prompt.
    #[error("version `{version}` not found for prompt `{prompt}`")]
    VersionNotFound {
        /// Prompt identifier.
        prompt: PromptId,
        /// Missing version identifier.
        version: Uuid,
    },

    /// A tag with the same identifier or name already exists.
    #[error("tag `{name}` already exists")]
    DuplicateTag {
        /// Conflicting tag name.
        name: String,
    },

    /// A tag referenced a parent that does not exist.
    #[error("tag `{id}` does not exist")]
    UnknownTag {
        /// Referenced tag identifier.
        id: TagId,
    },

    /// Composition (and enhancement) produced no text.
    #[error("prompt content is empty")]
    EmptyPrompt,

    /// Enhancement was requested but no client is configured.
    #[error("no enhancement backend configured")]
    EnhancementUnavailable,

    /// The operation needs a logged-in user.
    #[error("user not authenticated")]
    NotAuthenticated,
}

/// Result alias for application store operations.
pub type AppResult<T> = Result<T, AppError>;
