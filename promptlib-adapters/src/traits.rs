//! Shared enhancement backend traits and data structures.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used by enhancement backends.
pub type EnhanceResult<T> = Result<T, EnhanceError>;

/// Error type shared by the enhancement client and its backends.
#[derive(Debug, Error)]
pub enum EnhanceError {
    /// The content to enhance was empty.
    #[error("content to enhance is empty")]
    EmptyContent,

    /// The content exceeded the accepted length.
    #[error("content exceeds maximum length of {max} characters (got {length})")]
    ContentTooLong {
        /// Length of the rejected content in characters.
        length: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// The local rate limiter rejected the call.
    #[error("rate limit exceeded, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Whole seconds until a slot frees up.
        retry_after_secs: u64,
    },

    /// Backend is misconfigured or missing credentials.
    #[error("enhancement backend not configured: {reason}")]
    Configuration {
        /// Additional context for the failure.
        reason: String,
    },

    /// Transport-level failures (connect, protocol, body read).
    #[error("enhancement transport error: {reason}")]
    Transport {
        /// Additional context about the error.
        reason: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("enhancement request timed out after {after:?}")]
    Timeout {
        /// Timeout that elapsed.
        after: Duration,
    },

    /// The provider answered with a non-success status.
    #[error("enhancement request failed with status {status}: {reason}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Response body or status text.
        reason: String,
    },

    /// The provider returned a body without usable content.
    #[error("invalid enhancement response: {reason}")]
    InvalidResponse {
        /// Additional context about the response failure.
        reason: String,
    },
}

impl EnhanceError {
    /// Convenience constructor for configuration issues.
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for transport failures.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for malformed responses.
    #[must_use]
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Returns the suggested wait for rate-limit errors.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(Duration::from_secs(*retry_after_secs)),
            _ => None,
        }
    }
}

/// Metadata describing a backend instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendMetadata {
    provider: &'static str,
    model: String,
}

impl BackendMetadata {
    /// Creates metadata for the supplied provider and model identifier.
    #[must_use]
    pub fn new(provider: &'static str, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Returns the provider identifier (e.g., "openai").
    #[must_use]
    pub const fn provider(&self) -> &'static str {
        self.provider
    }

    /// Returns the configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Roles supported in chat-style requests.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System messages steer the assistant behaviour.
    System,
    /// User-authored content.
    User,
    /// Assistant (model) responses.
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        })
    }
}

/// One message of a chat completion request.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
    role: MessageRole,
    content: String,
}

impl ChatMessage {
    /// Creates a new message.
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Returns the message role.
    #[must_use]
    pub const fn role(&self) -> MessageRole {
        self.role
    }

    /// Returns the message content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Text submitted for enhancement plus the techniques the user selected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnhanceRequest {
    content: String,
    techniques: Vec<String>,
}

impl EnhanceRequest {
    /// Creates a request for the supplied content.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            techniques: Vec::new(),
        }
    }

    /// Sets the techniques to mention in the instruction.
    #[must_use]
    pub fn with_techniques(mut self, techniques: Vec<String>) -> Self {
        self.techniques = techniques;
        self
    }

    /// Returns the content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the selected techniques.
    #[must_use]
    pub fn techniques(&self) -> &[String] {
        &self.techniques
    }

    /// Returns the instruction naming the requested techniques, if any.
    #[must_use]
    pub fn technique_instruction(&self) -> Option<String> {
        let techniques: Vec<&str> = self
            .techniques
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if techniques.is_empty() {
            return None;
        }
        Some(format!(
            "Improve the prompt while applying these techniques: {}.",
            techniques.join(", ")
        ))
    }
}

/// Trait implemented by all enhancement backends.
#[async_trait]
pub trait EnhancementBackend: Send + Sync {
    /// Returns basic metadata describing the backend instance.
    fn metadata(&self) -> &BackendMetadata;

    /// Sends one chat completion and returns the first choice's text.
    async fn complete(&self, request: &EnhanceRequest) -> EnhanceResult<String>;
}
