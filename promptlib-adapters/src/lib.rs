//! Prompt enhancement against remote chat-completion services.
//!
//! [`Enhancer`] validates input, applies a sliding-window [`RateLimiter`],
//! and forwards the text to an [`EnhancementBackend`]. Two backends ship with
//! the crate: [`OpenAiBackend`] for `OpenAI`-compatible endpoints and
//! [`MistralBackend`].

#![warn(missing_docs, clippy::pedantic)]

use std::time::Duration;

pub mod enhancer;
pub mod mistral;
pub mod openai;
pub mod rate_limit;
pub mod traits;

mod http_client;
#[cfg(test)]
mod test_server;

pub use enhancer::{Enhancer, MAX_CONTENT_LENGTH, Provider, build_backend};
pub use mistral::{MistralBackend, MistralConfig};
pub use openai::{OpenAiBackend, OpenAiConfig};
pub use rate_limit::{KeyedRateLimiter, RateLimitConfig, RateLimitExceeded, RateLimiter};
pub use traits::{
    BackendMetadata, ChatMessage, EnhanceError, EnhanceRequest, EnhanceResult, EnhancementBackend,
    MessageRole,
};

/// Completion token budget sent with every request.
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Sampling temperature sent with every request.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Upper bound on one enhancement HTTP exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
