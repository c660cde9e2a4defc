//! Enhancement client: validation, rate limiting, and backend dispatch.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use promptlib_compose::sanitize_input;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::mistral::{MistralBackend, MistralConfig};
use crate::openai::{OpenAiBackend, OpenAiConfig};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::traits::{EnhanceError, EnhanceRequest, EnhanceResult, EnhancementBackend};

/// Largest accepted input, in characters.
pub const MAX_CONTENT_LENGTH: usize = 100_000;

/// Remote service used for enhancement.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// `OpenAI`-compatible endpoint.
    #[default]
    OpenAi,
    /// Mistral endpoint.
    Mistral,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenAi => "openai",
            Self::Mistral => "mistral",
        })
    }
}

impl FromStr for Provider {
    type Err = EnhanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "mistral" => Ok(Self::Mistral),
            other => Err(EnhanceError::configuration(format!(
                "unknown enhancement provider `{other}`"
            ))),
        }
    }
}

/// Builds the backend for `provider` from the matching configuration.
///
/// # Errors
///
/// Propagates configuration errors from the selected backend.
pub fn build_backend(
    provider: Provider,
    openai: OpenAiConfig,
    mistral: MistralConfig,
) -> EnhanceResult<Arc<dyn EnhancementBackend>> {
    Ok(match provider {
        Provider::OpenAi => Arc::new(OpenAiBackend::new(openai)?),
        Provider::Mistral => Arc::new(MistralBackend::new(mistral)?),
    })
}

/// Client that guards a backend with input checks and a rate limiter.
pub struct Enhancer {
    backend: Arc<dyn EnhancementBackend>,
    limiter: RateLimiter,
    sanitize: bool,
}

impl fmt::Debug for Enhancer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enhancer")
            .field("backend", self.backend.metadata())
            .field("limiter", &self.limiter.config())
            .field("sanitize", &self.sanitize)
            .finish()
    }
}

impl Enhancer {
    /// Wraps a backend with the default 60 calls per minute limit.
    #[must_use]
    pub fn new(backend: Arc<dyn EnhancementBackend>) -> Self {
        Self {
            backend,
            limiter: RateLimiter::default(),
            sanitize: false,
        }
    }

    /// Replaces the rate limit.
    #[must_use]
    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.limiter = RateLimiter::new(config);
        self
    }

    /// Runs `sanitize_input` on the content before sending it.
    #[must_use]
    pub fn with_sanitize(mut self, sanitize: bool) -> Self {
        self.sanitize = sanitize;
        self
    }

    /// Returns the wrapped backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn EnhancementBackend> {
        &self.backend
    }

    /// Sends `content` to the backend and returns the rewritten text.
    ///
    /// # Errors
    ///
    /// - [`EnhanceError::EmptyContent`] / [`EnhanceError::ContentTooLong`]
    ///   before any network activity.
    /// - [`EnhanceError::RateLimited`] when the window is full.
    /// - Backend errors (`Timeout`, `RequestFailed`, `InvalidResponse`, ...).
    pub async fn enhance(&self, content: &str, techniques: &[String]) -> EnhanceResult<String> {
        if content.trim().is_empty() {
            return Err(EnhanceError::EmptyContent);
        }
        let length = content.chars().count();
        if length > MAX_CONTENT_LENGTH {
            return Err(EnhanceError::ContentTooLong {
                length,
                max: MAX_CONTENT_LENGTH,
            });
        }

        let text = if self.sanitize {
            sanitize_input(content)
        } else {
            content.to_owned()
        };
        if text.trim().is_empty() {
            return Err(EnhanceError::EmptyContent);
        }

        if let Err(exceeded) = self.limiter.check().await {
            warn!(
                retry_after_secs = exceeded.wait_seconds(),
                "enhancement rate limited"
            );
            return Err(exceeded.into());
        }

        let metadata = self.backend.metadata();
        debug!(provider = metadata.provider(), model = metadata.model(), length, "enhancing prompt");
        let request = EnhanceRequest::new(text).with_techniques(techniques.to_vec());
        let enhanced = self.backend.complete(&request).await?;
        info!(provider = metadata.provider(), "prompt enhanced");
        Ok(enhanced)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::traits::BackendMetadata;

    struct Recording {
        seen: Mutex<Vec<EnhanceRequest>>,
        metadata: BackendMetadata,
    }

    impl Recording {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                metadata: BackendMetadata::new("recording", "echo"),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl EnhancementBackend for Recording {
        fn metadata(&self) -> &BackendMetadata {
            &self.metadata
        }

        async fn complete(&self, request: &EnhanceRequest) -> EnhanceResult<String> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(format!("enhanced: {}", request.content()))
        }
    }

    #[tokio::test]
    async fn oversized_content_never_reaches_backend() {
        let backend = Recording::new();
        let enhancer = Enhancer::new(backend.clone());

        let err = enhancer
            .enhance(&"a".repeat(MAX_CONTENT_LENGTH + 1), &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EnhanceError::ContentTooLong {
                length: 100_001,
                max: 100_000
            }
        ));
        assert_eq!(backend.calls(), 0);

        let text = enhancer
            .enhance(&"a".repeat(MAX_CONTENT_LENGTH), &[])
            .await
            .unwrap();
        assert!(text.starts_with("enhanced: "));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let backend = Recording::new();
        let enhancer = Enhancer::new(backend.clone());
        let err = enhancer.enhance("  \n", &[]).await.unwrap_err();
        assert!(matches!(err, EnhanceError::EmptyContent));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn full_window_fails_without_calling_backend() {
        let backend = Recording::new();
        let enhancer = Enhancer::new(backend.clone())
            .with_rate_limit(RateLimitConfig::new(2, Duration::from_secs(60)));

        enhancer.enhance("one", &[]).await.unwrap();
        enhancer.enhance("two", &[]).await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;

        let err = enhancer.enhance("three", &[]).await.unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(40)));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn markup_only_input_does_not_use_a_slot() {
        let backend = Recording::new();
        let enhancer = Enhancer::new(backend.clone())
            .with_sanitize(true)
            .with_rate_limit(RateLimitConfig::new(1, Duration::from_secs(60)));

        for input in ["<b></b>", "; | &"] {
            let err = enhancer.enhance(input, &[]).await.unwrap_err();
            assert!(matches!(err, EnhanceError::EmptyContent));
        }

        enhancer.enhance("Explain lifetimes", &[]).await.unwrap();
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn sanitize_and_techniques_are_forwarded() {
        let backend = Recording::new();
        let enhancer = Enhancer::new(backend.clone()).with_sanitize(true);

        enhancer
            .enhance("<b>Explain</b>   joins; please", &["Few-shot".to_owned()])
            .await
            .unwrap();

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].content(), "Explain joins please");
        assert_eq!(seen[0].techniques(), ["Few-shot".to_owned()]);
    }

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("Mistral".parse::<Provider>().unwrap(), Provider::Mistral);
        assert_eq!(" openai ".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert!("claude".parse::<Provider>().is_err());
    }

    #[test]
    fn build_backend_selects_provider() {
        let backend = build_backend(
            Provider::Mistral,
            OpenAiConfig::default(),
            MistralConfig::default().with_api_key("test_key"),
        )
        .unwrap();
        assert_eq!(backend.metadata().provider(), "mistral");

        let result =
            build_backend(Provider::OpenAi, OpenAiConfig::default(), MistralConfig::default());
        assert!(matches!(result, Err(EnhanceError::Configuration { .. })));
    }
}
