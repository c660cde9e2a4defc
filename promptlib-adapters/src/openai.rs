//! `OpenAI`-compatible chat-completion backend.

use std::{env, fmt, time::Duration};

use async_trait::async_trait;
use hyper::Uri;

use crate::http_client::{
    ChatCompletionRequest, ChatEndpoint, HyperClient, build_https_client, chat_endpoint,
    post_chat_completion, sanitize_base_url,
};
use crate::traits::{
    BackendMetadata, ChatMessage, EnhanceError, EnhanceRequest, EnhanceResult, EnhancementBackend,
    MessageRole,
};
use crate::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT};

/// Environment variable holding the API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable overriding the base URL.
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
/// Environment variable overriding the model.
pub const OPENAI_MODEL_ENV: &str = "OPENAI_MODEL";

/// Default model identifier.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1/";
const PROVIDER: &str = "OpenAI";

/// Configuration for the `OpenAI` backend.
#[derive(Clone)]
pub struct OpenAiConfig {
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
    max_tokens: u32,
    temperature: f32,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl OpenAiConfig {
    /// Creates a configuration using the supplied model identifier.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            model: model.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Loads key, base URL, and model from `OPENAI_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`EnhanceError::Configuration`] if `OPENAI_BASE_URL` is invalid.
    pub fn from_env() -> EnhanceResult<Self> {
        let model = env::var(OPENAI_MODEL_ENV).unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_owned());
        let mut cfg = Self::new(model);
        cfg.api_key = env::var(OPENAI_API_KEY_ENV).ok();
        match env::var(OPENAI_BASE_URL_ENV) {
            Ok(base) => cfg.with_base_url(base),
            Err(_) => Ok(cfg),
        }
    }

    /// Overrides the base URL used for API calls.
    ///
    /// # Errors
    ///
    /// Returns [`EnhanceError::Configuration`] if the supplied URL is invalid.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> EnhanceResult<Self> {
        self.base_url = sanitize_base_url(PROVIDER, base_url.as_ref())?;
        Ok(self)
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Supplies an explicit API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the completion token budget.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Overrides the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Returns the configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_OPENAI_MODEL)
    }
}

/// Backend posting to `{base_url}chat/completions`.
pub struct OpenAiBackend {
    client: HyperClient,
    endpoint: Uri,
    metadata: BackendMetadata,
    api_key: String,
    timeout: Duration,
    max_tokens: u32,
    temperature: f32,
}

impl fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("model", &self.metadata.model())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OpenAiBackend {
    /// Constructs a backend with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EnhanceError::Configuration`] if the API key is missing or
    /// blank.
    pub fn new(config: OpenAiConfig) -> EnhanceResult<Self> {
        let api_key = config
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| EnhanceError::configuration("OpenAI backend requires an API key"))?;

        Ok(Self {
            client: build_https_client()?,
            endpoint: chat_endpoint(PROVIDER, &config.base_url)?,
            metadata: BackendMetadata::new("openai", config.model),
            api_key,
            timeout: config.timeout,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn build_request(&self, request: &EnhanceRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(instruction) = request.technique_instruction() {
            messages.push(ChatMessage::new(MessageRole::System, instruction));
        }
        messages.push(ChatMessage::new(MessageRole::User, request.content()));

        ChatCompletionRequest {
            model: self.metadata.model().to_owned(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl EnhancementBackend for OpenAiBackend {
    fn metadata(&self) -> &BackendMetadata {
        &self.metadata
    }

    async fn complete(&self, request: &EnhanceRequest) -> EnhanceResult<String> {
        let payload = self.build_request(request);
        let target = ChatEndpoint {
            client: &self.client,
            provider: PROVIDER,
            endpoint: &self.endpoint,
            api_key: &self.api_key,
            timeout: self.timeout,
        };
        post_chat_completion(&target, &payload).await
    }
}
