//! Mistral chat-completion backend.
//!
//! Mistral requests carry a fixed system prompt asking the model to restate
//! the text in the RACE format with a best-practice list.

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
pub const MISTRAL_API_KEY_ENV: &str = "MISTRAL_API_KEY";
/// Environment variable overriding the model.
pub const MISTRAL_MODEL_ENV: &str = "MISTRAL_MODEL";

/// Default model identifier.
pub const DEFAULT_MISTRAL_MODEL: &str = "mistral-medium";
const DEFAULT_MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1/";
const PROVIDER: &str = "Mistral";

/// System prompt sent ahead of the user's text.
pub const RACE_SYSTEM_PROMPT: &str = "Convert the following prompt into the RACE format with Best Practices:

Role: [Role - Who should perform this task]
Action: [Action - What needs to be done]
Context: [Context - Background information and requirements]
Execute: [Execution - Step by step instructions]
Best Practices:
- [Best Practice 1]
- [Best Practice 2]
- [Best Practice 3]";

/// Configuration for the Mistral backend.
#[derive(Clone)]
pub struct MistralConfig {
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl fmt::Debug for MistralConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MistralConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl MistralConfig {
    /// Creates a configuration using the supplied model identifier.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            model: model.into(),
            base_url: DEFAULT_MISTRAL_BASE_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Loads key and model from `MISTRAL_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let model =
            env::var(MISTRAL_MODEL_ENV).unwrap_or_else(|_| DEFAULT_MISTRAL_MODEL.to_owned());
        let mut cfg = Self::new(model);
        cfg.api_key = env::var(MISTRAL_API_KEY_ENV).ok();
        cfg
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
}

impl Default for MistralConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MISTRAL_MODEL)
    }
}

/// Backend posting to the Mistral chat-completions endpoint.
pub struct MistralBackend {
    client: HyperClient,
    endpoint: Uri,
    metadata: BackendMetadata,
    api_key: String,
    timeout: Duration,
}

impl fmt::Debug for MistralBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MistralBackend")
            .field("model", &self.metadata.model())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl MistralBackend {
    /// Constructs a backend with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EnhanceError::Configuration`] if the API key is missing or
    /// blank.
    pub fn new(config: MistralConfig) -> EnhanceResult<Self> {
        let api_key = config
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| EnhanceError::configuration("Mistral backend requires an API key"))?;

        Ok(Self {
            client: build_https_client()?,
            endpoint: chat_endpoint(PROVIDER, &config.base_url)?,
            metadata: BackendMetadata::new("mistral", config.model),
            api_key,
            timeout: config.timeout,
        })
    }

    fn build_request(&self, request: &EnhanceRequest) -> ChatCompletionRequest {
        let system = match request.technique_instruction() {
            Some(instruction) => format!("{RACE_SYSTEM_PROMPT}\n\n{instruction}"),
            None => RACE_SYSTEM_PROMPT.to_owned(),
        };

        ChatCompletionRequest {
            model: self.metadata.model().to_owned(),
            messages: vec![
                ChatMessage::new(MessageRole::System, system),
                ChatMessage::new(MessageRole::User, request.content()),
            ],
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[async_trait]
impl EnhancementBackend for MistralBackend {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{CannedResponse, spawn_server};

    fn backend() -> MistralBackend {
        MistralBackend::new(MistralConfig::default().with_api_key("test_key")).unwrap()
    }

    #[test]
    fn missing_key_is_configuration_error() {
        let err = MistralBackend::new(MistralConfig::default()).unwrap_err();
        assert!(matches!(err, EnhanceError::Configuration { .. }));
    }

    #[test]
    fn system_prompt_leads_the_conversation() {
        let chat = backend().build_request(&EnhanceRequest::new("write tests"));
        assert_eq!(chat.model, DEFAULT_MISTRAL_MODEL);
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].role(), MessageRole::System);
        assert_eq!(chat.messages[0].content(), RACE_SYSTEM_PROMPT);
        assert_eq!(chat.messages[1].content(), "write tests");
    }

    #[test]
    fn techniques_extend_system_prompt() {
        let chat = backend().build_request(
            &EnhanceRequest::new("write tests").with_techniques(vec!["Role prompting".into()]),
        );
        assert!(chat.messages[0].content().starts_with(RACE_SYSTEM_PROMPT));
        assert!(chat.messages[0].content().ends_with("techniques: Role prompting."));
    }

    #[tokio::test]
    async fn success_without_content_is_invalid_response() {
        let server = spawn_server(CannedResponse::ok(r#"{"choices":[]}"#)).await;
        let config = MistralConfig::default()
            .with_api_key("test_key")
            .with_base_url(server.base_url())
            .unwrap();
        let backend = MistralBackend::new(config).unwrap();

        let err = backend.complete(&EnhanceRequest::new("draft")).await.unwrap_err();
        assert!(matches!(err, EnhanceError::InvalidResponse { .. }));
    }
}
