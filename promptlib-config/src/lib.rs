//! Configuration for the prompt library.
//!
//! [`LibraryConfig`] can be read from a JSON file, from environment
//! variables, or both (file first, then [`LibraryConfig::apply_env`]).
//! Secrets are never embedded; API keys and credentials always come from
//! one of those sources.

#![warn(missing_docs, clippy::pedantic)]

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use promptlib_adapters::mistral::{MISTRAL_API_KEY_ENV, MISTRAL_MODEL_ENV};
use promptlib_adapters::openai::{OPENAI_API_KEY_ENV, OPENAI_BASE_URL_ENV, OPENAI_MODEL_ENV};
use promptlib_adapters::{
    EnhanceError, Enhancer, MistralConfig, OpenAiConfig, Provider, RateLimitConfig,
    build_backend,
};
use promptlib_kernel::StaticAuthenticator;
use promptlib_primitives::UserRole;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Selects the enhancement provider.
pub const PROVIDER_ENV: &str = "PROMPTLIB_PROVIDER";
/// Directory holding the persisted documents.
pub const DATA_DIR_ENV: &str = "PROMPTLIB_DATA_DIR";
/// Login credentials, `name:password:role` entries separated by `,`.
pub const USERS_ENV: &str = "PROMPTLIB_USERS";
/// Enables input sanitisation before enhancement (`true`/`false`).
pub const SANITIZE_ENV: &str = "PROMPTLIB_SANITIZE";

const DEFAULT_DATA_DIR: &str = ".promptlib";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Source error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid JSON for [`LibraryConfig`].
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// An environment variable holds an unusable value.
    #[error("invalid value for {name}: {reason}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// What was wrong.
        reason: String,
    },
    /// The enhancement backend rejected the settings.
    #[error(transparent)]
    Enhance(#[from] EnhanceError),
}

impl ConfigError {
    fn invalid_env(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidEnv {
            name,
            reason: reason.into(),
        }
    }
}

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// `OpenAI`-compatible backend settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OpenAiSettings {
    /// API key.
    pub api_key: Option<String>,
    /// Base URL override.
    pub base_url: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: promptlib_adapters::openai::DEFAULT_OPENAI_MODEL.to_owned(),
            timeout_secs: promptlib_adapters::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("has_api_key", &self.api_key.is_some())
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Mistral backend settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MistralSettings {
    /// API key.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for MistralSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: promptlib_adapters::mistral::DEFAULT_MISTRAL_MODEL.to_owned(),
            timeout_secs: promptlib_adapters::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl fmt::Debug for MistralSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MistralSettings")
            .field("has_api_key", &self.api_key.is_some())
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Sliding-window limit for enhancement calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RateLimitSettings {
    /// Calls allowed per window.
    pub max_requests: usize,
    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: promptlib_adapters::rate_limit::DEFAULT_MAX_REQUESTS,
            window_ms: 60_000,
        }
    }
}

impl From<RateLimitSettings> for RateLimitConfig {
    fn from(value: RateLimitSettings) -> Self {
        Self::new(value.max_requests, Duration::from_millis(value.window_ms))
    }
}

/// One login accepted by the [`StaticAuthenticator`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredential {
    /// Login name.
    pub username: String,
    /// Password.
    pub password: String,
    /// Access level.
    pub role: UserRole,
}

impl fmt::Debug for UserCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCredential")
            .field("username", &self.username)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl UserCredential {
    /// Parses `name:password:role`. The password may contain `:`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] for malformed entries.
    pub fn parse(entry: &str) -> ConfigResult<Self> {
        let malformed = || ConfigError::invalid_env(USERS_ENV, "expected name:password:role");
        let (username, rest) = entry.trim().split_once(':').ok_or_else(malformed)?;
        let (password, role) = rest.rsplit_once(':').ok_or_else(malformed)?;
        if username.trim().is_empty() || password.is_empty() {
            return Err(malformed());
        }
        let role = role
            .parse::<UserRole>()
            .map_err(|err| ConfigError::invalid_env(USERS_ENV, err.to_string()))?;
        Ok(Self {
            username: username.trim().to_owned(),
            password: password.to_owned(),
            role,
        })
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LibraryConfig {
    /// Enhancement provider.
    pub provider: Provider,
    /// `OpenAI` settings.
    pub openai: OpenAiSettings,
    /// Mistral settings.
    pub mistral: MistralSettings,
    /// Directory for persisted documents.
    pub data_dir: PathBuf,
    /// Accepted logins.
    pub users: Vec<UserCredential>,
    /// Enhancement rate limit.
    pub rate_limit: RateLimitSettings,
    /// Whether to sanitise text before enhancement.
    pub sanitize_input: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            openai: OpenAiSettings::default(),
            mistral: MistralSettings::default(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            users: Vec::new(),
            rate_limit: RateLimitSettings::default(),
            sanitize_input: false,
        }
    }
}

impl LibraryConfig {
    /// Loads defaults overlaid with the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] for malformed variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::default().apply_env(|name| std::env::var(name).ok())
    }

    /// Reads a JSON configuration file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "configuration file loaded");
        Ok(config)
    }

    /// Overlays variables returned by `lookup` on top of `self`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] for malformed variables.
    pub fn apply_env<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(provider) = get(PROVIDER_ENV) {
            self.provider = provider
                .parse()
                .map_err(|err: EnhanceError| ConfigError::invalid_env(PROVIDER_ENV, err.to_string()))?;
        }
        if let Some(key) = get(OPENAI_API_KEY_ENV) {
            self.openai.api_key = Some(key);
        }
        if let Some(url) = get(OPENAI_BASE_URL_ENV) {
            self.openai.base_url = Some(url);
        }
        if let Some(model) = get(OPENAI_MODEL_ENV) {
            self.openai.model = model;
        }
        if let Some(key) = get(MISTRAL_API_KEY_ENV) {
            self.mistral.api_key = Some(key);
        }
        if let Some(model) = get(MISTRAL_MODEL_ENV) {
            self.mistral.model = model;
        }
        if let Some(dir) = get(DATA_DIR_ENV) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(users) = get(USERS_ENV) {
            self.users = users
                .split(',')
                .filter(|entry| !entry.trim().is_empty())
                .map(UserCredential::parse)
                .collect::<ConfigResult<_>>()?;
        }
        if let Some(flag) = get(SANITIZE_ENV) {
            self.sanitize_input = flag.trim().parse().map_err(|_| {
                ConfigError::invalid_env(SANITIZE_ENV, format!("expected true or false, got `{flag}`"))
            })?;
        }
        debug!(provider = %self.provider, users = self.users.len(), "environment applied");
        Ok(self)
    }

    /// Sets the provider.
    #[must_use]
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Sets the `OpenAI` API key.
    #[must_use]
    pub fn with_openai_key(mut self, key: impl Into<String>) -> Self {
        self.openai.api_key = Some(key.into());
        self
    }

    /// Sets the Mistral API key.
    #[must_use]
    pub fn with_mistral_key(mut self, key: impl Into<String>) -> Self {
        self.mistral.api_key = Some(key.into());
        self
    }

    /// Adds a login.
    #[must_use]
    pub fn with_user(mut self, credential: UserCredential) -> Self {
        self.users.push(credential);
        self
    }

    /// Sets the rate limit.
    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: RateLimitSettings) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Enables or disables sanitisation.
    #[must_use]
    pub fn with_sanitize_input(mut self, sanitize: bool) -> Self {
        self.sanitize_input = sanitize;
        self
    }

    /// Builds the `OpenAI` adapter configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Enhance`] for an invalid base URL.
    pub fn openai_config(&self) -> ConfigResult<OpenAiConfig> {
        let mut config = OpenAiConfig::new(self.openai.model.clone())
            .with_timeout(Duration::from_secs(self.openai.timeout_secs));
        if let Some(key) = &self.openai.api_key {
            config = config.with_api_key(key.clone());
        }
        if let Some(url) = &self.openai.base_url {
            config = config.with_base_url(url)?;
        }
        Ok(config)
    }

    /// Builds the Mistral adapter configuration.
    #[must_use]
    pub fn mistral_config(&self) -> MistralConfig {
        let mut config = MistralConfig::new(self.mistral.model.clone())
            .with_timeout(Duration::from_secs(self.mistral.timeout_secs));
        if let Some(key) = &self.mistral.api_key {
            config = config.with_api_key(key.clone());
        }
        config
    }

    /// Builds the enhancement client for the selected provider.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Enhance`] when the selected provider lacks an
    /// API key or has an invalid base URL.
    pub fn build_enhancer(&self) -> ConfigResult<Enhancer> {
        let backend = build_backend(self.provider, self.openai_config()?, self.mistral_config())?;
        Ok(Enhancer::new(backend)
            .with_rate_limit(self.rate_limit.into())
            .with_sanitize(self.sanitize_input))
    }

    /// Builds the credential check from the configured users.
    #[must_use]
    pub fn authenticator(&self) -> StaticAuthenticator {
        self.users
            .iter()
            .fold(StaticAuthenticator::new(), |auth, user| {
                auth.with_user(user.username.clone(), user.password.clone(), user.role)
            })
    }
}
