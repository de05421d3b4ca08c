//! Service configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.
//! It is built once at process entry and handed to the engine and server
//! constructors; nothing below this module reads the environment.

use std::time::Duration;

use crate::error::ConfigError;

/// Default upstream base URL (the `/chat/completions` path is appended).
pub const DEFAULT_BASE_URL: &str = "https://api.repo-context.dev/v1";
/// Default model identifier requested upstream.
pub const DEFAULT_MODEL: &str = "context-large";
/// Display name used in synthesized failure messages.
pub const DEFAULT_SERVICE_NAME: &str = "Repo Context API";
/// Output token cap for upstream completions.
const DEFAULT_MAX_TOKENS: u32 = 1000;
/// Hard abort for a single network call, in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 180;
/// Outer deadline for a whole fetch-with-retries, in seconds.
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 300;
/// Default retry budget for transport errors.
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default retry budget for timeouts. Load-induced timeouts are expected,
/// so this is larger than [`DEFAULT_MAX_RETRIES`].
const DEFAULT_MAX_TIMEOUT_RETRIES: u32 = 5;

/// Resolved configuration for the fetch engine and MCP server.
#[derive(Clone)]
pub struct ContextConfig {
    /// Bearer credential for the upstream API.
    pub api_key: String,
    /// Upstream base URL without a trailing slash.
    pub base_url: String,
    /// Model identifier sent in every request.
    pub model: String,
    /// Output token cap.
    pub max_tokens: u32,
    /// Wall-clock abort for one network call.
    pub request_timeout: Duration,
    /// Outer deadline for one fetch including all retries.
    pub tool_timeout: Duration,
    /// Retry budget for generic (transport) errors.
    pub max_retries: u32,
    /// Retry budget for timeout errors.
    pub max_timeout_retries: u32,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Human-readable upstream name used in error messages.
    pub service_name: String,
    /// Verbose diagnostics.
    pub debug: bool,
}

impl std::fmt::Debug for ContextConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .field("tool_timeout", &self.tool_timeout)
            .field("max_retries", &self.max_retries)
            .field("max_timeout_retries", &self.max_timeout_retries)
            .field("user_agent", &self.user_agent)
            .field("service_name", &self.service_name)
            .field("debug", &self.debug)
            .finish()
    }
}

impl ContextConfig {
    /// Creates a new builder for `ContextConfig`.
    #[must_use]
    pub fn builder() -> ContextConfigBuilder {
        ContextConfigBuilder::default()
    }

    /// Full URL of the chat completions endpoint.
    #[must_use]
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Builder for [`ContextConfig`].
#[derive(Debug, Clone, Default)]
pub struct ContextConfigBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    request_timeout: Option<Duration>,
    tool_timeout: Option<Duration>,
    max_retries: Option<u32>,
    max_timeout_retries: Option<u32>,
    user_agent: Option<String>,
    service_name: Option<String>,
    debug: Option<bool>,
}

impl ContextConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = std::env::var("REPO_CONTEXT_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("REPO_CONTEXT_BASE_URL").ok();
        }
        if self.model.is_none() {
            self.model = std::env::var("REPO_CONTEXT_MODEL").ok();
        }
        if self.tool_timeout.is_none() {
            self.tool_timeout = std::env::var("REPO_CONTEXT_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs);
        }
        if self.debug.is_none() {
            self.debug = std::env::var("REPO_CONTEXT_DEBUG")
                .ok()
                .map(|v| parse_flag(&v));
        }
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the output token cap.
    #[must_use]
    pub const fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Sets the per-call network timeout.
    #[must_use]
    pub const fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Sets the outer deadline for a whole fetch.
    #[must_use]
    pub const fn tool_timeout(mut self, duration: Duration) -> Self {
        self.tool_timeout = Some(duration);
        self
    }

    /// Sets the generic retry budget.
    #[must_use]
    pub const fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Sets the timeout retry budget.
    #[must_use]
    pub const fn max_timeout_retries(mut self, n: u32) -> Self {
        self.max_timeout_retries = Some(n);
        self
    }

    /// Sets the `User-Agent` header.
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Sets the upstream display name.
    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Enables or disables debug diagnostics.
    #[must_use]
    pub const fn debug(mut self, enabled: bool) -> Self {
        self.debug = Some(enabled);
        self
    }

    /// Builds the [`ContextConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ApiKeyMissing`] if no API key was set, or
    /// [`ConfigError::Invalid`] for a zero timeout or retry budget.
    pub fn build(self) -> Result<ContextConfig, ConfigError> {
        let api_key = self.api_key.ok_or(ConfigError::ApiKeyMissing)?;

        let tool_timeout = self
            .tool_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS));
        if tool_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "tool_timeout",
                message: "must be greater than zero".to_string(),
            });
        }

        let request_timeout = self
            .request_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
        if request_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "request_timeout",
                message: "must be greater than zero".to_string(),
            });
        }

        let max_retries = self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        let max_timeout_retries = self
            .max_timeout_retries
            .unwrap_or(DEFAULT_MAX_TIMEOUT_RETRIES);
        if max_retries == 0 || max_timeout_retries == 0 {
            return Err(ConfigError::Invalid {
                field: "max_retries",
                message: "retry budgets must allow at least one attempt".to_string(),
            });
        }

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(ContextConfig {
            api_key,
            base_url,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            request_timeout,
            tool_timeout,
            max_retries,
            max_timeout_retries,
            user_agent: self
                .user_agent
                .unwrap_or_else(|| format!("repo-context/{}", env!("CARGO_PKG_VERSION"))),
            service_name: self
                .service_name
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            debug: self.debug.unwrap_or(false),
        })
    }
}

/// Any value other than empty, `0`, `n`, `no`, `f`, `false` or `off` (any
/// case) enables the flag. Matches how the CLI reads the same variable.
fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "n" | "no" | "f" | "false" | "off"
    )
}
