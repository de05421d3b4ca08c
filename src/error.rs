//! Error types for repo-context.
//!
//! [`FetchError`] is the taxonomy the fetch engine classifies upstream
//! failures into. It never escapes [`crate::fetch::FetchEngine::fetch`];
//! every variant is folded into a [`crate::fetch::FetchResult`] before the
//! tool boundary. The remaining types cover configuration and the CLI.

use thiserror::Error;

/// Result alias used by the CLI and server layers.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Upstream fetch failure that escaped the engine (client construction).
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure while writing command output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors raised while building [`crate::config::ContextConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No API credential was supplied on the command line or in the environment.
    #[error("API key not set. Pass --api-key or set REPO_CONTEXT_API_KEY")]
    ApiKeyMissing,

    /// A configured value is out of range.
    #[error("invalid configuration for {field}: {message}")]
    Invalid {
        /// Offending field name.
        field: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

/// Upstream failure taxonomy.
///
/// Status-derived variants (`Auth`, `Quota`, `HttpStatus`) are terminal.
/// `Timeout` and `Transport` are retried by the engine; `Parse` is always
/// recovered locally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Credential rejected (401 or 403).
    #[error("authentication failed (HTTP {status})")]
    Auth {
        /// HTTP status returned by the upstream.
        status: u16,
    },

    /// Usage quota exhausted (402).
    #[error("quota exceeded (HTTP 402)")]
    Quota,

    /// Any other non-success HTTP status.
    #[error("HTTP error {status}")]
    HttpStatus {
        /// HTTP status returned by the upstream.
        status: u16,
    },

    /// The network call was aborted or a deadline elapsed.
    #[error("request timed out: {message}")]
    Timeout {
        /// Description of the timeout condition.
        message: String,
    },

    /// Connection, TLS or body-read failure.
    #[error("transport error: {message}")]
    Transport {
        /// Underlying error message.
        message: String,
    },

    /// Malformed JSON in an otherwise successful response.
    #[error("parse error: {message}")]
    Parse {
        /// Underlying error message.
        message: String,
    },
}

impl FetchError {
    /// Maps a non-success HTTP status onto the terminal variants.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth { status },
            402 => Self::Quota,
            _ => Self::HttpStatus { status },
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                message: err.to_string(),
            }
        } else if err.is_decode() {
            Self::Parse {
                message: err.to_string(),
            }
        } else {
            Self::Transport {
                message: err.to_string(),
            }
        }
    }
}

/// CLI command errors.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Command execution failed.
    #[error("command failed: {0}")]
    ExecutionFailed(String),
}
