//! Pluggable transport for the upstream completion call.
//!
//! The engine owns retry, deadline and reconstruction policy; a transport
//! only performs one exchange and reports what came back. This keeps the
//! engine testable without a network.

use async_trait::async_trait;

use super::message::ChatRequest;
use crate::error::FetchError;

/// A fully buffered upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// Response body. Empty for non-success statuses whose body was not read.
    pub body: String,
}

impl RawResponse {
    /// True for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// True when the upstream answered with server-sent events.
    #[must_use]
    pub fn is_event_stream(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/event-stream"))
    }
}

/// Trait for upstream transports.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Transport name used in logs (e.g., `"http"`).
    fn name(&self) -> &'static str;

    /// Performs one request/response exchange.
    ///
    /// Non-success HTTP statuses are returned as `Ok`; only failures to
    /// complete the exchange are errors.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Timeout`] when the call was aborted by its
    /// wall-clock limit and [`FetchError::Transport`] for connection or
    /// body-read failures.
    async fn send(&self, request: &ChatRequest, credential: &str)
    -> Result<RawResponse, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, content_type: Option<&str>) -> RawResponse {
        RawResponse {
            status,
            content_type: content_type.map(str::to_string),
            body: String::new(),
        }
    }

    #[test]
    fn test_is_success() {
        assert!(response(200, None).is_success());
        assert!(response(204, None).is_success());
        assert!(!response(301, None).is_success());
        assert!(!response(401, None).is_success());
    }

    #[test]
    fn test_is_event_stream() {
        assert!(response(200, Some("text/event-stream")).is_event_stream());
        assert!(response(200, Some("Text/Event-Stream; charset=utf-8")).is_event_stream());
        assert!(!response(200, Some("application/json")).is_event_stream());
        assert!(!response(200, None).is_event_stream());
    }
}
