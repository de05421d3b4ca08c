//! Normalized engine output.

use std::time::Duration;

use serde::Serialize;

use crate::error::FetchError;

/// Outcome of one fetch, handed to the response formatter.
///
/// A real answer never carries a status code. Upstream status failures carry
/// an empty `content`; synthesized failures (timeouts, exhausted retries,
/// unexpected bodies) carry both an explanatory `content` and a status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchResult {
    /// Answer text, or a synthesized failure description.
    pub content: String,
    /// Citation identifiers in first-seen order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    /// HTTP status for failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl FetchResult {
    /// A successful answer.
    #[must_use]
    pub const fn answer(content: String, sources: Vec<String>) -> Self {
        Self {
            content,
            sources,
            status_code: None,
        }
    }

    /// A non-success upstream status.
    #[must_use]
    pub const fn http_status(status: u16) -> Self {
        Self {
            content: String::new(),
            sources: Vec::new(),
            status_code: Some(status),
        }
    }

    /// The timeout budget ran out.
    #[must_use]
    pub fn timed_out(attempts: u32) -> Self {
        Self {
            content: format!(
                "Request timed out after {attempts} attempts. The service may be under heavy \
                 load; try again shortly or narrow the query."
            ),
            sources: Vec::new(),
            status_code: Some(408),
        }
    }

    /// The generic retry budget ran out.
    #[must_use]
    pub fn transport_failure(service: &str, attempts: u32, last_error: &FetchError) -> Self {
        Self {
            content: format!(
                "Error communicating with {service} after {attempts} attempts: {last_error}"
            ),
            sources: Vec::new(),
            status_code: Some(500),
        }
    }

    /// The outer deadline elapsed before the fetch finished.
    #[must_use]
    pub fn deadline_exceeded(deadline: Duration) -> Self {
        Self {
            content: format!(
                "Operation timed out after {} seconds.",
                deadline.as_secs()
            ),
            sources: Vec::new(),
            status_code: Some(408),
        }
    }

    /// A successful non-stream body that was JSON of the wrong shape.
    #[must_use]
    pub fn unexpected_format(service: &str) -> Self {
        Self {
            content: format!("Unexpected response format from {service}."),
            sources: Vec::new(),
            status_code: Some(500),
        }
    }

    /// True when this is a real answer.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code.is_none()
    }
}
