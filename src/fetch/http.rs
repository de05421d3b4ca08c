//! `reqwest`-backed transport for OpenAI-compatible completion endpoints.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};

use super::message::ChatRequest;
use super::transport::{CompletionTransport, RawResponse};
use crate::config::ContextConfig;
use crate::error::FetchError;

/// HTTP transport posting to `<base_url>/chat/completions`.
///
/// Every exchange (connect, headers and the full body read) runs under a
/// hard wall-clock limit; when it elapses the in-flight request is dropped
/// and [`FetchError::Timeout`] is returned.
pub struct HttpTransport {
    client: Client,
    url: String,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport from the service configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the HTTP client cannot be built
    /// (e.g. the TLS backend fails to initialise).
    pub fn new(config: &ContextConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Transport {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            url: config.completions_url(),
            request_timeout: config.request_timeout,
        })
    }

    async fn exchange(
        &self,
        request: &ChatRequest,
        credential: &str,
    ) -> Result<RawResponse, FetchError> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(credential)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), body_len = body.len(), "upstream returned error status");
            return Ok(RawResponse {
                status: status.as_u16(),
                content_type,
                body,
            });
        }

        let mut buffer = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            buffer.extend_from_slice(&chunk?);
        }

        Ok(RawResponse {
            status: status.as_u16(),
            content_type,
            body: String::from_utf8_lossy(&buffer).into_owned(),
        })
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("url", &self.url)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    #[instrument(skip_all, fields(url = %self.url))]
    async fn send(
        &self,
        request: &ChatRequest,
        credential: &str,
    ) -> Result<RawResponse, FetchError> {
        match tokio::time::timeout(self.request_timeout, self.exchange(request, credential)).await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                message: format!(
                    "request aborted after {}s",
                    self.request_timeout.as_secs_f64()
                ),
            }),
        }
    }
}
