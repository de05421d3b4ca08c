//! Upstream fetch engine.
//!
//! Runs one query against the completion endpoint under two deadlines:
//! each network call is aborted by the transport after
//! [`ContextConfig::request_timeout`], and the whole fetch (every attempt
//! plus backoff) races [`ContextConfig::tool_timeout`]. Failures are retried
//! under [`RetryPolicy`] and always folded into a [`FetchResult`].

use std::sync::Arc;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::http::HttpTransport;
use super::prompt::build_request;
use super::result::FetchResult;
use super::retry::{ErrorClass, RetryDecision, RetryPolicy, RetryState};
use super::stream::{self, ContentShape};
use super::transport::{CompletionTransport, RawResponse};
use crate::config::ContextConfig;
use crate::error::FetchError;

/// Longest prefix of a non-JSON body returned as plain text.
const PLAIN_TEXT_LIMIT: usize = 2000;

/// Resilient upstream fetcher. Immutable; share it behind an [`Arc`].
pub struct FetchEngine {
    transport: Arc<dyn CompletionTransport>,
    config: ContextConfig,
    policy: RetryPolicy,
}

impl FetchEngine {
    /// Creates an engine backed by [`HttpTransport`].
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: ContextConfig) -> Result<Self, FetchError> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Creates an engine over an arbitrary transport.
    #[must_use]
    pub fn with_transport(config: ContextConfig, transport: Arc<dyn CompletionTransport>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::from_config(&config),
            config,
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Fetches an answer for `query`.
    ///
    /// Never fails: HTTP statuses, exhausted retries and the outer deadline
    /// are all reported through the returned [`FetchResult`].
    #[instrument(skip(self, credential), fields(transport = self.transport.name(), query_len = query.len()))]
    pub async fn fetch(&self, query: &str, credential: &str) -> FetchResult {
        let started = Instant::now();
        let deadline = self.config.tool_timeout;

        // Whichever branch loses is dropped, cancelling its timer or request.
        let result = tokio::select! {
            result = self.fetch_with_retries(query, credential) => result,
            () = tokio::time::sleep(deadline) => {
                warn!(deadline_secs = deadline.as_secs(), "fetch exceeded outer deadline");
                FetchResult::deadline_exceeded(deadline)
            }
        };

        info!(
            elapsed_ms = elapsed_ms(started),
            status = result.status_code,
            content_len = result.content.len(),
            source_count = result.sources.len(),
            "fetch complete"
        );
        result
    }

    async fn fetch_with_retries(&self, query: &str, credential: &str) -> FetchResult {
        let request = build_request(&self.config, query);
        let mut state = RetryState::default();
        let mut last_failure: Option<(ErrorClass, FetchError)> = None;

        while state.has_budget(&self.policy) {
            let attempt = state.failures() + 1;
            let started = Instant::now();

            match self.transport.send(&request, credential).await {
                Ok(response) => {
                    info!(
                        attempt,
                        status = response.status,
                        elapsed_ms = elapsed_ms(started),
                        body_len = response.body.len(),
                        "upstream responded"
                    );
                    return self.handle_response(&response);
                }
                Err(err) => {
                    let class = ErrorClass::of(&err);
                    let decision = state.record(class, &self.policy);
                    warn!(
                        attempt,
                        class = ?class,
                        retry_count = state.retry_count,
                        timeout_retry_count = state.timeout_retry_count,
                        elapsed_ms = elapsed_ms(started),
                        error = %err,
                        "upstream attempt failed"
                    );
                    last_failure = Some((class, err));

                    match decision {
                        RetryDecision::Retry(delay) => {
                            debug!(delay_secs = delay.as_secs_f64(), "backing off before retry");
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::Exhausted => break,
                    }
                }
            }
        }

        self.exhausted(&state, last_failure)
    }

    fn exhausted(
        &self,
        state: &RetryState,
        last_failure: Option<(ErrorClass, FetchError)>,
    ) -> FetchResult {
        let attempts = state.failures();
        warn!(
            attempts,
            retry_count = state.retry_count,
            timeout_retry_count = state.timeout_retry_count,
            "retry budget exhausted"
        );
        match last_failure {
            Some((ErrorClass::Timeout, _)) => FetchResult::timed_out(attempts),
            Some((ErrorClass::Generic, err)) => {
                FetchResult::transport_failure(&self.config.service_name, attempts, &err)
            }
            None => FetchResult::transport_failure(
                &self.config.service_name,
                attempts,
                &FetchError::Transport {
                    message: "no attempt was made".to_string(),
                },
            ),
        }
    }

    fn handle_response(&self, response: &RawResponse) -> FetchResult {
        if !response.is_success() {
            warn!(
                status = response.status,
                error = %FetchError::from_status(response.status),
                "upstream rejected request"
            );
            return FetchResult::http_status(response.status);
        }

        if response.is_event_stream() {
            let rebuilt = stream::reconstruct(&response.body);
            info!(
                events = rebuilt.events,
                malformed = rebuilt.malformed,
                content_len = rebuilt.content.len(),
                source_count = rebuilt.sources.len(),
                "reconstructed streamed answer"
            );
            return FetchResult::answer(rebuilt.content, rebuilt.sources);
        }

        decode_completion(&response.body, &self.config.service_name)
    }
}

impl std::fmt::Debug for FetchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchEngine")
            .field("transport", &self.transport.name())
            .field("config", &self.config)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Decodes a non-stream body: a chat completion object, or plain text.
fn decode_completion(body: &str, service: &str) -> FetchResult {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => match ContentShape::Message.extract(&json) {
            Some(content) => {
                let sources = stream::extract_sources(content);
                info!(
                    content_len = content.len(),
                    source_count = sources.len(),
                    "decoded non-stream completion"
                );
                FetchResult::answer(content.to_string(), sources)
            }
            None => {
                warn!("non-stream body is JSON but not a chat completion");
                FetchResult::unexpected_format(service)
            }
        },
        Err(e) => {
            let err = FetchError::Parse {
                message: e.to_string(),
            };
            warn!(error = %err, body_len = body.len(), "falling back to plain-text body");
            FetchResult::answer(body.chars().take(PLAIN_TEXT_LIMIT).collect(), Vec::new())
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::message::ChatRequest;

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    /// Mock transport replaying a script of outcomes, then repeating a
    /// fallback forever. Records the (virtual) instant of every call.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<RawResponse, FetchError>>>,
        fallback: Result<RawResponse, FetchError>,
        calls: AtomicUsize,
        instants: Mutex<Vec<Instant>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        fn new(
            script: Vec<Result<RawResponse, FetchError>>,
            fallback: Result<RawResponse, FetchError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicUsize::new(0),
                instants: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn always(outcome: Result<RawResponse, FetchError>) -> Arc<Self> {
            Self::new(Vec::new(), outcome)
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Whole seconds between consecutive calls.
        fn gaps(&self) -> Vec<u64> {
            let instants = self
                .instants
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            instants
                .windows(2)
                .map(|w| (w[1] - w[0]).as_secs())
                .collect()
        }
    }

    #[async_trait]
    impl CompletionTransport for ScriptedTransport {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn send(
            &self,
            request: &ChatRequest,
            _credential: &str,
        ) -> Result<RawResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.instants
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(Instant::now());
            self.requests
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(request.clone());
            let next = self
                .script
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }

    /// Transport whose call never completes.
    struct HangingTransport;

    #[async_trait]
    impl CompletionTransport for HangingTransport {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn send(
            &self,
            _request: &ChatRequest,
            _credential: &str,
        ) -> Result<RawResponse, FetchError> {
            std::future::pending().await
        }
    }

    fn config() -> ContextConfig {
        ContextConfig::builder()
            .api_key("sk-test")
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    fn sse(body: &str) -> Result<RawResponse, FetchError> {
        Ok(RawResponse {
            status: 200,
            content_type: Some("text/event-stream".to_string()),
            body: body.to_string(),
        })
    }

    fn json_body(body: &str) -> Result<RawResponse, FetchError> {
        Ok(RawResponse {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: body.to_string(),
        })
    }

    fn status(code: u16) -> Result<RawResponse, FetchError> {
        Ok(RawResponse {
            status: code,
            content_type: Some("application/json".to_string()),
            body: r#"{"error":"nope"}"#.to_string(),
        })
    }

    fn timeout() -> Result<RawResponse, FetchError> {
        Err(FetchError::Timeout {
            message: "request aborted after 180s".to_string(),
        })
    }

    fn transport_error() -> Result<RawResponse, FetchError> {
        Err(FetchError::Transport {
            message: "connection reset by peer".to_string(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_streamed_answer_with_sources() {
        let transport = ScriptedTransport::always(sse(concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"The parser lives in src/parse.rs.\\n\\n\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"**Sources:**\\n- `src/parse.rs`\\n\"}}]}\n\n",
            "data: [DONE]\n\n",
        )));
        let engine = FetchEngine::with_transport(config(), transport.clone());

        let result = engine.fetch("find the parser", "sk-test").await;
        assert!(result.is_success());
        assert!(result.content.starts_with("The parser lives in src/parse.rs."));
        assert!(result.content.contains("**Sources:**"));
        assert_eq!(result.sources, vec!["src/parse.rs"]);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_is_shaped_before_sending() {
        let transport = ScriptedTransport::always(sse("data: {\"content\":\"x\"}\n\n"));
        let engine = FetchEngine::with_transport(config(), transport.clone());

        engine.fetch("How is this repo organised?", "sk-test").await;
        engine.fetch("list the parsers", "sk-test").await;

        let requests = transport
            .requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        assert_eq!(
            requests[0].messages[1].content,
            format!(
                "How is this repo organised?{}",
                crate::fetch::prompt::OVERVIEW_SUFFIX
            )
        );
        assert_eq!(requests[1].messages[1].content, "list the parsers");
        assert!(requests.iter().all(|r| r.stream));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_is_not_retried() {
        let transport = ScriptedTransport::always(status(401));
        let engine = FetchEngine::with_transport(config(), transport.clone());

        let result = engine.fetch("q", "bad-key").await;
        assert_eq!(result.status_code, Some(401));
        assert!(result.content.is_empty());
        assert!(result.sources.is_empty());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_status_is_not_retried() {
        let transport = ScriptedTransport::always(status(503));
        let engine = FetchEngine::with_transport(config(), transport.clone());

        let result = engine.fetch("q", "sk-test").await;
        assert_eq!(result.status_code, Some(503));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_timeouts_use_linear_backoff_then_408() {
        let transport = ScriptedTransport::always(timeout());
        let engine = FetchEngine::with_transport(config(), transport.clone());

        let result = engine.fetch("q", "sk-test").await;
        assert_eq!(result.status_code, Some(408));
        assert!(result.content.contains("after 5 attempts"));
        assert_eq!(transport.calls(), 5);

        let gaps = transport.gaps();
        assert_eq!(gaps, vec![1, 2, 3, 4]);
        assert!(gaps.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_transport_errors_use_exponential_backoff_then_500() {
        let transport = ScriptedTransport::always(transport_error());
        let engine = FetchEngine::with_transport(config(), transport.clone());

        let result = engine.fetch("q", "sk-test").await;
        assert_eq!(result.status_code, Some(500));
        assert_eq!(
            result.content,
            "Error communicating with Repo Context API after 3 attempts: transport error: connection reset by peer"
        );
        assert_eq!(transport.calls(), 3);
        assert_eq!(transport.gaps(), vec![2, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budgets_do_not_share_counts() {
        // Two timeouts do not consume the generic budget: three generic
        // failures are still needed to exhaust it.
        let transport = ScriptedTransport::new(
            vec![timeout(), timeout(), transport_error(), transport_error()],
            transport_error(),
        );
        let engine = FetchEngine::with_transport(config(), transport.clone());

        let result = engine.fetch("q", "sk-test").await;
        assert_eq!(result.status_code, Some(500));
        assert!(result.content.contains("after 5 attempts"));
        assert_eq!(transport.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_error() {
        let transport = ScriptedTransport::new(
            vec![transport_error(), timeout()],
            sse("data: {\"content\":\"recovered\"}\n\n"),
        );
        let engine = FetchEngine::with_transport(config(), transport.clone());

        let result = engine.fetch("q", "sk-test").await;
        assert!(result.is_success());
        assert_eq!(result.content, "recovered");
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outer_deadline_wins_over_hanging_call() {
        let config = ContextConfig::builder()
            .api_key("sk-test")
            .tool_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| unreachable!());
        let engine = FetchEngine::with_transport(config, Arc::new(HangingTransport));

        let started = Instant::now();
        let result = engine.fetch("q", "sk-test").await;
        assert_eq!(result.status_code, Some(408));
        assert_eq!(result.content, "Operation timed out after 10 seconds.");
        assert_eq!(started.elapsed().as_secs(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outer_deadline_cuts_backoff_short() {
        let config = ContextConfig::builder()
            .api_key("sk-test")
            .tool_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| unreachable!());
        let transport = ScriptedTransport::always(timeout());
        let engine = FetchEngine::with_transport(config, transport.clone());

        let result = engine.fetch("q", "sk-test").await;
        assert_eq!(result.content, "Operation timed out after 5 seconds.");
        // Calls at t=0, 1s, 3s; the next would be at 6s.
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_stream_completion_body() {
        let transport = ScriptedTransport::always(json_body(
            r#"{"choices":[{"message":{"role":"assistant","content":"Done.\n\nSources:\n- `a.rs`"}}]}"#,
        ));
        let engine = FetchEngine::with_transport(config(), transport);

        let result = engine.fetch("q", "sk-test").await;
        assert!(result.is_success());
        assert!(result.content.starts_with("Done."));
        assert_eq!(result.sources, vec!["a.rs"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_stream_unexpected_shape() {
        let transport = ScriptedTransport::always(json_body(r#"{"result":"??"}"#));
        let engine = FetchEngine::with_transport(config(), transport);

        let result = engine.fetch("q", "sk-test").await;
        assert_eq!(result.status_code, Some(500));
        assert!(result.content.contains("Unexpected response format"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_json_body_falls_back_to_plain_text() {
        let body = "x".repeat(PLAIN_TEXT_LIMIT + 500);
        let transport = ScriptedTransport::always(Ok(RawResponse {
            status: 200,
            content_type: Some("text/plain".to_string()),
            body,
        }));
        let engine = FetchEngine::with_transport(config(), transport);

        let result = engine.fetch("q", "sk-test").await;
        assert!(result.is_success());
        assert_eq!(result.content.chars().count(), PLAIN_TEXT_LIMIT);
        assert!(result.sources.is_empty());
    }

    #[test]
    fn test_decode_completion_plain_text_keeps_short_body() {
        let result = decode_completion("upstream says hi", "svc");
        assert_eq!(result.content, "upstream says hi");
        assert!(result.is_success());
    }
}
