//! Upstream fetch engine for remote codebase context.
//!
//! Calls an OpenAI-compatible completion endpoint with streaming enabled and
//! turns whatever comes back into a [`FetchResult`]. Transport failures are
//! retried under separate budgets for timeouts and everything else; HTTP
//! error statuses are returned immediately.
//!
//! # Architecture
//!
//! ```text
//! fetch(query, credential)
//!   ├── race: outer deadline (tool_timeout)
//!   └── retry loop (RetryState)
//!         ├── build_request → shape_query
//!         ├── CompletionTransport::send  (per-call abort: request_timeout)
//!         └── response
//!               ├── non-2xx        → FetchResult { status_code }
//!               ├── event-stream   → stream::reconstruct → sources
//!               └── other          → JSON completion, or plain-text prefix
//! ```

pub mod engine;
pub mod http;
pub mod message;
pub mod prompt;
pub mod result;
pub mod retry;
pub mod stream;
pub mod transport;

pub use engine::FetchEngine;
pub use http::HttpTransport;
pub use message::{ChatMessage, ChatRequest, Role};
pub use result::FetchResult;
pub use retry::{ErrorClass, RetryDecision, RetryPolicy, RetryState};
pub use transport::{CompletionTransport, RawResponse};
