//! # repo-context
//!
//! An MCP server that answers questions about a codebase by forwarding them
//! to a remote, OpenAI-compatible codebase-search service.
//!
//! The heavy lifting lives in [`fetch`]: one tool call becomes a chat
//! completion request raced against an overall deadline, with separate retry
//! budgets for timeouts and other transport failures. Streamed (SSE) bodies
//! are reassembled from whichever content shape the service emits, and the
//! cited source files are pulled out of the answer. [`format`] turns the
//! outcome into the text block handed back to the agent.
//!
//! ## Example
//!
//! ```no_run
//! use repo_context::{ContextConfig, FetchEngine, format_response};
//!
//! # async fn run() -> repo_context::Result<()> {
//! let config = ContextConfig::builder().api_key("ctx-...").build()?;
//! let credential = config.api_key.clone();
//! let engine = FetchEngine::new(config)?;
//! let result = engine.fetch("How is the server wired up?", &credential).await;
//! let text = format_response("How is the server wired up?", &result);
//! # let _ = text;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod format;
#[cfg(feature = "mcp")]
pub mod mcp;

pub use config::{ContextConfig, ContextConfigBuilder};
pub use error::{CommandError, ConfigError, Error, FetchError, Result};
pub use fetch::{CompletionTransport, FetchEngine, FetchResult, HttpTransport, RawResponse};
pub use format::format_response;
#[cfg(feature = "mcp")]
pub use mcp::{ContextMcpServer, serve_http, serve_stdio};
