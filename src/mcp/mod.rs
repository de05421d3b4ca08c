//! MCP (Model Context Protocol) server for repo-context.
//!
//! Exposes the fetch engine as a single MCP tool so agents can ask a remote
//! codebase-search service questions about a repository.
//!
//! # Feature Gate
//!
//! This module requires the `mcp` feature flag (enabled by default):
//! ```toml
//! [dependencies]
//! repo-context = { version = "...", features = ["mcp"] }
//! ```
//!
//! # Architecture
//!
//! ```text
//! MCP Client (agent)
//!   ↓ get_codebase_context(query)
//! ContextMcpServer
//!   ↓
//! FetchEngine::fetch()  (deadline race, retries, stream reconstruction)
//!   ↓
//! format_response()     (status messages, truncation, sources)
//!   ↓
//! text content block → MCP Client
//! ```

pub mod params;
pub mod server;
pub mod transport;

pub use params::ContextQueryParams;
pub use server::{ContextMcpServer, TOOL_NAME};
pub use transport::{MCP_PATH, http_router, serve_http, serve_http_on, serve_stdio};
