//! MCP server implementation for repo-context.
//!
//! Exposes the fetch engine as the `get_codebase_context` tool. Every call
//! produces a text payload: upstream failures are rendered by the formatter
//! and flagged with `is_error`, never raised as protocol errors.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use tracing::info;

use crate::fetch::FetchEngine;
use crate::format::format_response;

use super::params::ContextQueryParams;

/// Name of the single tool this server exposes.
pub const TOOL_NAME: &str = "get_codebase_context";

/// repo-context MCP server.
#[derive(Clone)]
pub struct ContextMcpServer {
    tool_router: ToolRouter<Self>,
    engine: Arc<FetchEngine>,
}

#[tool_router]
impl ContextMcpServer {
    /// Ask the remote codebase-search service a question.
    #[tool(
        name = "get_codebase_context",
        description = "Retrieve grounded context about the codebase for a natural-language question. Returns an answer synthesized from the indexed repository, followed by the source files it cites. Ask about architecture, where functionality lives, or how components interact."
    )]
    async fn get_codebase_context(
        &self,
        Parameters(params): Parameters<ContextQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let query = params.query.trim();
        if query.is_empty() {
            return Err(McpError::invalid_params("query must not be empty", None));
        }

        info!(tool = TOOL_NAME, query_len = query.len(), "tool invoked");
        let credential = &self.engine.config().api_key;
        let result = self.engine.fetch(query, credential).await;
        let text = format_response(query, &result);

        if result.is_success() {
            Ok(CallToolResult::success(vec![Content::text(text)]))
        } else {
            Ok(CallToolResult::error(vec![Content::text(text)]))
        }
    }
}

#[tool_handler]
impl ServerHandler for ContextMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "repo-context".to_string(),
                title: Some("Repo Context MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Repo Context: answers questions about a codebase using a remote search \
                 service. Call `get_codebase_context` with a natural-language query; the \
                 response includes the answer and the files it cites."
                    .to_string(),
            ),
        }
    }
}

impl ContextMcpServer {
    /// Creates a new MCP server around a shared engine.
    #[must_use]
    pub fn new(engine: Arc<FetchEngine>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            engine,
        }
    }

    /// Returns the shared engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<FetchEngine> {
        &self.engine
    }
}
