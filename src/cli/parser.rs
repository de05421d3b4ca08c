//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};

/// repo-context: remote codebase context for MCP clients.
///
/// Serves the `get_codebase_context` tool over stdio or streamable HTTP,
/// or runs a single query from the terminal.
#[derive(Parser, Debug)]
#[command(name = "repo-context")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// API key for the context service.
    #[arg(long, env = "REPO_CONTEXT_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Base URL of the completion endpoint (without `/chat/completions`).
    #[arg(long, env = "REPO_CONTEXT_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Model identifier requested upstream.
    #[arg(long, env = "REPO_CONTEXT_MODEL", global = true)]
    pub model: Option<String>,

    /// Overall timeout for one tool call, in seconds (retries included).
    #[arg(long, env = "REPO_CONTEXT_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Enable debug logging.
    ///
    /// From the environment, `0`, `false`, `no`, `off` and empty disable it;
    /// any other value enables it.
    #[arg(
        short,
        long,
        env = "REPO_CONTEXT_DEBUG",
        global = true,
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub debug: bool,

    /// Output format for terminal commands (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start MCP (Model Context Protocol) server.
    #[cfg(feature = "mcp")]
    #[command(subcommand)]
    Mcp(McpCommands),

    /// Run one query against the context service and print the result.
    ///
    /// Uses the same engine and formatting as the MCP tool.
    #[command(after_help = r#"Examples:
  repo-context query "How is the request pipeline structured?"
  repo-context --timeout 60 query "where are retries configured"
  repo-context --format json query "list the modules" | jq '.sources'
"#)]
    Query {
        /// Question about the codebase.
        query: String,
    },

    /// Show the resolved configuration (the API key is redacted).
    Config,
}

/// MCP server subcommands.
#[cfg(feature = "mcp")]
#[derive(Subcommand, Debug)]
pub enum McpCommands {
    /// Start MCP server with stdio transport.
    ///
    /// Reads JSON-RPC messages from stdin, writes responses to stdout.
    #[command(after_help = r#"Examples:
  repo-context mcp stdio                                # Start stdio MCP server
  REPO_CONTEXT_API_KEY=ctx-... repo-context mcp stdio   # With API key
"#)]
    Stdio,

    /// Start MCP server with streamable HTTP transport.
    ///
    /// Listens for incoming HTTP connections at `/mcp`.
    #[command(alias = "sse")]
    #[command(after_help = r#"Examples:
  repo-context mcp http                            # Listen on 127.0.0.1:3000
  repo-context mcp http --host 0.0.0.0 --port 8080
"#)]
    Http {
        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to.
        #[arg(long, default_value = "3000")]
        port: u16,
    },
}
