//! CLI layer for repo-context.
//!
//! Provides the command-line interface using clap: MCP server startup plus
//! one-shot `query` and `config` commands for use from a terminal.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::{execute, resolve_config};
pub use output::OutputFormat;
#[cfg(feature = "mcp")]
pub use parser::McpCommands;
pub use parser::{Cli, Commands};
