//! CLI command implementations.

use crate::cli::output::OutputFormat;
#[cfg(feature = "mcp")]
use crate::cli::parser::McpCommands;
use crate::cli::parser::{Cli, Commands};
use crate::config::ContextConfig;
use crate::error::{CommandError, Result};
use crate::fetch::FetchEngine;
use crate::format::format_response;

/// Executes the CLI command.
///
/// # Returns
///
/// Result with output string on success. Server commands return an empty
/// string once the server stops.
///
/// # Errors
///
/// Returns an error if configuration is incomplete or the command fails.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        #[cfg(feature = "mcp")]
        Commands::Mcp(sub) => cmd_mcp(sub, resolve_config(cli)?),
        Commands::Query { query } => cmd_query(resolve_config(cli)?, query, format),
        Commands::Config => Ok(cmd_config(&resolve_config(cli)?, format)),
    }
}

/// Builds the configuration from CLI flags, then environment, then defaults.
///
/// # Errors
///
/// Returns [`crate::error::ConfigError`] (wrapped) if the API key is missing
/// or a value is out of range.
pub fn resolve_config(cli: &Cli) -> Result<ContextConfig> {
    let mut builder = ContextConfig::builder();
    if let Some(key) = &cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(url) = &cli.base_url {
        builder = builder.base_url(url);
    }
    if let Some(model) = &cli.model {
        builder = builder.model(model);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.tool_timeout(std::time::Duration::from_secs(secs));
    }
    if cli.debug {
        builder = builder.debug(true);
    }
    Ok(builder.from_env().build()?)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

/// Runs one query and renders it like the MCP tool would.
fn cmd_query(config: ContextConfig, query: &str, format: OutputFormat) -> Result<String> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CommandError::ExecutionFailed("query must not be empty".to_string()).into());
    }

    let credential = config.api_key.clone();
    let engine = FetchEngine::new(config)?;
    let result = runtime()?.block_on(engine.fetch(query, &credential));
    let formatted = format_response(query, &result);

    match format {
        OutputFormat::Text => Ok(formatted),
        OutputFormat::Json => Ok(format.to_json(&serde_json::json!({
            "query": query,
            "result": result,
            "formatted": formatted,
        }))),
    }
}

/// Renders the resolved configuration without the credential.
fn cmd_config(config: &ContextConfig, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!(
            "Base URL:            {}\n\
             Model:               {}\n\
             Max tokens:          {}\n\
             Request timeout:     {}s\n\
             Tool timeout:        {}s\n\
             Max retries:         {}\n\
             Max timeout retries: {}\n\
             Debug:               {}",
            config.base_url,
            config.model,
            config.max_tokens,
            config.request_timeout.as_secs(),
            config.tool_timeout.as_secs(),
            config.max_retries,
            config.max_timeout_retries,
            config.debug,
        ),
        OutputFormat::Json => format.to_json(&serde_json::json!({
            "base_url": config.base_url,
            "model": config.model,
            "max_tokens": config.max_tokens,
            "request_timeout_secs": config.request_timeout.as_secs(),
            "tool_timeout_secs": config.tool_timeout.as_secs(),
            "max_retries": config.max_retries,
            "max_timeout_retries": config.max_timeout_retries,
            "debug": config.debug,
        })),
    }
}

/// Starts the MCP server with the specified transport.
///
/// Runs until the client disconnects (stdio) or the server is stopped (HTTP).
#[cfg(feature = "mcp")]
fn cmd_mcp(cmd: &McpCommands, config: ContextConfig) -> Result<String> {
    use std::sync::Arc;

    use tracing::info;

    use crate::mcp::{ContextMcpServer, serve_http, serve_stdio};

    info!(
        base_url = %config.base_url,
        model = %config.model,
        request_timeout_secs = config.request_timeout.as_secs(),
        tool_timeout_secs = config.tool_timeout.as_secs(),
        max_retries = config.max_retries,
        max_timeout_retries = config.max_timeout_retries,
        "starting repo-context MCP server"
    );

    let engine = Arc::new(FetchEngine::new(config)?);

    runtime()?
        .block_on(async {
            match cmd {
                McpCommands::Stdio => serve_stdio(ContextMcpServer::new(engine)).await,
                McpCommands::Http { host, port } => serve_http(engine, host, *port).await,
            }
        })
        .map_err(|e| CommandError::ExecutionFailed(format!("MCP server error: {e}")))?;

    Ok(String::new())
}
