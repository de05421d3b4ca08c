//! MCP transport layer for stdio and streamable HTTP.
//!
//! Both transports share one [`FetchEngine`]; HTTP sessions each get a
//! lightweight [`ContextMcpServer`] handle over it.

use std::future::Future;
use std::sync::Arc;

use rmcp::ServiceExt;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::server::{ContextMcpServer, TOOL_NAME};
use crate::fetch::FetchEngine;

/// Path the streamable HTTP endpoint is mounted at.
pub const MCP_PATH: &str = "/mcp";

/// Starts the MCP server with stdio transport.
///
/// The server reads JSON-RPC messages from stdin and writes responses to stdout.
///
/// # Errors
///
/// Returns an error if the server fails to start or encounters a runtime error.
pub async fn serve_stdio(server: ContextMcpServer) -> anyhow::Result<()> {
    info!(
        transport = "stdio",
        tool = TOOL_NAME,
        tool_timeout_secs = server.engine().config().tool_timeout.as_secs(),
        "MCP server starting"
    );
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}

/// Builds the axum router serving MCP at [`MCP_PATH`].
///
/// Sessions are cancelled when `ct` is.
pub fn http_router(engine: Arc<FetchEngine>, ct: CancellationToken) -> axum::Router {
    let service = StreamableHttpService::new(
        move || Ok(ContextMcpServer::new(Arc::clone(&engine))),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            cancellation_token: ct,
            ..Default::default()
        },
    );
    axum::Router::new().nest_service(MCP_PATH, service)
}

/// Starts the MCP server with streamable HTTP transport.
///
/// Listens on the given host and port until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the server fails to bind or encounters a runtime error.
pub async fn serve_http(engine: Arc<FetchEngine>, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    serve_http_on(engine, listener, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    })
    .await
}

/// Serves MCP over an already bound listener until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the listener address cannot be read or serving fails.
pub async fn serve_http_on<F>(
    engine: Arc<FetchEngine>,
    listener: TcpListener,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let tool_timeout_secs = engine.config().tool_timeout.as_secs();
    let ct = CancellationToken::new();
    let router = http_router(engine, ct.child_token());
    let addr = listener.local_addr()?;

    info!(
        transport = "http",
        url = %format!("http://{addr}{MCP_PATH}"),
        tool = TOOL_NAME,
        tool_timeout_secs,
        "MCP server listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.await;
            ct.cancel();
        })
        .await?;

    Ok(())
}
