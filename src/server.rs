//! MCP server initialization for stdio and Streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that wire up the
//! capsule store, recall engine, and MCP tool handler into a running server.

use crate::tools::CapsuleTools;
use anyhow::{Context, Result};
use capsules::config::CapsulesConfig;
use rmcp::ServiceExt;
use std::sync::Arc;

/// Shared setup: open the store, load the repo registry, build the engines.
fn setup_tools(config: CapsulesConfig) -> Result<CapsuleTools> {
    let root = config.resolved_root();
    std::fs::create_dir_all(config.sessions_dir())
        .with_context(|| format!("failed to create {}", config.sessions_dir().display()))?;
    tracing::info!(root = %root.display(), "capsule store ready");

    let store = config.open_store();
    let recall = config.recall_engine()?;
    let similarity = Arc::new(config.similarity_checker());
    Ok(CapsuleTools::new(store, recall, similarity, Arc::new(config)))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: CapsulesConfig) -> Result<()> {
    tracing::info!("starting capsules MCP server on stdio");

    let tools = setup_tools(config)?;
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP transport.
pub async fn serve_http(config: CapsulesConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %bind_addr, "starting capsules MCP server on HTTP");

    let tools = setup_tools(config)?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(tools.clone()),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
