use std::sync::Arc;
use tracing::{info, warn};

use websearch_mcp::{config::Config, mcp, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    websearch_mcp::init_tracing();

    // Missing or implausible credentials stop the server before any tool call.
    let config = Config::from_env()?;

    info!("Starting MCP Server");
    info!("Search provider: {}", config.api_url);

    let state = Arc::new(AppState::new(&config)?);

    let limiter = state.tools.limiter();
    info!(
        max_requests = limiter.capacity(),
        window_ms = limiter.window().as_millis() as u64,
        "rate limit configured"
    );

    if !state.tools.orchestrator().health_check().await {
        warn!("Search provider health check failed; tool calls may fail");
    }

    let app = mcp::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("MCP Server listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
