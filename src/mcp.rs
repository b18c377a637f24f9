use crate::error::ToolError;
use crate::tools::SearchTools;
use crate::types::{ErrorResponse, RateLimitInfo};
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub use crate::tools::ToolDefinition as McpTool;

#[derive(Debug, Serialize, Deserialize)]
pub struct McpToolsResponse {
    pub tools: Vec<McpTool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpCallResponse {
    pub content: Vec<McpContent>,
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl McpContent {
    fn text(text: String) -> Vec<Self> {
        vec![Self {
            content_type: "text".to_string(),
            text,
        }]
    }
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/health/provider", get(provider_health))
        .route("/mcp/tools", get(list_tools))
        .route("/mcp/call", post(call_tool))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Spends one provider request.
pub async fn provider_health(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let orchestrator = state.tools.orchestrator();
    let healthy = orchestrator.health_check().await;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(serde_json::json!({
            "provider": orchestrator.backend_name(),
            "healthy": healthy
        })),
    )
}

pub async fn list_tools() -> Json<McpToolsResponse> {
    Json(McpToolsResponse {
        tools: SearchTools::definitions(),
    })
}

pub async fn call_tool(
    State(state): State<Arc<AppState>>,
    Json(request): Json<McpCallRequest>,
) -> Result<Json<McpCallResponse>, HandlerError> {
    let request_id = uuid::Uuid::new_v4();
    info!(%request_id, tool = %request.name, "MCP tool call");

    match state.tools.call(&request.name, &request.arguments).await {
        Ok(output) => Ok(Json(McpCallResponse {
            content: McpContent::text(output.text),
            is_error: false,
            structured_content: Some(output.data),
            rate_limit: output.rate_limit,
        })),
        Err(ToolError::Provider(e)) => {
            error!(%request_id, error = %e, "search tool error");
            Ok(Json(McpCallResponse {
                content: McpContent::text(format!("Search failed: {}", e)),
                is_error: true,
                structured_content: serde_json::to_value(&e).ok(),
                rate_limit: None,
            }))
        }
        Err(ToolError::RateLimited(e)) => {
            warn!(%request_id, retry_after_secs = e.retry_after_secs(), "rate limited");
            Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorResponse {
                    error: e.to_string(),
                    field: None,
                    retry_after_secs: Some(e.retry_after_secs()),
                }),
            ))
        }
        Err(ToolError::Validation(e)) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.message,
                field: Some(e.field),
                retry_after_secs: None,
            }),
        )),
        Err(e @ ToolError::UnknownTool(_)) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
                field: None,
                retry_after_secs: None,
            }),
        )),
    }
}
