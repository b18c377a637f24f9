use rmcp::{model::*, ServiceExt};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::ToolError;
use crate::tools::SearchTools;
use crate::AppState;

#[derive(Clone)]
pub struct McpService {
    pub state: Arc<AppState>,
}

impl McpService {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let state = Arc::new(AppState::new(config)?);
        Ok(Self { state })
    }
}

impl rmcp::ServerHandler for McpService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Web search over a third-party search API. Use web_search for a single query, advanced_web_search to filter by site, file type or date, and bulk_web_search for up to 20 queries at once. Requests are rate limited.".to_string(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _page: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let tools = SearchTools::definitions()
            .into_iter()
            .map(|def| {
                let schema = match def.input_schema {
                    serde_json::Value::Object(map) => Arc::new(map),
                    _ => Arc::new(serde_json::Map::new()),
                };
                Tool::new(def.name, def.description, schema)
            })
            .collect();

        Ok(ListToolsResult {
            tools,
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        info!("MCP tool call: {}", request.name);

        let arguments = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));

        match self.state.tools.call(&request.name, &arguments).await {
            Ok(output) => Ok(CallToolResult::success(vec![Content::text(output.text)])),
            Err(ToolError::UnknownTool(name)) => Err(ErrorData::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("Unknown tool: {}", name),
                None,
            )),
            Err(ToolError::Validation(e)) => Err(ErrorData::new(
                ErrorCode::INVALID_PARAMS,
                e.message,
                Some(serde_json::json!({ "field": e.field })),
            )),
            Err(ToolError::RateLimited(e)) => {
                warn!(retry_after_secs = e.retry_after_secs(), "rate limited");
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
            Err(ToolError::Provider(e)) => {
                error!("Search tool error: {}", e);
                Ok(CallToolResult::error(vec![Content::text(format!(
                    "Search failed: {}",
                    e
                ))]))
            }
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    crate::init_tracing();

    let config = Config::from_env()?;
    info!("Starting MCP stdio service");
    info!("Search provider: {}", config.api_url);

    let service = McpService::new(&config)?;
    // Use the stdio transport from rmcp
    let server = service.serve(rmcp::transport::stdio()).await?;
    info!("MCP stdio server running");
    let _quit_reason = server.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::ServerHandler;

    #[test]
    fn advertises_tool_capability() {
        let config = Config::from_lookup(|name| {
            (name == crate::config::API_KEY_VAR).then(|| "0123456789abcdef".to_string())
        })
        .unwrap();
        let service = McpService::new(&config).unwrap();
        let info = service.get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.instructions.unwrap().contains("bulk_web_search"));
    }
}
