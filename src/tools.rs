//! Tool dispatch shared by the HTTP and stdio transports.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ToolError, ValidationError};
use crate::orchestrator::SearchOrchestrator;
use crate::rate_limiter::RateLimiter;
use crate::sanitize::sanitize_query;
use crate::types::{BulkSearchResult, DateRange, FileType, RateLimitInfo, WebSearchResult};
use crate::validation::{
    validate_bulk, validate_search, MAX_BULK_QUERIES, MAX_QUERY_LENGTH, MAX_RESULTS_LIMIT,
    MAX_RESULTS_PER_QUERY_LIMIT,
};

pub const WEB_SEARCH: &str = "web_search";
pub const ADVANCED_WEB_SEARCH: &str = "advanced_web_search";
pub const BULK_WEB_SEARCH: &str = "bulk_web_search";

const SNIPPET_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Rendered tool output plus the structured data it was rendered from.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub text: String,
    pub data: Value,
    pub rate_limit: Option<RateLimitInfo>,
}

#[derive(Clone)]
pub struct SearchTools {
    orchestrator: Arc<SearchOrchestrator>,
    limiter: Arc<RateLimiter>,
}

impl SearchTools {
    pub fn new(orchestrator: Arc<SearchOrchestrator>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            orchestrator,
            limiter,
        }
    }

    pub fn orchestrator(&self) -> &SearchOrchestrator {
        &self.orchestrator
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn definitions() -> Vec<ToolDefinition> {
        let region = json!({
            "type": "string",
            "description": "Two-letter country code for localized results (default: us)",
            "pattern": "^[a-zA-Z]{2}$",
            "default": "us"
        });
        let safe_search = json!({
            "type": "boolean",
            "description": "Filter explicit results (default: true)",
            "default": true
        });
        let query = json!({
            "type": "string",
            "description": "The search query. Supports operators such as site: and -exclude",
            "minLength": 1,
            "maxLength": MAX_QUERY_LENGTH
        });

        vec![
            ToolDefinition {
                name: WEB_SEARCH.to_string(),
                description: "Search the web. Returns ranked results with titles, URLs and snippets.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": query.clone(),
                        "max_results": {
                            "type": "integer",
                            "description": "Number of results to return (default: 10)",
                            "minimum": 1,
                            "maximum": MAX_RESULTS_LIMIT,
                            "default": 10
                        },
                        "region": region.clone(),
                        "safe_search": safe_search.clone()
                    },
                    "required": ["query"]
                }),
            },
            ToolDefinition {
                name: ADVANCED_WEB_SEARCH.to_string(),
                description: "Search the web with filters: restrict to a site, a file type, or a recent date range.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": query.clone(),
                        "max_results": {
                            "type": "integer",
                            "description": "Number of results to return (default: 10)",
                            "minimum": 1,
                            "maximum": MAX_RESULTS_LIMIT,
                            "default": 10
                        },
                        "region": region.clone(),
                        "safe_search": safe_search.clone(),
                        "site_restrict": {
                            "type": "string",
                            "description": "Only return results from this domain (e.g. docs.rs)"
                        },
                        "file_type": {
                            "type": "string",
                            "description": "Only return documents of this type",
                            "enum": FileType::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>()
                        },
                        "date_range": {
                            "type": "string",
                            "description": "Only return results published within this range",
                            "enum": DateRange::ALL.iter().map(|r| r.as_str()).collect::<Vec<_>>()
                        }
                    },
                    "required": ["query"]
                }),
            },
            ToolDefinition {
                name: BULK_WEB_SEARCH.to_string(),
                description: "Run several web searches in one call. Queries execute in order and a failing query does not abort the batch.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "queries": {
                            "type": "array",
                            "items": query.clone(),
                            "minItems": 1,
                            "maxItems": MAX_BULK_QUERIES
                        },
                        "max_results_per_query": {
                            "type": "integer",
                            "description": "Number of results per query (default: 10)",
                            "minimum": 1,
                            "maximum": MAX_RESULTS_PER_QUERY_LIMIT,
                            "default": 10
                        },
                        "region": region.clone(),
                        "safe_search": safe_search.clone()
                    },
                    "required": ["queries"]
                }),
            },
        ]
    }

    /// Validate, admit and run one tool call. Validation and admission both
    /// happen before any provider traffic.
    pub async fn call(&self, name: &str, arguments: &Value) -> Result<ToolOutput, ToolError> {
        info!(tool = name, "tool call");
        match name {
            WEB_SEARCH | ADVANCED_WEB_SEARCH => {
                let mut params = validate_search(arguments)?;
                params.query = sanitized(&params.query, "query")?;
                if let Some(site) = params.site_restrict.take() {
                    params.site_restrict = Some(sanitized_site(&site)?);
                }

                self.limiter.try_acquire()?;

                let response = if name == WEB_SEARCH {
                    self.orchestrator.search(&params).await?
                } else {
                    self.orchestrator.advanced_search(&params).await?
                };
                Ok(ToolOutput {
                    text: render_web_results(&response.data),
                    data: structured(&response.data),
                    rate_limit: response.rate_limit,
                })
            }
            BULK_WEB_SEARCH => {
                let mut params = validate_bulk(arguments)?;
                params.queries = params
                    .queries
                    .iter()
                    .enumerate()
                    .map(|(i, q)| sanitized(q, &format!("queries[{}]", i)))
                    .collect::<Result<Vec<_>, ValidationError>>()?;

                self.limiter.try_acquire_many(params.queries.len())?;

                let response = self.orchestrator.bulk_search(&params).await?;
                Ok(ToolOutput {
                    text: render_bulk_results(&response.data),
                    data: structured(&response.data),
                    rate_limit: response.rate_limit,
                })
            }
            _ => Err(ToolError::UnknownTool(name.to_string())),
        }
    }
}

fn sanitized(query: &str, field: &str) -> Result<String, ValidationError> {
    let cleaned = sanitize_query(query);
    if cleaned.is_empty() {
        return Err(ValidationError::new(
            field,
            format!("{} contains no searchable text", field),
        ));
    }
    Ok(cleaned)
}

// The site is spliced into the provider query after `site:`, so it must stay
// a single token.
fn sanitized_site(site: &str) -> Result<String, ValidationError> {
    let cleaned = sanitized(site, "site_restrict")?;
    if cleaned.contains(' ') {
        return Err(ValidationError::new(
            "site_restrict",
            "site_restrict must be a single domain without spaces",
        ));
    }
    Ok(cleaned)
}

fn structured<T: Serialize>(data: &T) -> Value {
    serde_json::to_value(data).unwrap_or_else(|e| {
        warn!(error = %e, "failed to serialize tool result");
        Value::Null
    })
}

pub fn render_web_results(result: &WebSearchResult) -> String {
    if result.results.is_empty() {
        return format!("No search results found for query: {}", result.query);
    }
    let mut text = format!(
        "Found {} search results for '{}' (showing {}):\n\n",
        result.total_results,
        result.query,
        result.results.len()
    );
    for item in &result.results {
        text.push_str(&format!(
            "{}. **{}**\n   URL: {}\n   Snippet: {}\n",
            item.position,
            item.title,
            item.url,
            item.snippet.chars().take(SNIPPET_PREVIEW_CHARS).collect::<String>()
        ));
        if let Some(date) = &item.date {
            text.push_str(&format!("   Date: {}\n", date));
        }
        text.push('\n');
    }
    text
}

pub fn render_bulk_results(batch: &BulkSearchResult) -> String {
    let mut text = format!(
        "Bulk search completed: {}/{} queries succeeded\n\n",
        batch.successful_queries, batch.total_queries
    );
    for (i, entry) in batch.results.iter().enumerate() {
        text.push_str(&format!("## {}. {}\n", i + 1, entry.query));
        if let Some(error) = &entry.error {
            text.push_str(&format!("Search failed: {}\n\n", error));
            continue;
        }
        if entry.results.is_empty() {
            text.push_str("No results\n\n");
            continue;
        }
        for item in &entry.results {
            text.push_str(&format!("{}. **{}**\n   URL: {}\n", item.position, item.title, item.url));
        }
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::search::{ProviderQuery, SearchBackend};
    use crate::types::{ApiOutcome, ApiResponse, ProviderResponse, ProviderResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingBackend {
        calls: AtomicUsize,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SearchBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        async fn fetch(&self, query: &ProviderQuery) -> ApiOutcome<ProviderResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.q.clone());
            if query.q.contains("fail") {
                return Err(ApiError::new("quota exhausted").with_status(429));
            }
            Ok(ApiResponse::new(ProviderResponse {
                organic_results: vec![ProviderResult {
                    title: "Result".to_string(),
                    link: "https://example.com".to_string(),
                    snippet: "text".to_string(),
                    ..Default::default()
                }],
                search_information: None,
            }))
        }
    }

    fn tools(capacity: usize) -> (SearchTools, Arc<RecordingBackend>) {
        let backend = Arc::new(RecordingBackend::default());
        let orchestrator = SearchOrchestrator::new(backend.clone()).with_bulk_delay(Duration::ZERO);
        let limiter = Arc::new(RateLimiter::new(capacity, Duration::from_secs(60)));
        (SearchTools::new(Arc::new(orchestrator), limiter), backend)
    }

    #[test]
    fn definitions_cover_all_tools() {
        let names: Vec<_> = SearchTools::definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, [WEB_SEARCH, ADVANCED_WEB_SEARCH, BULK_WEB_SEARCH]);

        let bulk = &SearchTools::definitions()[2];
        assert_eq!(bulk.input_schema["properties"]["queries"]["maxItems"], 20);
    }

    #[tokio::test]
    async fn web_search_renders_results() {
        let (tools, backend) = tools(10);
        let out = tools
            .call(WEB_SEARCH, &json!({ "query": "  <b>rust</b>  " }))
            .await
            .unwrap();
        assert!(out.text.starts_with("Found 1 search results for 'brust/b'"));
        assert_eq!(out.data["results"][0]["position"], 1);
        assert_eq!(backend.queries.lock().unwrap()[0], "brust/b");
        assert_eq!(tools.limiter().current_count(), 1);
    }

    #[tokio::test]
    async fn advanced_search_composes_operators() {
        let (tools, backend) = tools(10);
        tools
            .call(
                ADVANCED_WEB_SEARCH,
                &json!({ "query": "report", "site_restrict": "x.com", "file_type": "pdf" }),
            )
            .await
            .unwrap();
        assert_eq!(backend.queries.lock().unwrap()[0], "report site:x.com filetype:pdf");
    }

    #[tokio::test]
    async fn validation_fails_before_network_and_quota() {
        let (tools, backend) = tools(10);
        let err = tools
            .call(WEB_SEARCH, &json!({ "query": "q", "max_results": 301 }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(ref e) if e.field == "max_results"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert_eq!(tools.limiter().current_count(), 0);
    }

    #[tokio::test]
    async fn query_of_only_unsafe_characters_is_rejected() {
        let (tools, _) = tools(10);
        let err = tools.call(WEB_SEARCH, &json!({ "query": "<>\"'" })).await.unwrap_err();
        assert!(matches!(err, ToolError::Validation(ref e) if e.field == "query"));

        let err = tools
            .call(BULK_WEB_SEARCH, &json!({ "queries": ["ok", "<>"] }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(ref e) if e.field == "queries[1]"));
    }

    #[tokio::test]
    async fn site_restrict_is_sanitized_before_the_provider() {
        let (tools, backend) = tools(10);
        tools
            .call(
                ADVANCED_WEB_SEARCH,
                &json!({ "query": "q", "site_restrict": "x.com\"><script>'" }),
            )
            .await
            .unwrap();
        assert_eq!(backend.queries.lock().unwrap()[0], "q site:x.comscript");

        let err = tools
            .call(ADVANCED_WEB_SEARCH, &json!({ "query": "q", "site_restrict": "<'>" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(ref e) if e.field == "site_restrict"));

        let err = tools
            .call(ADVANCED_WEB_SEARCH, &json!({ "query": "q", "site_restrict": "x.com evil" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(ref e) if e.field == "site_restrict"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tools.limiter().current_count(), 1);
    }

    #[tokio::test]
    async fn rate_limit_denies_with_wait_hint() {
        let (tools, backend) = tools(1);
        tools.call(WEB_SEARCH, &json!({ "query": "one" })).await.unwrap();

        let err = tools.call(WEB_SEARCH, &json!({ "query": "two" })).await.unwrap_err();
        match err {
            ToolError::RateLimited(e) => assert!(e.retry_after_secs() >= 1),
            other => panic!("expected rate limit, got {:?}", other),
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bulk_reserves_one_slot_per_query() {
        let (tools, backend) = tools(5);
        tools
            .call(BULK_WEB_SEARCH, &json!({ "queries": ["a", "b", "c"] }))
            .await
            .unwrap();
        assert_eq!(tools.limiter().current_count(), 3);

        let err = tools
            .call(BULK_WEB_SEARCH, &json!({ "queries": ["d", "e", "f"] }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::RateLimited(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn oversized_bulk_is_rejected_without_network() {
        let (tools, backend) = tools(100);
        let queries: Vec<String> = (0..21).map(|i| i.to_string()).collect();
        let err = tools
            .call(BULK_WEB_SEARCH, &json!({ "queries": queries }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bulk_failure_is_rendered_inline() {
        let (tools, _) = tools(10);
        let out = tools
            .call(BULK_WEB_SEARCH, &json!({ "queries": ["good", "fail me", "fine"] }))
            .await
            .unwrap();
        assert!(out.text.starts_with("Bulk search completed: 2/3 queries succeeded"));
        assert!(out.text.contains("## 2. fail me\nSearch failed: quota exhausted"));
        assert_eq!(out.data["results"][1]["total_results"], 0);
    }

    #[tokio::test]
    async fn single_search_provider_failure_is_an_error() {
        let (tools, _) = tools(10);
        let err = tools.call(WEB_SEARCH, &json!({ "query": "fail" })).await.unwrap_err();
        assert!(matches!(err, ToolError::Provider(ref e) if e.status == Some(429)));
    }

    #[tokio::test]
    async fn unknown_tool() {
        let (tools, _) = tools(10);
        let err = tools.call("image_search", &json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: image_search");
    }

    #[test]
    fn empty_results_render_as_message() {
        let text = render_web_results(&WebSearchResult {
            query: "nothing".to_string(),
            results: Vec::new(),
            total_results: 0,
            search_time: None,
        });
        assert_eq!(text, "No search results found for query: nothing");
    }
}
