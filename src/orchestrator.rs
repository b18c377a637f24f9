//! Single, advanced and bulk search on top of a [`SearchBackend`].
//!
//! Bulk search runs its sub-queries one after another with a fixed pause in
//! between, so a batch never bursts against the provider's quota. A failed
//! sub-query is recorded as an empty entry and the batch carries on; nothing
//! is retried.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::search::{ProviderQuery, SearchBackend};
use crate::types::{
    ApiOutcome, ApiResponse, BulkSearchEntry, BulkSearchParams, BulkSearchResult,
    ProviderResponse, ProviderResult, SearchParams, SearchResult, WebSearchResult,
};

pub const BULK_SEARCH_DELAY: Duration = Duration::from_millis(100);

const HEALTH_CHECK_QUERY: &str = "test";

#[derive(Clone)]
pub struct SearchOrchestrator {
    backend: Arc<dyn SearchBackend>,
    bulk_delay: Duration,
}

impl SearchOrchestrator {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            bulk_delay: BULK_SEARCH_DELAY,
        }
    }

    pub fn with_bulk_delay(mut self, delay: Duration) -> Self {
        self.bulk_delay = delay;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// One provider call for `params.query`. Advanced filter fields are not
    /// looked at here; see [`advanced_search`](Self::advanced_search).
    pub async fn search(&self, params: &SearchParams) -> ApiOutcome<WebSearchResult> {
        let query = ProviderQuery {
            q: params.query().to_string(),
            num: params.max_results(),
            gl: params.region().to_string(),
            safe: params.safe_search(),
        };
        let response = self.backend.fetch(&query).await?;
        let max_results = params.max_results() as usize;
        Ok(response.map(|raw| normalize(query.q, raw, max_results)))
    }

    /// Appends `site:`, `filetype:` and date operators to the query, in that
    /// order, then runs a normal search.
    pub async fn advanced_search(&self, params: &SearchParams) -> ApiOutcome<WebSearchResult> {
        let composed = compose_advanced_query(params);
        debug!(query = %composed, "composed advanced query");
        self.search(&params.with_query(composed)).await
    }

    pub async fn bulk_search(&self, params: &BulkSearchParams) -> ApiOutcome<BulkSearchResult> {
        let total = params.queries().len();
        info!(queries = total, "starting bulk search");

        let mut entries = Vec::with_capacity(total);
        let mut rate_limit = None;

        for (i, query) in params.queries().iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.bulk_delay).await;
            }

            let entry = match self.search(&params.search_params(query)).await {
                Ok(response) => {
                    if response.rate_limit.is_some() {
                        rate_limit = response.rate_limit;
                    }
                    BulkSearchEntry {
                        query: query.clone(),
                        results: response.data.results,
                        total_results: response.data.total_results,
                        error: None,
                    }
                }
                Err(err) => {
                    warn!(index = i, query = %query, error = %err, "bulk sub-query failed");
                    BulkSearchEntry {
                        query: query.clone(),
                        results: Vec::new(),
                        total_results: 0,
                        error: Some(err.message),
                    }
                }
            };
            entries.push(entry);
        }

        let successful_queries = entries.iter().filter(|e| e.error.is_none()).count();
        info!(
            queries = total,
            successful = successful_queries,
            "bulk search finished"
        );

        Ok(ApiResponse {
            data: BulkSearchResult {
                results: entries,
                total_queries: total,
                successful_queries,
                searched_at: chrono::Utc::now().to_rfc3339(),
            },
            rate_limit,
        })
    }

    /// Minimal one-result search; any failure reads as unhealthy.
    pub async fn health_check(&self) -> bool {
        let query = ProviderQuery {
            q: HEALTH_CHECK_QUERY.to_string(),
            num: 1,
            gl: crate::validation::DEFAULT_REGION.to_string(),
            safe: true,
        };
        match self.backend.fetch(&query).await {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "provider health check failed");
                false
            }
        }
    }
}

pub fn compose_advanced_query(params: &SearchParams) -> String {
    let mut query = params.query().to_string();
    if let Some(site) = params.site_restrict() {
        query.push_str(" site:");
        query.push_str(site);
    }
    if let Some(file_type) = params.file_type() {
        query.push_str(" filetype:");
        query.push_str(file_type.as_str());
    }
    if let Some(range) = params.date_range() {
        query.push(' ');
        query.push_str(range.operator());
    }
    query
}

/// Positions are dense and 1-based in response order, whatever the
/// provider claims.
fn normalize(query: String, raw: ProviderResponse, max_results: usize) -> WebSearchResult {
    let results: Vec<SearchResult> = raw
        .organic_results
        .into_iter()
        .take(max_results)
        .enumerate()
        .map(|(i, item)| to_search_result(i + 1, item))
        .collect();

    let info = raw.search_information.unwrap_or_default();
    WebSearchResult {
        query,
        total_results: info.total_results.unwrap_or(results.len() as u64),
        search_time: info.time_taken_displayed,
        results,
    }
}

fn to_search_result(position: usize, item: ProviderResult) -> SearchResult {
    let domain = url::Url::parse(&item.link)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .or(item.displayed_link);

    SearchResult {
        title: item.title,
        url: item.link,
        snippet: item.snippet,
        position,
        domain,
        favicon: item.favicon,
        date: item.date,
    }
}
