use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ApiError, ConfigError};
use crate::types::{ApiOutcome, ApiResponse, ProviderResponse, RateLimitInfo};

/// Hard ceiling on `num` accepted by the provider.
pub const PROVIDER_MAX_NUM: u32 = 300;

/// One outbound provider request, already validated and composed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderQuery {
    pub q: String,
    pub num: u32,
    pub gl: String,
    pub safe: bool,
}

impl ProviderQuery {
    fn as_pairs(&self) -> [(&'static str, String); 4] {
        [
            ("q", self.q.clone()),
            ("num", self.num.min(PROVIDER_MAX_NUM).to_string()),
            ("gl", self.gl.clone()),
            ("safe", if self.safe { "active" } else { "off" }.to_string()),
        ]
    }
}

/// The external search API. Implementations never return anything but
/// the two outcome variants.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, query: &ProviderQuery) -> ApiOutcome<ProviderResponse>;
}

/// HTTP client for the search provider.
#[derive(Clone)]
pub struct ProviderClient {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl ProviderClient {
    pub fn new(api_url: String, api_key: String, timeout: Duration) -> Result<Self, ConfigError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("websearch-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http_client,
            api_url,
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(
            config.api_url.clone(),
            config.api_key.clone(),
            config.request_timeout,
        )
    }
}

#[async_trait]
impl SearchBackend for ProviderClient {
    fn name(&self) -> &str {
        "serpapi"
    }

    async fn fetch(&self, query: &ProviderQuery) -> ApiOutcome<ProviderResponse> {
        info!(query = %query.q, num = query.num, gl = %query.gl, "provider search");

        let response = self
            .http_client
            .get(&self.api_url)
            .query(&query.as_pairs())
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let rate_limit = rate_limit_info(response.headers());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = status_error(status.as_u16(), &body);
            warn!(status = status.as_u16(), error = %err.message, "provider returned an error");
            return Err(err);
        }

        let parsed = response.json::<ProviderResponse>().await.map_err(|e| {
            ApiError::new(format!("Failed to parse provider response: {}", e))
                .with_code("INVALID_RESPONSE")
                .with_status(status.as_u16())
        })?;

        debug!(items = parsed.organic_results.len(), "provider response decoded");
        Ok(ApiResponse {
            data: parsed,
            rate_limit,
        })
    }
}

fn transport_error(e: reqwest::Error) -> ApiError {
    let (message, code) = if e.is_timeout() {
        ("Request to search provider timed out".to_string(), "TIMEOUT")
    } else if e.is_connect() {
        (format!("Could not connect to search provider: {}", e), "CONNECTION_ERROR")
    } else {
        (format!("Failed to send request to search provider: {}", e), "NETWORK_ERROR")
    };
    warn!(error = %e, code, "provider request failed");
    let err = ApiError::new(message).with_code(code);
    match e.status() {
        Some(status) => err.with_status(status.as_u16()),
        None => err,
    }
}

/// Best-effort extraction of message and code from an error body. Handles
/// `{"error": "..."}`, `{"error": {"message", "code"}}` and `{"message"}`.
fn status_error(status: u16, body: &str) -> ApiError {
    let json: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let error_field = json.as_ref().and_then(|j| j.get("error"));

    let message = error_field
        .and_then(|e| e.as_str().or_else(|| e.get("message").and_then(|m| m.as_str())))
        .or_else(|| json.as_ref().and_then(|j| j.get("message")).and_then(|m| m.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| {
            let body = body.trim();
            if body.is_empty() {
                format!("Search provider returned HTTP {}", status)
            } else {
                format!(
                    "Search provider returned HTTP {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                )
            }
        });

    let code = error_field
        .and_then(|e| e.get("code"))
        .and_then(|c| match c {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| format!("HTTP_{}", status));

    ApiError::new(message).with_code(code).with_status(status)
}

fn rate_limit_info(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
    };
    let remaining = header("x-ratelimit-remaining").and_then(|v| v.parse().ok());
    let reset = header("x-ratelimit-reset");
    if remaining.is_none() && reset.is_none() {
        return None;
    }
    Some(RateLimitInfo { remaining, reset })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "test-key-0123456789";

    fn client_for(server: &MockServer) -> ProviderClient {
        ProviderClient::new(
            format!("{}/search", server.uri()),
            KEY.to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn query(q: &str) -> ProviderQuery {
        ProviderQuery {
            q: q.to_string(),
            num: 10,
            gl: "us".to_string(),
            safe: true,
        }
    }

    #[tokio::test]
    async fn sends_expected_query_and_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "rust site:docs.rs"))
            .and(query_param("num", "300"))
            .and(query_param("gl", "gb"))
            .and(query_param("safe", "off"))
            .and(header("authorization", "Bearer test-key-0123456789"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic_results": [{ "title": "Rust", "link": "https://docs.rs/" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client_for(&server)
            .fetch(&ProviderQuery {
                q: "rust site:docs.rs".to_string(),
                num: 500,
                gl: "gb".to_string(),
                safe: false,
            })
            .await
            .unwrap();
        assert_eq!(outcome.data.organic_results.len(), 1);
        assert!(outcome.rate_limit.is_none());
    }

    #[tokio::test]
    async fn passes_rate_limit_headers_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-ratelimit-remaining", "42")
                    .insert_header("x-ratelimit-reset", "2026-10-15T12:00:00Z")
                    .set_body_json(json!({ "organic_results": [] })),
            )
            .mount(&server)
            .await;

        let outcome = client_for(&server).fetch(&query("anything")).await.unwrap();
        assert_eq!(
            outcome.rate_limit,
            Some(RateLimitInfo {
                remaining: Some(42),
                reset: Some("2026-10-15T12:00:00Z".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn http_errors_become_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Invalid API key", "code": "unauthorized" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch(&query("q")).await.unwrap_err();
        assert_eq!(err.message, "Invalid API key");
        assert_eq!(err.code.as_deref(), Some("unauthorized"));
        assert_eq!(err.status, Some(401));
    }

    #[tokio::test]
    async fn plain_text_error_body_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch(&query("q")).await.unwrap_err();
        assert_eq!(
            err.message,
            "Search provider returned HTTP 503: upstream overloaded"
        );
        assert_eq!(err.code.as_deref(), Some("HTTP_503"));
        assert_eq!(err.status, Some(503));
    }

    #[tokio::test]
    async fn undecodable_body_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch(&query("q")).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("INVALID_RESPONSE"));
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_failure() {
        let client = ProviderClient::new(
            "http://127.0.0.1:1/search".to_string(),
            KEY.to_string(),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = client.fetch(&query("q")).await.unwrap_err();
        assert!(err.status.is_none());
        assert!(err.code.is_some());
    }

    #[test]
    fn error_body_shapes() {
        let err = status_error(429, r#"{"error":"Too many requests"}"#);
        assert_eq!(err.message, "Too many requests");
        assert_eq!(err.code.as_deref(), Some("HTTP_429"));

        let err = status_error(400, r#"{"message":"bad gl"}"#);
        assert_eq!(err.message, "bad gl");

        let err = status_error(500, "");
        assert_eq!(err.message, "Search provider returned HTTP 500");
    }
}
