use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ApiError;

/// Every provider call resolves to exactly one of these two variants.
pub type ApiOutcome<T> = Result<ApiResponse<T>, ApiError>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitInfo>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            rate_limit: None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            data: f(self.data),
            rate_limit: self.rate_limit,
        }
    }
}

/// Provider quota telemetry, passed through from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Doc,
    Docx,
    Xls,
    Xlsx,
    Ppt,
    Pptx,
    Txt,
    Rtf,
    Odt,
    Csv,
}

impl FileType {
    pub const ALL: [FileType; 11] = [
        FileType::Pdf,
        FileType::Doc,
        FileType::Docx,
        FileType::Xls,
        FileType::Xlsx,
        FileType::Ppt,
        FileType::Pptx,
        FileType::Txt,
        FileType::Rtf,
        FileType::Odt,
        FileType::Csv,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Doc => "doc",
            FileType::Docx => "docx",
            FileType::Xls => "xls",
            FileType::Xlsx => "xlsx",
            FileType::Ppt => "ppt",
            FileType::Pptx => "pptx",
            FileType::Txt => "txt",
            FileType::Rtf => "rtf",
            FileType::Odt => "odt",
            FileType::Csv => "csv",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRange {
    PastDay,
    PastWeek,
    PastMonth,
    PastYear,
}

impl DateRange {
    pub const ALL: [DateRange; 4] = [
        DateRange::PastDay,
        DateRange::PastWeek,
        DateRange::PastMonth,
        DateRange::PastYear,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DateRange::PastDay => "past_day",
            DateRange::PastWeek => "past_week",
            DateRange::PastMonth => "past_month",
            DateRange::PastYear => "past_year",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == value)
    }

    /// Query operator understood by the provider.
    pub fn operator(self) -> &'static str {
        match self {
            DateRange::PastDay => "after:1d",
            DateRange::PastWeek => "after:1w",
            DateRange::PastMonth => "after:1m",
            DateRange::PastYear => "after:1y",
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated parameters for `web_search` and `advanced_web_search`.
///
/// Only [`validate_search`](crate::validation::validate_search) builds these,
/// so every field has already passed its constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchParams {
    pub(crate) query: String,
    pub(crate) max_results: u32,
    pub(crate) region: String,
    pub(crate) safe_search: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) site_restrict: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) file_type: Option<FileType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) date_range: Option<DateRange>,
}

impl SearchParams {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn max_results(&self) -> u32 {
        self.max_results
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn safe_search(&self) -> bool {
        self.safe_search
    }

    pub fn site_restrict(&self) -> Option<&str> {
        self.site_restrict.as_deref()
    }

    pub fn file_type(&self) -> Option<FileType> {
        self.file_type
    }

    pub fn date_range(&self) -> Option<DateRange> {
        self.date_range
    }

    pub(crate) fn with_query(&self, query: String) -> Self {
        Self {
            query,
            ..self.clone()
        }
    }
}

/// Validated parameters for `bulk_web_search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkSearchParams {
    pub(crate) queries: Vec<String>,
    pub(crate) max_results_per_query: u32,
    pub(crate) region: String,
    pub(crate) safe_search: bool,
}

impl BulkSearchParams {
    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    pub fn max_results_per_query(&self) -> u32 {
        self.max_results_per_query
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn safe_search(&self) -> bool {
        self.safe_search
    }

    /// Single-search parameters for one query of the batch.
    pub(crate) fn search_params(&self, query: &str) -> SearchParams {
        SearchParams {
            query: query.to_string(),
            max_results: self.max_results_per_query,
            region: self.region.clone(),
            safe_search: self.safe_search,
            site_restrict: None,
            file_type: None,
            date_range: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// 1-based rank in the response, assigned locally.
    pub position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchResult {
    /// The query string actually sent to the provider.
    pub query: String,
    pub results: Vec<SearchResult>,
    pub total_results: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkSearchEntry {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub total_results: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkSearchResult {
    pub results: Vec<BulkSearchEntry>,
    pub total_queries: usize,
    pub successful_queries: usize,
    pub searched_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

// Provider API types
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderResponse {
    #[serde(default)]
    pub organic_results: Vec<ProviderResult>,
    #[serde(default)]
    pub search_information: Option<ProviderSearchInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderResult {
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "url")]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub displayed_link: Option<String>,
    #[serde(default)]
    pub favicon: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSearchInfo {
    #[serde(default)]
    pub total_results: Option<u64>,
    #[serde(default)]
    pub time_taken_displayed: Option<f64>,
}
