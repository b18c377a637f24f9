//! Turns raw, untyped tool arguments into validated parameter records.
//!
//! Checks run in a fixed order and stop at the first failure: record shape,
//! then required fields and the primitive type of every present field, then
//! string bounds, integer ranges, enumerations, and finally the region
//! format. Bulk queries are checked element by element at the string stage.
//! Out-of-range numbers are rejected, never clamped.

use serde_json::{Map, Number, Value};

use crate::error::ValidationError;
use crate::types::{BulkSearchParams, DateRange, FileType, SearchParams};

pub const MAX_QUERY_LENGTH: usize = 500;
pub const MAX_RESULTS_LIMIT: u32 = 300;
pub const MAX_RESULTS_PER_QUERY_LIMIT: u32 = 50;
pub const MAX_BULK_QUERIES: usize = 20;
pub const DEFAULT_MAX_RESULTS: u32 = 10;
pub const DEFAULT_REGION: &str = "us";

type Result<T> = std::result::Result<T, ValidationError>;

pub fn validate_search(raw: &Value) -> Result<SearchParams> {
    let args = as_record(raw)?;

    // Types.
    let query = required_string(args.get("query"), "query")?;
    let max_results = optional_number(args, "max_results")?;
    let region = optional_string(args, "region")?;
    let safe_search = optional_bool(args, "safe_search")?.unwrap_or(true);
    let site_restrict = optional_string(args, "site_restrict")?;
    let file_type = optional_string(args, "file_type")?;
    let date_range = optional_string(args, "date_range")?;

    // String bounds.
    let query = bounded_query(query, "query")?;
    let site_restrict = site_restrict
        .map(|site| {
            let site = site.trim();
            if site.is_empty() {
                return Err(ValidationError::new(
                    "site_restrict",
                    "site_restrict must be a non-empty string",
                ));
            }
            Ok(site.to_string())
        })
        .transpose()?;

    // Ranges.
    let max_results = max_results
        .map(|n| integer_in_range(n, "max_results", 1, MAX_RESULTS_LIMIT))
        .transpose()?
        .unwrap_or(DEFAULT_MAX_RESULTS);

    // Enumerations.
    let file_type = file_type
        .map(|value| {
            FileType::parse(&normalize(value)).ok_or_else(|| {
                ValidationError::new(
                    "file_type",
                    format!(
                        "file_type must be one of: {}",
                        join(FileType::ALL.iter().map(|t| t.as_str()))
                    ),
                )
            })
        })
        .transpose()?;
    let date_range = date_range
        .map(|value| {
            DateRange::parse(&normalize(value)).ok_or_else(|| {
                ValidationError::new(
                    "date_range",
                    format!(
                        "date_range must be one of: {}",
                        join(DateRange::ALL.iter().map(|r| r.as_str()))
                    ),
                )
            })
        })
        .transpose()?;

    let region = validate_region(region)?;

    Ok(SearchParams {
        query,
        max_results,
        region,
        safe_search,
        site_restrict,
        file_type,
        date_range,
    })
}

pub fn validate_bulk(raw: &Value) -> Result<BulkSearchParams> {
    let args = as_record(raw)?;

    // Types.
    let raw_queries = match args.get("queries") {
        None | Some(Value::Null) => {
            return Err(ValidationError::new("queries", "queries is required"));
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ValidationError::new("queries", "queries must be an array"));
        }
    };
    let max_results_per_query = optional_number(args, "max_results_per_query")?;
    let region = optional_string(args, "region")?;
    let safe_search = optional_bool(args, "safe_search")?.unwrap_or(true);

    // Queries, then each element.
    if raw_queries.is_empty() || raw_queries.len() > MAX_BULK_QUERIES {
        return Err(ValidationError::new(
            "queries",
            format!(
                "queries must contain between 1 and {} items (got {})",
                MAX_BULK_QUERIES,
                raw_queries.len()
            ),
        ));
    }
    let queries = raw_queries
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let field = format!("queries[{}]", i);
            bounded_query(required_string(Some(item), &field)?, &field)
        })
        .collect::<Result<Vec<_>>>()?;

    // Ranges.
    let max_results_per_query = max_results_per_query
        .map(|n| {
            integer_in_range(n, "max_results_per_query", 1, MAX_RESULTS_PER_QUERY_LIMIT)
        })
        .transpose()?
        .unwrap_or(DEFAULT_MAX_RESULTS);

    let region = validate_region(region)?;

    Ok(BulkSearchParams {
        queries,
        max_results_per_query,
        region,
        safe_search,
    })
}

fn as_record(raw: &Value) -> Result<&Map<String, Value>> {
    raw.as_object()
        .ok_or_else(|| ValidationError::new("arguments", "Arguments must be an object"))
}

fn required_string<'a>(value: Option<&'a Value>, field: &str) -> Result<&'a str> {
    match value {
        None | Some(Value::Null) => {
            Err(ValidationError::new(field, format!("{} is required", field)))
        }
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(ValidationError::new(field, format!("{} must be a string", field))),
    }
}

fn bounded_query(query: &str, field: &str) -> Result<String> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ValidationError::new(field, format!("{} cannot be empty", field)));
    }
    if query.chars().count() > MAX_QUERY_LENGTH {
        return Err(ValidationError::new(
            field,
            format!("{} cannot exceed {} characters", field, MAX_QUERY_LENGTH),
        ));
    }
    Ok(query.to_string())
}

fn validate_region(region: Option<&str>) -> Result<String> {
    let Some(region) = region else {
        return Ok(DEFAULT_REGION.to_string());
    };
    let region = normalize(region);
    let well_formed = region.len() == 2 && region.bytes().all(|b| b.is_ascii_lowercase());
    if !well_formed {
        return Err(ValidationError::new(
            "region",
            "region must be a 2-letter country code (e.g. 'us', 'gb')",
        ));
    }
    Ok(region)
}

fn optional_string<'a>(args: &'a Map<String, Value>, field: &str) -> Result<Option<&'a str>> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ValidationError::new(field, format!("{} must be a string", field))),
    }
}

fn optional_bool(args: &Map<String, Value>, field: &str) -> Result<Option<bool>> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ValidationError::new(field, format!("{} must be a boolean", field))),
    }
}

fn optional_number<'a>(args: &'a Map<String, Value>, field: &str) -> Result<Option<&'a Number>> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n)),
        Some(_) => Err(ValidationError::new(field, format!("{} must be a number", field))),
    }
}

fn integer_in_range(number: &Number, field: &str, min: u32, max: u32) -> Result<u32> {
    // Whole floats such as 10.0 count as integers.
    let integer = number
        .as_i64()
        .or_else(|| number.as_u64().map(|_| i64::MAX))
        .or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f.clamp(i64::MIN as f64, i64::MAX as f64) as i64)
        });
    let Some(integer) = integer else {
        return Err(ValidationError::new(field, format!("{} must be an integer", field)));
    };

    if integer < i64::from(min) || integer > i64::from(max) {
        return Err(ValidationError::new(
            field,
            format!("{} must be between {} and {}", field, min, max),
        ));
    }
    Ok(integer as u32)
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn join<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.collect::<Vec<_>>().join(", ")
}
