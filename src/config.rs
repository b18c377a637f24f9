//! Process configuration, read from the environment.
//!
//! | variable                  | default                           |
//! |---------------------------|-----------------------------------|
//! | `SEARCH_API_KEY`          | required                          |
//! | `SEARCH_API_URL`          | `https://serpapi.com/search.json` |
//! | `SEARCH_TIMEOUT_SECS`     | `30`                              |
//! | `RATE_LIMIT_MAX_REQUESTS` | `100`                             |
//! | `RATE_LIMIT_WINDOW_MS`    | `60000`                           |
//! | `MCP_BIND_ADDR`           | `0.0.0.0:5000`                    |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const API_KEY_VAR: &str = "SEARCH_API_KEY";
pub const MIN_API_KEY_LENGTH: usize = 10;

const DEFAULT_API_URL: &str = "https://serpapi.com/search.json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_REQUESTS: usize = 100;
const DEFAULT_WINDOW_MS: u64 = 60_000;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub api_url: String,
    pub request_timeout: Duration,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window: Duration,
    pub bind_addr: String,
}

// Keep the key out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("request_timeout", &self.request_timeout)
            .field("rate_limit_max_requests", &self.rate_limit_max_requests)
            .field("rate_limit_window", &self.rate_limit_window)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::Missing(API_KEY_VAR))?;
        if api_key.len() < MIN_API_KEY_LENGTH {
            return Err(ConfigError::Invalid {
                name: API_KEY_VAR,
                reason: format!("expected at least {} characters", MIN_API_KEY_LENGTH),
            });
        }

        let api_url = lookup("SEARCH_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        url::Url::parse(&api_url).map_err(|e| ConfigError::Invalid {
            name: "SEARCH_API_URL",
            reason: e.to_string(),
        })?;

        let timeout_secs: u64 = parse_var(&lookup, "SEARCH_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let max_requests: usize =
            parse_var(&lookup, "RATE_LIMIT_MAX_REQUESTS", DEFAULT_MAX_REQUESTS)?;
        let window_ms: u64 = parse_var(&lookup, "RATE_LIMIT_WINDOW_MS", DEFAULT_WINDOW_MS)?;

        for (name, value) in [
            ("SEARCH_TIMEOUT_SECS", timeout_secs),
            ("RATE_LIMIT_MAX_REQUESTS", max_requests as u64),
            ("RATE_LIMIT_WINDOW_MS", window_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    name,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        Ok(Self {
            api_key,
            api_url,
            request_timeout: Duration::from_secs(timeout_secs),
            rate_limit_max_requests: max_requests,
            rate_limit_window: Duration::from_millis(window_ms),
            bind_addr: lookup("MCP_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_with_only_api_key() {
        let config = load(&[(API_KEY_VAR, "0123456789abcdef")]).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.rate_limit_max_requests, 100);
        assert_eq!(config.rate_limit_window, Duration::from_millis(60_000));
        assert_eq!(config.bind_addr, "0.0.0.0:5000");
    }

    #[test]
    fn missing_or_short_key_is_fatal() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing(API_KEY_VAR))));
        assert!(matches!(
            load(&[(API_KEY_VAR, "   ")]),
            Err(ConfigError::Missing(_))
        ));
        assert!(matches!(
            load(&[(API_KEY_VAR, "short")]),
            Err(ConfigError::Invalid { name: API_KEY_VAR, .. })
        ));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            (API_KEY_VAR, "0123456789abcdef"),
            ("SEARCH_API_URL", "http://127.0.0.1:9999/search"),
            ("RATE_LIMIT_MAX_REQUESTS", "5"),
            ("RATE_LIMIT_WINDOW_MS", "1000"),
            ("SEARCH_TIMEOUT_SECS", " 3 "),
        ])
        .unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:9999/search");
        assert_eq!(config.rate_limit_max_requests, 5);
        assert_eq!(config.rate_limit_window, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = load(&[
            (API_KEY_VAR, "0123456789abcdef"),
            ("RATE_LIMIT_MAX_REQUESTS", "lots"),
        ])
        .unwrap_err();
        assert!(err.to_string().starts_with("RATE_LIMIT_MAX_REQUESTS looks invalid"));

        let err = load(&[(API_KEY_VAR, "0123456789abcdef"), ("RATE_LIMIT_WINDOW_MS", "0")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "RATE_LIMIT_WINDOW_MS", .. }));
    }

    #[test]
    fn debug_output_hides_key() {
        let config = load(&[(API_KEY_VAR, "super-secret-key")]).unwrap();
        assert!(!format!("{:?}", config).contains("super-secret-key"));
    }
}
