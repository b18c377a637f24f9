pub mod config;
pub mod error;
pub mod mcp;
pub mod orchestrator;
pub mod rate_limiter;
pub mod sanitize;
pub mod search;
pub mod stdio_service;
pub mod tools;
pub mod types;
pub mod validation;

use std::sync::Arc;

use crate::config::Config;
use crate::error::ConfigError;
use crate::orchestrator::SearchOrchestrator;
use crate::rate_limiter::RateLimiter;
use crate::search::{ProviderClient, SearchBackend};
use crate::tools::SearchTools;

pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub tools: SearchTools,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let backend = Arc::new(ProviderClient::from_config(config)?);
        Ok(Self::with_backend(config, backend))
    }

    pub fn with_backend(config: &Config, backend: Arc<dyn SearchBackend>) -> Self {
        let orchestrator = Arc::new(SearchOrchestrator::new(backend));
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_max_requests,
            config.rate_limit_window,
        ));
        Self {
            tools: SearchTools::new(orchestrator, limiter),
        }
    }
}

/// Log to stderr; stdout belongs to the stdio transport.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
