//! Shared application state

use crate::config::ServerConfig;

/// State shared across request handlers. Conversions themselves share
/// nothing; each request gets its own pipeline instance.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }
}
