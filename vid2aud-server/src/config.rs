//! Server configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum accepted upload size in MiB
    pub max_upload_mb: usize,

    /// Target format used when the request omits one
    pub default_format: String,

    /// Target bitrate used when the request omits one, bits per second
    pub default_bitrate: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_upload_mb: 500,
            default_format: "mp3".to_string(),
            default_bitrate: 128_000,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file; missing keys fall back to
    /// defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// The socket address string to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Maximum upload size in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_upload_mb, 500);
        assert_eq!(config.default_format, "mp3");
        assert_eq!(config.default_bitrate, 128_000);
        assert_eq!(config.socket_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_from_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = 9000\nmax_upload_mb = 100\n").unwrap();

        let config = ServerConfig::from_file(&path).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.max_upload_bytes(), 100 * 1024 * 1024);
        // Untouched keys keep their defaults
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.default_format, "mp3");
    }

    #[test]
    fn test_from_file_missing() {
        assert!(matches!(
            ServerConfig::from_file("/nonexistent/config.toml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_from_file_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = \"not a number").unwrap();
        assert!(matches!(
            ServerConfig::from_file(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
