//! Ingest API configuration module.
//!
//! Configuration is layered with the `config` crate:
//!
//! ```text
//! built-in defaults  ──►  opsledger.toml (optional)  ──►  OPSLEDGER_* env
//!      lowest                                                  highest
//! ```
//!
//! e.g. `OPSLEDGER_PORT=9090` overrides `port = 8080` from the file.

use std::net::SocketAddr;
use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use opsledger_core::page::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

/// File name looked up in the working directory.
pub const CONFIG_FILE: &str = "opsledger.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "OPSLEDGER";

/// Ingest API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bind address
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,

    /// Page size when a list request gives no `limit`
    pub default_page_limit: u32,

    /// Upper clamp for `limit`
    pub max_page_limit: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_path: PathBuf::from("./opsledger.db"),
            max_connections: 5,
            log_level: "info".to_string(),
            default_page_limit: DEFAULT_PAGE_LIMIT,
            max_page_limit: MAX_PAGE_LIMIT,
        }
    }
}

impl ApiConfig {
    /// Load configuration from defaults, `opsledger.toml` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_FILE)
    }

    /// Same as [`ApiConfig::load`] with an explicit file path.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let defaults = ApiConfig::default();

        let config: ApiConfig = Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("database_path", defaults.database_path.to_string_lossy().to_string())?
            .set_default("max_connections", i64::from(defaults.max_connections))?
            .set_default("log_level", defaults.log_level)?
            .set_default("default_page_limit", i64::from(defaults.default_page_limit))?
            .set_default("max_page_limit", i64::from(defaults.max_page_limit))?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("max_connections".to_string()));
        }
        if self.max_page_limit == 0 {
            return Err(ConfigError::InvalidValue("max_page_limit".to_string()));
        }
        if self.default_page_limit == 0 || self.default_page_limit > self.max_page_limit {
            return Err(ConfigError::InvalidValue("default_page_limit".to_string()));
        }
        self.socket_addr()?;
        Ok(())
    }

    /// The address to bind.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("host".to_string()))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ApiConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
        assert_eq!(config.default_page_limit, 50);
        assert_eq!(config.max_page_limit, 500);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = ApiConfig::load_from("does-not-exist.toml").unwrap();
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.database_path, PathBuf::from("./opsledger.db"));
    }

    #[test]
    fn test_invalid_page_limits_rejected() {
        let config = ApiConfig {
            default_page_limit: 600,
            ..ApiConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(field)) if field == "default_page_limit"
        ));
    }
}
