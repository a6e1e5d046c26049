//! Server configuration loaded from the environment.
//!
//! The `tandem-server` binary reads its settings from `TANDEM_*` variables,
//! optionally placed in a `.env` file next to it:
//!
//! | Variable                 | Default            |
//! |--------------------------|--------------------|
//! | `TANDEM_HOST`            | `0.0.0.0`          |
//! | `TANDEM_PORT`            | `8000`             |
//! | `TANDEM_PATH`            | `/ws/tetris`       |
//! | `TANDEM_ALLOWED_ORIGINS` | `http://localhost` |
//!
//! An empty `TANDEM_PATH` accepts any path; an empty
//! `TANDEM_ALLOWED_ORIGINS` accepts any origin.

use std::env;

use tandem_transport::WebSocketConfig;

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Where and how the server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Endpoint path; `None` accepts any path.
    pub path: Option<String>,
    /// Browser origins allowed to connect; empty allows all.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            path: Some("/ws/tetris".to_string()),
            allowed_origins: vec!["http://localhost".to_string()],
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from the process environment (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Unset keys fall back
    /// to [`ServerConfig::default`].
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = lookup("TANDEM_HOST").unwrap_or(defaults.host);
        let port = match lookup("TANDEM_PORT") {
            Some(value) => match value.trim().parse() {
                Ok(port) => port,
                Err(_) => {
                    return Err(ConfigError::Invalid {
                        key: "TANDEM_PORT",
                        value,
                    });
                }
            },
            None => defaults.port,
        };
        let path = match lookup("TANDEM_PATH") {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(value.trim().to_string()),
            None => defaults.path,
        };
        let allowed_origins = match lookup("TANDEM_ALLOWED_ORIGINS") {
            Some(value) => value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.allowed_origins,
        };

        Ok(Self {
            host,
            port,
            path,
            allowed_origins,
        })
    }

    /// The `host:port` string to bind to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The handshake policy for the WebSocket transport.
    pub fn websocket(&self) -> WebSocketConfig {
        WebSocketConfig {
            path: self.path.clone(),
            allowed_origins: self.allowed_origins.clone(),
        }
    }
}
