//! HTTP server configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

pub const DEFAULT_PORT: u16 = 3000;

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))
}

/// Configuration for the dashboard server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: SocketAddr,

    /// Enable CORS for browser dashboards on other origins
    pub enable_cors: bool,

    /// Origins allowed by CORS; empty means any origin
    pub allowed_origins: Vec<String>,

    /// Trace every request with `TraceLayer`
    pub enable_request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            enable_cors: true,
            allowed_origins: Vec::new(),
            enable_request_logging: true,
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(origin) = self
            .allowed_origins
            .iter()
            .find(|o| !(o.starts_with("http://") || o.starts_with("https://")))
        {
            return Err(ConfigError::InvalidValue {
                field: "allowed_origins".to_string(),
                reason: format!("Origin must start with http:// or https://: {}", origin),
            });
        }

        if !self.allowed_origins.is_empty() && !self.enable_cors {
            return Err(ConfigError::InvalidValue {
                field: "allowed_origins".to_string(),
                reason: "Origins listed while CORS is disabled".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for ServerConfig
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    bind_address: Option<SocketAddr>,
    enable_cors: Option<bool>,
    allowed_origins: Vec<String>,
    enable_request_logging: Option<bool>,
}

impl ServerConfigBuilder {
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = Some(addr);
        self
    }

    /// Set bind address from string
    pub fn bind_address_str(mut self, addr: &str) -> Result<Self, ConfigError> {
        self.bind_address = Some(parse_bind_address(addr)?);
        Ok(self)
    }

    pub fn enable_cors(mut self, enable: bool) -> Self {
        self.enable_cors = Some(enable);
        self
    }

    pub fn allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origins.push(origin.into());
        self
    }

    pub fn enable_request_logging(mut self, enable: bool) -> Self {
        self.enable_request_logging = Some(enable);
        self
    }

    /// Build the config
    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        let config = ServerConfig {
            bind_address: self.bind_address.unwrap_or_else(default_bind_address),
            enable_cors: self.enable_cors.unwrap_or(true),
            allowed_origins: self.allowed_origins,
            enable_request_logging: self.enable_request_logging.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Parse `host:port`, or a bare port bound on all interfaces
pub fn parse_bind_address(addr: &str) -> Result<SocketAddr, ConfigError> {
    let addr = addr.trim();
    if let Ok(port) = addr.parse::<u16>() {
        return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
    }
    addr.parse().map_err(|_| ConfigError::InvalidValue {
        field: "bind_address".to_string(),
        reason: format!("Invalid address: {}", addr),
    })
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    InvalidValue { field: String, reason: String },
    MissingField { field: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
            Self::MissingField { field } => {
                write!(f, "Missing required field: {}", field)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address.port(), 3000);
        assert!(config.enable_cors);
        assert!(config.allowed_origins.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = ServerConfig::builder()
            .bind_address_str("127.0.0.1:9000")
            .unwrap()
            .allowed_origin("http://localhost:5173")
            .enable_request_logging(false)
            .build()
            .unwrap();

        assert_eq!(config.bind_address.port(), 9000);
        assert_eq!(config.allowed_origins, vec!["http://localhost:5173"]);
        assert!(!config.enable_request_logging);
    }

    #[test]
    fn test_config_validation_fails() {
        let result = ServerConfig::builder().allowed_origin("localhost").build();
        assert!(result.is_err());

        let result = ServerConfig::builder()
            .enable_cors(false)
            .allowed_origin("http://localhost")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_bind_address() {
        assert_eq!(parse_bind_address("8080").unwrap().port(), 8080);
        assert_eq!(
            parse_bind_address("127.0.0.1:4000").unwrap().to_string(),
            "127.0.0.1:4000"
        );
        assert!(parse_bind_address("not-an-address").is_err());
    }
}
