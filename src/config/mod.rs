/// Configuration management for portgate

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::Endpoint;
pub use crate::error::ConfigError;

/// Main portgate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Tier this process plays
    pub tier: TierConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Lower bound of injected login latency (chaos testing)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_latency_ms: Option<u64>,
    /// Upper bound of injected login latency (chaos testing)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_latency_ms: Option<u64>,
}

/// Tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum TierConfig {
    #[serde(rename = "gateway")]
    Gateway {
        /// Router tier replicas, balanced round robin
        routers: Vec<Endpoint>,
    },
    #[serde(rename = "router")]
    Router {
        /// Write primary; also serves a share of reads
        primary: Endpoint,
        /// Read replicas
        #[serde(default)]
        replicas: Vec<Endpoint>,
    },
    #[serde(rename = "store")]
    Store {},
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, text)
    pub format: String,
    /// Log to stdout
    pub stdout: bool,
    /// Log file path (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                min_latency_ms: None,
                max_latency_ms: None,
            },
            tier: TierConfig::Gateway {
                routers: vec![Endpoint::new("127.0.0.1", 8081)],
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            stdout: true,
            file: None,
        }
    }
}

impl ServerConfig {
    /// Address string suitable for `TcpListener::bind`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Injected latency bounds, if both are configured
    pub fn latency_bounds(&self) -> Option<(u64, u64)> {
        match (self.min_latency_ms, self.max_latency_ms) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }
}

impl TierConfig {
    /// Tier name for logging
    pub fn mode_name(&self) -> &'static str {
        match self {
            TierConfig::Gateway { .. } => "gateway",
            TierConfig::Router { .. } => "router",
            TierConfig::Store {} => "store",
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Apply `--host`/`--port` overrides from the command line
    pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Result<Self, ConfigError> {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "server host cannot be empty".to_string(),
            ));
        }

        match (self.server.min_latency_ms, self.server.max_latency_ms) {
            (Some(min), Some(max)) if min > max => {
                return Err(ConfigError::ValidationError(format!(
                    "min_latency_ms ({}) must not exceed max_latency_ms ({})",
                    min, max
                )));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::ValidationError(
                    "min_latency_ms and max_latency_ms must be set together".to_string(),
                ));
            }
            _ => {}
        }

        match &self.tier {
            TierConfig::Gateway { routers } => {
                if routers.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "routers cannot be empty".to_string(),
                    ));
                }
                for endpoint in routers {
                    validate_endpoint("router", endpoint)?;
                }
            }
            TierConfig::Router { primary, replicas } => {
                validate_endpoint("primary", primary)?;
                for endpoint in replicas {
                    validate_endpoint("replica", endpoint)?;
                }
            }
            TierConfig::Store {} => {}
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => return Err(ConfigError::ValidationError(
                format!("Invalid log level: {}", self.logging.level)
            )),
        }

        match self.logging.format.as_str() {
            "json" | "text" => {}
            _ => return Err(ConfigError::ValidationError(
                format!("Invalid log format: {}", self.logging.format)
            )),
        }

        if !self.logging.stdout && self.logging.file.is_none() {
            return Err(ConfigError::ValidationError(
                "logging needs stdout or a file".to_string(),
            ));
        }

        Ok(())
    }

    /// Create example configuration file
    pub fn create_example_config<P: AsRef<Path>>(path: P, mode: &str) -> Result<(), ConfigError> {
        let config = match mode {
            "gateway" => Config {
                server: ServerConfig {
                    host: "0.0.0.0".to_string(),
                    port: 8080,
                    min_latency_ms: Some(0),
                    max_latency_ms: Some(50),
                },
                tier: TierConfig::Gateway {
                    routers: vec![
                        Endpoint::new("10.0.1.10", 8081),
                        Endpoint::new("10.0.1.11", 8081),
                    ],
                },
                ..Default::default()
            },
            "router" => Config {
                server: ServerConfig {
                    host: "0.0.0.0".to_string(),
                    port: 8081,
                    min_latency_ms: None,
                    max_latency_ms: None,
                },
                tier: TierConfig::Router {
                    primary: Endpoint::new("10.0.1.20", 8082),
                    replicas: vec![
                        Endpoint::new("10.0.1.21", 8082),
                        Endpoint::new("10.0.1.22", 8082),
                    ],
                },
                ..Default::default()
            },
            "store" => Config {
                server: ServerConfig {
                    host: "0.0.0.0".to_string(),
                    port: 8082,
                    min_latency_ms: None,
                    max_latency_ms: None,
                },
                tier: TierConfig::Store {},
                ..Default::default()
            },
            _ => return Err(ConfigError::ValidationError(
                "Mode must be 'gateway', 'router' or 'store'".to_string(),
            )),
        };

        config.save_to_file(path)
    }
}

fn validate_endpoint(role: &str, endpoint: &Endpoint) -> Result<(), ConfigError> {
    if endpoint.host.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "{} endpoint has an empty host",
            role
        )));
    }
    if endpoint.port == 0 {
        return Err(ConfigError::ValidationError(format!(
            "Invalid {} endpoint: {}",
            role, endpoint
        )));
    }
    Ok(())
}
