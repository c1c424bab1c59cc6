//! Server configuration
//!
//! Sources, later ones overriding earlier ones:
//! - built-in defaults
//! - `config/proctor.toml` (or the path given on the command line)
//! - `PROCTOR__*` environment variables, e.g. `PROCTOR__SERVER__BIND_ADDR`

use config::{Config, Environment, File, FileFormat};
use interview::CoordinatorConfig;
use landmarks::ModelConfig;
use serde::{Deserialize, Serialize};

use crate::ApiError;

const DEFAULT_CONFIG_FILE: &str = "config/proctor";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Max level: trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Feedback records kept before the oldest are evicted
    pub max_feedback_records: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_feedback_records: 10_000,
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: HttpConfig,
    pub logging: LoggingConfig,
    pub model: ModelConfig,
    pub coordinator: CoordinatorConfig,
    pub storage: StorageConfig,
}

impl ServerConfig {
    /// Load from the config file (optional unless a path is given) and the environment
    pub fn load(path: Option<&str>) -> Result<Self, ApiError> {
        let file = File::with_name(path.unwrap_or(DEFAULT_CONFIG_FILE)).required(path.is_some());
        let config = Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix("PROCTOR").separator("__").try_parsing(true))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Parse a TOML document on top of the defaults
    pub fn from_toml(toml: &str) -> Result<Self, ApiError> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
