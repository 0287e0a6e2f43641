//! Runtime configuration.
//!
//! Each field resolves independently: CLI flag or environment variable (both
//! handled by clap) > `<data_dir>/config.toml` > built-in default.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use sprinklr_gateway::GatewayConfig;
use thiserror::Error;

pub const DEFAULT_API_SERVER: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 8;
pub const DEFAULT_TICK_MILLIS: u64 = 1_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine a home directory; pass --data-dir or set SPRINKLR_DATA_DIR")]
    NoHomeDir,

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("api_server must not be empty")]
    EmptyApiServer,
}

/// Shape of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_server: Option<String>,
    pub timeout_secs: Option<u64>,
    pub tick_millis: Option<u64>,
}

impl FileConfig {
    /// A missing file is an empty config.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_server: Option<String>,
    pub timeout_secs: Option<u64>,
    pub tick_millis: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_server: String,
    pub timeout: Duration,
    pub tick: Duration,
}

impl Config {
    pub fn load(path: &Path, overrides: Overrides) -> Result<Self, ConfigError> {
        Self::resolve(FileConfig::read(path)?, overrides)
    }

    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self, ConfigError> {
        let api_server = overrides
            .api_server
            .or(file.api_server)
            .unwrap_or_else(|| DEFAULT_API_SERVER.to_string());
        if api_server.trim().is_empty() {
            return Err(ConfigError::EmptyApiServer);
        }

        let timeout_secs = overrides
            .timeout_secs
            .or(file.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "timeout_secs",
            });
        }

        let tick_millis = overrides
            .tick_millis
            .or(file.tick_millis)
            .unwrap_or(DEFAULT_TICK_MILLIS);
        if tick_millis == 0 {
            return Err(ConfigError::Zero {
                field: "tick_millis",
            });
        }

        Ok(Self {
            api_server: api_server.trim().to_string(),
            timeout: Duration::from_secs(timeout_secs),
            tick: Duration::from_millis(tick_millis),
        })
    }

    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            timeout: self.timeout,
            ..GatewayConfig::new(self.api_server.clone())
        }
    }
}
