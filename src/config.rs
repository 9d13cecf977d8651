//! Application configuration

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;
use tracing::warn;

use crate::errors::TrackerError;
use crate::models::SeedVehicle;

/// Port used when neither `PORT` nor a config source sets one
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub hub: HubConfig,
    #[serde(default)]
    pub seed: Vec<SeedVehicle>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub busy_timeout: Duration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HubConfig {
    /// Capacity of each viewer's outbound channel
    pub session_buffer: usize,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config/default")
    }

    /// Load configuration with `file` as the optional base layer.
    ///
    /// Precedence, lowest first: built-in defaults, `file`, `TRACKER__*`
    /// variables, and finally `PORT`.
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", i64::from(DEFAULT_PORT))?
            .set_default("database.path", "tracking.db")?
            .set_default("database.max_connections", 5)?
            .set_default("database.busy_timeout", 5)?
            .set_default("hub.session_buffer", 64)?
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("TRACKER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.port", port_from_env().map(i64::from))?
            .build()?;

        config.try_deserialize()
    }
}

fn port_from_env() -> Option<u16> {
    let raw = env::var("PORT").ok()?;
    match raw.trim().parse() {
        Ok(port) => Some(port),
        Err(e) => {
            warn!("Ignoring invalid PORT value {:?}: {}", raw, e);
            None
        }
    }
}

impl DatabaseConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), TrackerError> {
        self.validate_path()?;
        self.validate_pool()?;
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                self.ensure_directory_exists(dir)?;
            }
        }
        Ok(())
    }

    fn validate_path(&self) -> Result<(), TrackerError> {
        if self.path.as_os_str().is_empty() {
            return Err(TrackerError::ConfigurationError {
                message: "Database path cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    fn validate_pool(&self) -> Result<(), TrackerError> {
        if self.max_connections == 0 {
            return Err(TrackerError::ConfigurationError {
                message: "Database max_connections must be greater than zero".to_string(),
            });
        }
        if self.busy_timeout.is_zero() {
            return Err(TrackerError::ConfigurationError {
                message: "Database busy_timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    fn ensure_directory_exists(&self, dir: &Path) -> Result<(), TrackerError> {
        if !dir.exists() {
            warn!("Database directory does not exist, attempting to create it");
            std::fs::create_dir_all(dir).map_err(|e| TrackerError::ConfigurationError {
                message: format!("Could not create database directory: {}", e),
            })?;
        }
        Ok(())
    }
}

impl HubConfig {
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.session_buffer == 0 {
            return Err(TrackerError::ConfigurationError {
                message: "Hub session_buffer must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
