//! Server configuration module
//!
//! Handles loading and parsing of server configuration from files and environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::backup::BackupInterval;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Server name reported by the status endpoint
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Address the admin listener binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Admin HTTP port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Directory holding the live town files
    #[serde(default = "default_towns_path")]
    pub towns_path: PathBuf,

    /// Town backup configuration
    #[serde(default)]
    pub backup: BackupConfig,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

/// Town backup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Run the periodic backup worker
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Root of the backup tree
    #[serde(default = "default_backup_directory")]
    pub directory: PathBuf,

    /// Interval between runs in hours
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u32,

    /// Interval between runs in seconds (nonzero overrides `interval_hours`)
    #[serde(default)]
    pub interval_seconds: u32,

    /// Extension of town files to back up
    #[serde(default = "default_extension")]
    pub extension: String,
}

// Default value functions
fn default_server_name() -> String {
    "TSTO Server".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    4242
}

fn default_towns_path() -> PathBuf {
    PathBuf::from("towns")
}

fn default_true() -> bool {
    true
}

fn default_backup_directory() -> PathBuf {
    PathBuf::from("town_backups")
}

fn default_interval_hours() -> u32 {
    4
}

fn default_extension() -> String {
    crate::backup::DEFAULT_EXTENSION.to_string()
}

fn parse_flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            directory: default_backup_directory(),
            interval_hours: default_interval_hours(),
            interval_seconds: 0,
            extension: default_extension(),
        }
    }
}

impl BackupConfig {
    /// Interval selected by this configuration
    pub fn interval(&self) -> BackupInterval {
        BackupInterval::from_parts(self.interval_hours, self.interval_seconds)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/server.toml"),
            server_name: default_server_name(),
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            towns_path: default_towns_path(),
            backup: BackupConfig::default(),
            debug: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from file and environment variables
    pub async fn load() -> Result<Self> {
        let config_path = env::var("TSTO_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/server.toml"));

        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

            Self::from_toml(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.config_path = config_path;

        // Override with environment variables
        config.apply_env_overrides();

        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document, filling missing fields with defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("TSTO_SERVER_NAME") {
            self.server_name = val;
        }
        if let Ok(val) = env::var("TSTO_HTTP_PORT") {
            if let Ok(port) = val.parse() {
                self.http_port = port;
            }
        }
        if let Ok(val) = env::var("TSTO_TOWNS_PATH") {
            self.towns_path = PathBuf::from(val);
        }
        if let Ok(val) = env::var("TSTO_DEBUG") {
            self.debug = parse_flag(&val);
        }

        if let Ok(val) = env::var("TSTO_BACKUP_ENABLED") {
            self.backup.enabled = parse_flag(&val);
        }
        if let Ok(val) = env::var("TSTO_BACKUP_DIR") {
            self.backup.directory = PathBuf::from(val);
        }
        if let Ok(val) = env::var("TSTO_BACKUP_INTERVAL_HOURS") {
            if let Ok(hours) = val.parse() {
                self.backup.interval_hours = hours;
            }
        }
        if let Ok(val) = env::var("TSTO_BACKUP_INTERVAL_SECONDS") {
            if let Ok(seconds) = val.parse() {
                self.backup.interval_seconds = seconds;
            }
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.http_port == 0 {
            anyhow::bail!("HTTP port must be nonzero");
        }

        if self.backup.interval_hours == 0 && self.backup.interval_seconds == 0 {
            anyhow::bail!("Backup interval must be nonzero");
        }

        if self.backup.directory.as_os_str().is_empty() {
            anyhow::bail!("Backup directory must not be empty");
        }

        if self.backup.extension.trim_start_matches('.').is_empty() {
            anyhow::bail!("Backup file extension must not be empty");
        }

        Ok(())
    }

    /// Socket address string for the admin listener
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.http_port)
    }
}
