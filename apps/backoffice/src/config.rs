//! # Back-Office Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BODEGA_DB_PATH=/srv/bodega/bodega.db                               │
//! │     BODEGA_UTC_OFFSET_MINUTES=-300                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/backoffice/bodega.toml (Linux)                           │
//! │     ~/Library/Application Support/com.bodega.backoffice/bodega.toml    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/srv/bodega/bodega.db"
//! max_connections = 5
//!
//! [media]
//! root = "/srv/bodega/media"
//! base_url = "/media"
//!
//! [reports]
//! utc_offset_minutes = -300   # local time used by date filters and reports
//!
//! [logging]
//! filter = "info,bodega=debug,sqlx=warn"
//! ```

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "bodega", "backoffice")
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Created on first start.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("bodega.db"))
        .unwrap_or_else(|| PathBuf::from("./bodega.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSettings {
    /// Directory holding uploaded images and history snapshots.
    #[serde(default = "default_media_root")]
    pub root: PathBuf,

    /// Prefix of the URLs embedded in history details.
    #[serde(default = "default_media_url")]
    pub base_url: String,
}

fn default_media_root() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("media"))
        .unwrap_or_else(|| PathBuf::from("./media"))
}

fn default_media_url() -> String {
    "/media".to_string()
}

impl Default for MediaSettings {
    fn default() -> Self {
        MediaSettings {
            root: default_media_root(),
            base_url: default_media_url(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Offset of the shop's local time from UTC. Date filters, the
    /// "today" export default and printed dates use it.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` wins.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

pub fn default_log_filter() -> String {
    "info,bodega=debug,sqlx=warn".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// App Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub media: MediaSettings,

    #[serde(default)]
    pub reports: ReportSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`bodega.toml`, or `config_path`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.reports.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::Invalid(format!(
                "reports.utc_offset_minutes must be within ±1439, got {}",
                self.reports.utc_offset_minutes
            )));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("BODEGA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("BODEGA_DB_MAX_CONNECTIONS") {
            if let Ok(m) = max.parse::<u32>() {
                self.database.max_connections = m;
            }
        }

        if let Ok(root) = std::env::var("BODEGA_MEDIA_ROOT") {
            self.media.root = PathBuf::from(root);
        }

        if let Ok(url) = std::env::var("BODEGA_MEDIA_URL") {
            self.media.base_url = url;
        }

        if let Ok(offset) = std::env::var("BODEGA_UTC_OFFSET_MINUTES") {
            match offset.parse::<i32>() {
                Ok(m) => self.reports.utc_offset_minutes = m,
                Err(_) => warn!(offset = %offset, "Ignoring non-numeric UTC offset in environment"),
            }
        }

        if let Ok(filter) = std::env::var("BODEGA_LOG") {
            self.logging.filter = filter;
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("bodega.toml"))
    }

    /// The shop's local offset. Falls back to UTC for an offset that
    /// `validate` would reject.
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.reports.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}
