//! TOML-based core configuration.
//!
//! A missing file yields defaults; every field is optional in the file.

use crate::lifecycle::StreakResetPolicy;
use crate::logging::LogLevel;
use crate::model::habit::DEFAULT_GRACE_SECONDS;
use crate::sync::refresh::{RefreshPolicy, DEFAULT_REFRESH_INTERVAL_SECONDS};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "config io error: {err}"),
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::Serialize(err) => write!(f, "config encode failed: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Serialize(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialize(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Directory holding both databases and the `logs/` folder.
    pub data_dir: PathBuf,
    pub db_file_name: String,
    pub shared_store_file_name: String,
    pub log_level: LogLevel,
    pub default_grace_seconds: i64,
    pub streak_reset_policy: StreakResetPolicy,
    pub widget_refresh_interval_seconds: i64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("habit-data"),
            db_file_name: "habits.sqlite3".to_string(),
            shared_store_file_name: "shared_store.sqlite3".to_string(),
            log_level: LogLevel::build_default(),
            default_grace_seconds: DEFAULT_GRACE_SECONDS,
            streak_reset_policy: StreakResetPolicy::default(),
            widget_refresh_interval_seconds: DEFAULT_REFRESH_INTERVAL_SECONDS,
        }
    }
}

impl CoreConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Reads `path`, or returns defaults when it does not exist.
    ///
    /// # Errors
    /// - `Parse` when the file exists but is not valid config TOML.
    /// - `Io` for any read failure other than a missing file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file_name)
    }

    pub fn shared_store_path(&self) -> PathBuf {
        self.data_dir.join(&self.shared_store_file_name)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        RefreshPolicy::every_seconds(self.widget_refresh_interval_seconds)
    }
}
