//! Core runtime configuration.
//!
//! # Responsibility
//! - Load `CoreConfig` from TOML with per-field defaults.
//! - Reject values that would make storage or uploads unusable.
//!
//! # Invariants
//! - Every field has a default; an empty file is a valid configuration.
//! - A validated config never carries zero limits or an empty media url.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Config load/validation error.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    Io { path: PathBuf, source: std::io::Error },
    /// TOML content does not match the config schema.
    Parse(toml::de::Error),
    /// Parsed value is outside its allowed range.
    Invalid { field: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config toml: {err}"),
            Self::Invalid { field, message } => write!(f, "invalid config {field}: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid { .. } => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

/// Top-level configuration for the workbench core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Directory that receives uploaded media files.
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    /// Public URL prefix for files under `media_root`.
    #[serde(default = "default_media_url")]
    pub media_url: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log directory; logging stays disabled when absent.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub image: ImageSettings,
    #[serde(default)]
    pub search: SearchSettings,
}

/// Image upload limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSettings {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Longest side of a stored image, in pixels.
    #[serde(default = "default_max_side")]
    pub max_side: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Maximum hits returned per result group.
    #[serde(default = "default_result_cap")]
    pub result_cap: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("workbench.sqlite3")
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

fn default_media_url() -> String {
    "/media/".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_max_side() -> u32 {
    2000
}

fn default_result_cap() -> u32 {
    50
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            media_root: default_media_root(),
            media_url: default_media_url(),
            log_level: default_log_level(),
            log_dir: None,
            image: ImageSettings::default(),
            search: SearchSettings::default(),
        }
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            max_side: default_max_side(),
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            result_cap: default_result_cap(),
        }
    }
}

impl CoreConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates TOML content.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.media_url.trim().is_empty() {
            return Err(invalid("media_url", "must not be empty"));
        }
        if self.log_level.trim().is_empty() {
            return Err(invalid("log_level", "must not be empty"));
        }
        if self.image.max_upload_bytes == 0 {
            return Err(invalid("image.max_upload_bytes", "must be greater than 0"));
        }
        if self.image.max_side == 0 {
            return Err(invalid("image.max_side", "must be greater than 0"));
        }
        if self.search.result_cap == 0 {
            return Err(invalid("search.result_cap", "must be greater than 0"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};

    #[test]
    fn empty_toml_yields_defaults() {
        let config = CoreConfig::from_toml_str("").expect("empty config should parse");
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.image.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.image.max_side, 2000);
        assert_eq!(config.search.result_cap, 50);
    }

    #[test]
    fn zero_max_side_is_rejected() {
        let err = CoreConfig::from_toml_str("[image]\nmax_side = 0\n")
            .expect_err("zero side should fail");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "image.max_side",
                ..
            }
        ));
    }
}
