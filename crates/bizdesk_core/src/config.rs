//! Core runtime configuration.
//!
//! # Responsibility
//! - Describe store location, logging setup and allocator retry policy.
//! - Load configuration from JSON with per-field defaults.
//!
//! # Invariants
//! - A loaded config is always validated before it is returned.
//! - `log_dir`, when set, is an absolute path (mirrors `init_logging`).

use crate::logging::{default_log_level, normalize_level};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Default number of allocation attempts before a conflict is surfaced.
pub const DEFAULT_ALLOCATOR_MAX_ATTEMPTS: u32 = 3;
const MAX_ALLOCATOR_ATTEMPTS: u32 = 20;

/// Runtime configuration for the core crate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// SQLite file path. `None` selects an in-memory store.
    pub db_path: Option<PathBuf>,
    /// `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute log directory. `None` leaves logging uninitialized.
    pub log_dir: Option<PathBuf>,
    /// Attempts per document allocation when a uniqueness conflict occurs.
    pub allocator_max_attempts: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
            allocator_max_attempts: DEFAULT_ALLOCATOR_MAX_ATTEMPTS,
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if normalize_level(&self.log_level).is_err() {
            return Err(ConfigError::InvalidLogLevel(self.log_level.clone()));
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::RelativeLogDir(dir.clone()));
            }
        }
        if self.allocator_max_attempts == 0 || self.allocator_max_attempts > MAX_ALLOCATOR_ATTEMPTS
        {
            return Err(ConfigError::InvalidAllocatorAttempts(
                self.allocator_max_attempts,
            ));
        }
        Ok(())
    }
}

/// Errors from loading or validating `CoreConfig`.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    InvalidLogLevel(String),
    RelativeLogDir(PathBuf),
    InvalidAllocatorAttempts(u32),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::InvalidLogLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::RelativeLogDir(dir) => write!(
                f,
                "log_dir must be an absolute path, got `{}`",
                dir.display()
            ),
            Self::InvalidAllocatorAttempts(value) => write!(
                f,
                "allocator_max_attempts must be within 1..={MAX_ALLOCATOR_ATTEMPTS}, got {value}"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = CoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.allocator_max_attempts, DEFAULT_ALLOCATOR_MAX_ATTEMPTS);
    }

    #[test]
    fn accepts_every_level_the_logger_accepts() {
        for level in ["trace", "DEBUG", " info ", "warning", "Error"] {
            let raw = format!(r#"{{"log_level": "{level}"}}"#);
            let config = CoreConfig::from_json_str(&raw).unwrap();
            assert_eq!(config.log_level, level);
        }
    }

    #[test]
    fn rejects_unknown_fields_and_bad_values() {
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"db": "x"}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"log_level": "loud"}"#),
            Err(ConfigError::InvalidLogLevel(_))
        ));
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"log_dir": "logs"}"#),
            Err(ConfigError::RelativeLogDir(_))
        ));
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"allocator_max_attempts": 0}"#),
            Err(ConfigError::InvalidAllocatorAttempts(0))
        ));
    }
}
