//! Application configuration management.
//!
//! Settings are layered with figment, later layers overriding earlier ones:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file: the path given on the command line, otherwise
//!    `config.toml` in the platform-specific config directory (if present)
//! 3. Environment variables prefixed with `DRIVEDEDUP_`
//!    (e.g. `DRIVEDEDUP_HASH_WORKERS=8`)

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::logging::DEFAULT_LOG_FILE;
use crate::pool::DEFAULT_CHUNK_SIZE;

/// Prefix for configuration environment variables.
pub const ENV_PREFIX: &str = "DRIVEDEDUP_";

/// Errors raised while loading or saving configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A provider failed or a value had the wrong type.
    #[error("Failed to load configuration: {0}")]
    Load(#[source] Box<figment::Error>),

    /// Values parsed but are out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Writing the configuration file failed.
    #[error("Failed to save configuration to {path}: {message}")]
    Save { path: PathBuf, message: String },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of hash workers (slots `0..hash_workers`).
    pub hash_workers: usize,
    /// Number of copy workers (slots `0..copy_workers`).
    pub copy_workers: usize,
    /// Read size when streaming a file through the digest.
    pub chunk_size: usize,
    /// Jobs each worker may have queued before dispatch blocks.
    pub queue_capacity: usize,
    /// Append-only message log.
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hash_workers: 20,
            copy_workers: 10,
            chunk_size: DEFAULT_CHUNK_SIZE,
            queue_capacity: 1024,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl Config {
    /// Load the layered configuration.
    ///
    /// `explicit` must exist when given; the default config file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::Invalid(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                log::debug!("Loading config from {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = Self::default_path() {
                    log::debug!("Looking for config at {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Extract and validate a configuration from an assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pools cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("hash_workers", self.hash_workers),
            ("copy_workers", self.copy_workers),
            ("chunk_size", self.chunk_size),
            ("queue_capacity", self.queue_capacity),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }

    /// Write the configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let save_error = |message: String| ConfigError::Save {
            path: path.to_path_buf(),
            message,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| save_error(e.to_string()))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| save_error(e.to_string()))?;
        fs::write(path, content).map_err(|e| save_error(e.to_string()))
    }

    /// Platform-specific default config file location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "drivededup", "drivededup")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.hash_workers, 20);
        assert_eq!(config.copy_workers, 10);
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.log_file, PathBuf::from(".application-logger.log"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_layer_overrides_defaults() {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string("hash_workers = 4\nchunk_size = 65536"));
        let config = Config::from_figment(figment).unwrap();

        assert_eq!(config.hash_workers, 4);
        assert_eq!(config.chunk_size, 65536);
        assert_eq!(config.copy_workers, 10);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string("copy_workers = 0"));
        let err = Config::from_figment(figment).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("copy_workers"));
    }

    #[test]
    fn test_wrong_type_is_load_error() {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string("hash_workers = \"many\""));
        assert!(matches!(
            Config::from_figment(figment),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_save_then_load_explicit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            hash_workers: 3,
            queue_capacity: 8,
            ..Config::default()
        };

        config.save(&path).unwrap();
        let loaded = Config::from_figment(
            Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(&path)),
        )
        .unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let dir = tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
