//! Boot configuration.
//!
//! ```toml
//! data_root = "/var/lib/trellis"
//! event_capacity = 2048
//! ```
//!
//! Precedence, highest first: the config file, then `TRELLIS_DATA_ROOT`,
//! then built-in defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use trellis_events::DEFAULT_CHANNEL_CAPACITY;

/// Environment variable consulted when the config file sets no data root.
pub const DATA_ROOT_ENV: &str = "TRELLIS_DATA_ROOT";

/// Fallback data root when no platform data directory is available.
const FALLBACK_DATA_ROOT: &str = ".trellis/data";

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Errors raised while loading a [`BootConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// The file path.
        path: String,
        /// The I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// The file path, or `<inline>`.
        path: String,
        /// The TOML error.
        source: toml::de::Error,
    },

    /// A value failed validation.
    #[error("invalid config value for {field}: {message}")]
    Invalid {
        /// The offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

/// A specialized Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings the kernel needs to boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootConfig {
    /// Root directory handed to path-scoped capability factories.
    pub data_root: PathBuf,
    /// Capacity of the event bus broadcast channel.
    pub event_capacity: usize,
}

/// On-disk form: every field optional so fallbacks can fill the gaps.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBootConfig {
    data_root: Option<PathBuf>,
    event_capacity: Option<usize>,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            event_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl BootConfig {
    /// Parse and validate a config from TOML. Environment fallbacks are
    /// not consulted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let raw = parse(content, "<inline>")?;
        let config = resolve(raw, None);
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, falling back to `TRELLIS_DATA_ROOT` and defaults.
    ///
    /// A missing file is not an error: defaults and environment fallbacks
    /// apply.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file exists but cannot be read,
    /// parsed or validated.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let env_data_root = std::env::var_os(DATA_ROOT_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self::load_with_env(path, env_data_root)
    }

    pub(crate) fn load_with_env(
        path: &Path,
        env_data_root: Option<PathBuf>,
    ) -> ConfigResult<Self> {
        let raw = match std::fs::metadata(path) {
            Ok(metadata) => {
                if metadata.len() > MAX_CONFIG_FILE_SIZE {
                    return Err(ConfigError::Invalid {
                        field: path.display().to_string(),
                        message: format!(
                            "config file is {} bytes, exceeding the {} byte limit",
                            metadata.len(),
                            MAX_CONFIG_FILE_SIZE
                        ),
                    });
                }
                let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                    path: path.display().to_string(),
                    source: e,
                })?;
                debug!(path = %path.display(), "loaded boot config");
                parse(&content, &path.display().to_string())?
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "boot config not found, using defaults");
                RawBootConfig::default()
            },
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source: e,
                });
            },
        };

        let config = resolve(raw, env_data_root);
        config.validate()?;
        Ok(config)
    }

    /// Override the data root.
    #[must_use]
    pub fn with_data_root(mut self, data_root: impl Into<PathBuf>) -> Self {
        self.data_root = data_root.into();
        self
    }

    /// Override the event bus capacity.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Check field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty data root or a zero
    /// event capacity.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "data_root".into(),
                message: "must not be empty".into(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "event_capacity".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

fn parse(content: &str, path: &str) -> ConfigResult<RawBootConfig> {
    toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}

fn resolve(raw: RawBootConfig, env_data_root: Option<PathBuf>) -> BootConfig {
    BootConfig {
        data_root: raw
            .data_root
            .or(env_data_root)
            .unwrap_or_else(default_data_root),
        event_capacity: raw.event_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY),
    }
}

fn default_data_root() -> PathBuf {
    directories::ProjectDirs::from("", "", "trellis")
        .map_or_else(|| PathBuf::from(FALLBACK_DATA_ROOT), |dirs| dirs.data_dir().to_path_buf())
}
