use crate::core::config::data::{path_display, FileConfig};
use directories::ProjectDirs;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors that can occur while assembling the runtime configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse the configuration file as valid TOML.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// An explicitly requested configuration file does not exist.
    Missing { path: PathBuf },

    /// `MC_MODE` (or `--mode`) named something other than creative/survival.
    InvalidMode(String),

    /// A port outside 1-65535 or not an integer.
    InvalidPort { source: &'static str, value: String },

    /// A boolean flag value outside the accepted spellings.
    InvalidBoolean { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(
                    f,
                    "Failed to read config at {}: {}",
                    path_display(path),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "Failed to parse config at {}: {}",
                    path_display(path),
                    source
                )
            }
            ConfigError::Missing { path } => {
                write!(f, "Config file not found: {}", path_display(path))
            }
            ConfigError::InvalidMode(value) => write!(
                f,
                "Invalid MC_MODE: '{value}'. Expected 'creative' or 'survival'."
            ),
            ConfigError::InvalidPort { source, value } => write!(
                f,
                "Invalid {source}: '{value}'. Expected integer in range 1-65535."
            ),
            ConfigError::InvalidBoolean { name, value } => write!(
                f,
                "Invalid {name}: '{value}'. Expected true/false, 1/0, yes/no, on/off."
            ),
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl FileConfig {
    /// Reads a TOML config file; a missing file yields an empty config.
    pub fn load_from_path(config_path: &Path) -> Result<FileConfig, ConfigError> {
        if !config_path.exists() {
            return Ok(FileConfig::default());
        }
        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })
    }

    /// Like [`FileConfig::load_from_path`] but the file must exist.
    pub fn load_required(config_path: &Path) -> Result<FileConfig, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::Missing {
                path: config_path.to_path_buf(),
            });
        }
        Self::load_from_path(config_path)
    }
}

pub(crate) fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "minecraft-mcp", "minecraft-mcp")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
