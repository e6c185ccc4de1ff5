pub mod data;
pub mod env;
pub mod io;
pub mod printing;


pub use data::{BridgeConfig, Config, ConnectionConfig, FileConfig, Mode};
pub use io::ConfigError;

use std::path::Path;

/// Command-line values that take precedence over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub mode: Option<Mode>,
    pub no_auto_connect: bool,
}

impl Config {
    /// Resolves defaults, then the TOML file, then `lookup` (environment), then `overrides`.
    ///
    /// `config_path` set means the file must exist; otherwise the platform default
    /// path is consulted and silently skipped when absent.
    pub fn resolve<F>(
        config_path: Option<&Path>,
        lookup: F,
        overrides: &ConfigOverrides,
    ) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match config_path {
            Some(path) => FileConfig::load_required(path)?,
            None => match io::default_config_path() {
                Some(path) => FileConfig::load_from_path(&path)?,
                None => FileConfig::default(),
            },
        };

        let mut config = Config::default();
        file.apply_to(&mut config);
        if config.connection.port == 0 {
            return Err(ConfigError::InvalidPort {
                source: "port",
                value: "0".to_string(),
            });
        }
        env::apply_env(&mut config, lookup)?;

        if let Some(mode) = overrides.mode {
            config.mode = mode;
        }
        if overrides.no_auto_connect {
            config.auto_connect = false;
        }
        Ok(config)
    }

    /// Resolves against the real process environment.
    pub fn load(
        config_path: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Config, ConfigError> {
        Self::resolve(config_path, |name| std::env::var(name).ok(), overrides)
    }
}
