//! Environment overlay: `MC_*` variables applied on top of file values.

use super::data::{non_blank, Config, Mode};
use super::io::ConfigError;

pub const ENV_MODE: &str = "MC_MODE";
pub const ENV_HOST: &str = "MC_HOST";
pub const ENV_PORT: &str = "MC_PORT";
pub const ENV_USERNAME: &str = "MC_USERNAME";
pub const ENV_VERSION: &str = "MC_VERSION";
pub const ENV_AUTO_CONNECT: &str = "MC_AUTO_CONNECT";
pub const ENV_BRIDGE_ADDR: &str = "MC_BRIDGE_ADDR";

pub fn parse_mode(value: &str) -> Result<Mode, ConfigError> {
    Mode::parse(value).ok_or_else(|| ConfigError::InvalidMode(value.to_string()))
}

pub fn parse_port(source: &'static str, value: &str) -> Result<u16, ConfigError> {
    let invalid = || ConfigError::InvalidPort {
        source,
        value: value.to_string(),
    };
    let parsed: i64 = value.trim().parse().map_err(|_| invalid())?;
    if !(1..=65535).contains(&parsed) {
        return Err(invalid());
    }
    u16::try_from(parsed).map_err(|_| invalid())
}

pub fn parse_boolean(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBoolean {
            name,
            value: value.to_string(),
        }),
    }
}

/// Applies every recognised variable returned by `lookup`. Blank or
/// whitespace-only values count as unset.
pub fn apply_env<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    if let Some(mode) = get(ENV_MODE) {
        config.mode = parse_mode(&mode)?;
    }
    if let Some(host) = non_blank(get(ENV_HOST)) {
        config.connection.host = host;
    }
    if let Some(port) = get(ENV_PORT) {
        config.connection.port = parse_port(ENV_PORT, &port)?;
    }
    if let Some(username) = non_blank(get(ENV_USERNAME)) {
        config.connection.username = username;
    }
    if let Some(version) = non_blank(get(ENV_VERSION)) {
        config.connection.version = Some(version);
    }
    if let Some(auto_connect) = get(ENV_AUTO_CONNECT) {
        config.auto_connect = parse_boolean(ENV_AUTO_CONNECT, &auto_connect)?;
    }
    if let Some(address) = non_blank(get(ENV_BRIDGE_ADDR)) {
        config.bridge.address = address;
    }
    Ok(())
}
