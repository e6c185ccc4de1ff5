use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 25565;
pub const DEFAULT_USERNAME: &str = "mcp-bot";
pub const DEFAULT_AUTO_CONNECT: bool = true;
pub const DEFAULT_BRIDGE_ADDRESS: &str = "127.0.0.1:25580";

/// Operating mode; selects which tool set and client capabilities are exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Creative,
    Survival,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Creative => "creative",
            Mode::Survival => "survival",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "creative" => Some(Mode::Creative),
            "survival" => Some(Mode::Survival),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Protocol version string forwarded to the game client; auto-negotiated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: DEFAULT_USERNAME.to_string(),
            version: None,
        }
    }
}

impl ConnectionConfig {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// `host:port` of the protocol sidecar speaking newline-delimited JSON.
    pub address: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_BRIDGE_ADDRESS.to_string(),
        }
    }
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub mode: Mode,
    pub auto_connect: bool,
    pub connection: ConnectionConfig,
    pub bridge: BridgeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            auto_connect: DEFAULT_AUTO_CONNECT,
            connection: ConnectionConfig::default(),
            bridge: BridgeConfig::default(),
        }
    }
}

/// On-disk shape. Every key is optional so a file may set only what it needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub mode: Option<Mode>,
    pub auto_connect: Option<bool>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub version: Option<String>,
    pub bridge_address: Option<String>,
}

impl FileConfig {
    pub fn apply_to(self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(auto_connect) = self.auto_connect {
            config.auto_connect = auto_connect;
        }
        if let Some(host) = non_blank(self.host) {
            config.connection.host = host;
        }
        if let Some(port) = self.port {
            config.connection.port = port;
        }
        if let Some(username) = non_blank(self.username) {
            config.connection.username = username;
        }
        if let Some(version) = non_blank(self.version) {
            config.connection.version = Some(version);
        }
        if let Some(address) = non_blank(self.bridge_address) {
            config.bridge.address = address;
        }
    }
}

/// Trims a value and treats an all-whitespace string as unset.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();
    if let Some(home) = directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()) {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
