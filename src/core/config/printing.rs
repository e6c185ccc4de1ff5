use super::data::Config;

impl Config {
    /// Renders the effective configuration as TOML for `--print-config`.
    pub fn to_display_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// One-line startup summary.
    pub fn summary(&self) -> String {
        format!(
            "mode={}, endpoint={}, username={}, autoConnect={}, bridge={}",
            self.mode,
            self.connection.endpoint(),
            self.connection.username,
            self.auto_connect,
            self.bridge.address
        )
    }
}
