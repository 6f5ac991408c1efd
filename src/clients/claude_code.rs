//! Claude Code adapter: `~/.claude-code/config.json`, stdio launch specs
//! under `mcpServers`.

use std::path::PathBuf;
use std::time::Duration;

use super::probe::ProcessProbe;
use super::{McpClient, RawConfig};
use crate::errors::Result;
use crate::models::{ClientKind, Registration, RunningState, TransportKind, Vertical};
use crate::paths;

const CONFIG_DIR: &str = ".claude-code";
const CONFIG_FILE: &str = "config.json";
const SERVERS_KEY: &str = "mcpServers";

const PROBE: ProcessProbe = ProcessProbe {
    unix_name: "claude-code",
    exact: false,
    windows_image: "claude-code.exe",
};

pub struct ClaudeCode {
    path_override: Option<PathBuf>,
}

impl ClaudeCode {
    pub fn new(path_override: Option<PathBuf>) -> Self {
        ClaudeCode { path_override }
    }
}

impl McpClient for ClaudeCode {
    fn kind(&self) -> ClientKind {
        ClientKind::ClaudeCode
    }

    fn transport_kind(&self) -> TransportKind {
        TransportKind::Stdio
    }

    fn config_path(&self) -> Result<PathBuf> {
        match &self.path_override {
            Some(path) => Ok(path.clone()),
            None => paths::home_config_path(CONFIG_DIR, CONFIG_FILE),
        }
    }

    fn load_config(&self) -> Result<RawConfig> {
        super::load_json(&self.config_path()?)
    }

    fn validate_config(&self, config: &RawConfig) -> Result<()> {
        super::validate_json(config, SERVERS_KEY)
    }

    fn has_server(&self, config: &RawConfig, vertical: Vertical) -> Result<bool> {
        super::json_has(config, SERVERS_KEY, &vertical.server_name())
    }

    fn server_config(&self, config: &RawConfig, vertical: Vertical) -> Result<Registration> {
        super::json_get(config, SERVERS_KEY, &vertical.server_name())
    }

    fn add_server(&self, config: RawConfig, server: &Registration) -> Result<RawConfig> {
        let entry = super::stdio_entry(server)?;
        super::json_add(config, SERVERS_KEY, &server.name, entry)
    }

    fn remove_server(&self, config: RawConfig, vertical: Vertical) -> Result<RawConfig> {
        super::json_remove(config, SERVERS_KEY, &vertical.server_name())
    }

    fn save_config(&self, config: &RawConfig) -> Result<()> {
        super::save_json(&self.config_path()?, config)
    }

    fn is_running(&self, timeout: Duration) -> RunningState {
        PROBE.run(timeout)
    }

    fn format_config(&self, config: &RawConfig, only_kirha: bool) -> Result<String> {
        super::format_json_config(config, SERVERS_KEY, only_kirha)
    }

    fn format_server(&self, config: &RawConfig, vertical: Vertical) -> Result<String> {
        super::format_json_server(config, SERVERS_KEY, &vertical.server_name())
    }
}
