//! Claude Desktop adapter: `claude_desktop_config.json` under the platform
//! application-support directory, stdio launch specs under `mcpServers`.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use super::probe::ProcessProbe;
use super::{McpClient, RawConfig};
use crate::errors::Result;
use crate::models::{ClientKind, Registration, RunningState, TransportKind, Vertical};
use crate::paths;

const APP_NAME: &str = "Claude";
const CONFIG_FILE: &str = "claude_desktop_config.json";
const SERVERS_KEY: &str = "mcpServers";

const PROBE: ProcessProbe = ProcessProbe {
    unix_name: "Claude",
    exact: true,
    windows_image: "Claude.exe",
};

pub struct ClaudeDesktop {
    path_override: Option<PathBuf>,
}

impl ClaudeDesktop {
    pub fn new(path_override: Option<PathBuf>) -> Self {
        ClaudeDesktop { path_override }
    }
}

impl McpClient for ClaudeDesktop {
    fn kind(&self) -> ClientKind {
        ClientKind::Claude
    }

    fn transport_kind(&self) -> TransportKind {
        TransportKind::Stdio
    }

    fn config_path(&self) -> Result<PathBuf> {
        match &self.path_override {
            Some(path) => Ok(path.clone()),
            None => paths::platform_config_path(APP_NAME, CONFIG_FILE),
        }
    }

    fn load_config(&self) -> Result<RawConfig> {
        let path = self.config_path()?;
        let config = super::load_json(&path)?;
        debug!(path = %path.display(), "loaded Claude Desktop config");
        Ok(config)
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
