//! OpenCode adapter: `~/.config/opencode/opencode.json`, remote
//! registrations under the `mcp` key in the `type`/`url`/`enabled` dialect.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{json, Value};

use super::probe::ProcessProbe;
use super::{McpClient, RawConfig};
use crate::errors::{Error, Result};
use crate::models::{ClientKind, Registration, RunningState, Transport, TransportKind, Vertical};
use crate::paths;

const CONFIG_DIR: &str = "opencode";
const CONFIG_FILE: &str = "opencode.json";
const SERVERS_KEY: &str = "mcp";

const PROBE: ProcessProbe = ProcessProbe {
    unix_name: "opencode",
    exact: false,
    windows_image: "opencode.exe",
};

pub struct OpenCode {
    path_override: Option<PathBuf>,
}

impl OpenCode {
    pub fn new(path_override: Option<PathBuf>) -> Self {
        OpenCode { path_override }
    }

    // OpenCode calls HTTP servers "remote" and wants new entries enabled.
    fn remote_entry(server: &Registration) -> Result<Value> {
        match &server.transport {
            Transport::Http { url, headers } => Ok(json!({
                "type": "remote",
                "url": url,
                "enabled": true,
                "headers": headers,
            })),
            Transport::Stdio { .. } => Err(Error::ConfigInvalid(
                "this client stores a remote server descriptor".to_string(),
            )),
        }
    }
}

impl McpClient for OpenCode {
    fn kind(&self) -> ClientKind {
        ClientKind::Opencode
    }

    fn transport_kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn config_path(&self) -> Result<PathBuf> {
        match &self.path_override {
            Some(path) => Ok(path.clone()),
            None => paths::xdg_config_path(CONFIG_DIR, CONFIG_FILE),
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
        let entry = OpenCode::remote_entry(server)?;
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
