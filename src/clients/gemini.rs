//! Gemini CLI adapter: `~/.gemini/settings.json`, remote registrations
//! under `mcpServers` in the `httpUrl`/`headers` dialect.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{json, Value};

use super::probe::ProcessProbe;
use super::{McpClient, RawConfig};
use crate::errors::{Error, Result};
use crate::models::{ClientKind, Registration, RunningState, Transport, TransportKind, Vertical};
use crate::paths;

const CONFIG_DIR: &str = ".gemini";
const CONFIG_FILE: &str = "settings.json";
const SERVERS_KEY: &str = "mcpServers";

const PROBE: ProcessProbe = ProcessProbe {
    unix_name: "gemini",
    exact: false,
    windows_image: "gemini.exe",
};

pub struct Gemini {
    path_override: Option<PathBuf>,
}

impl Gemini {
    pub fn new(path_override: Option<PathBuf>) -> Self {
        Gemini { path_override }
    }

    fn http_entry(server: &Registration) -> Result<Value> {
        match &server.transport {
            Transport::Http { url, headers } => Ok(json!({
                "httpUrl": url,
                "headers": headers,
            })),
            Transport::Stdio { .. } => Err(Error::ConfigInvalid(
                "this client stores a remote server descriptor".to_string(),
            )),
        }
    }
}

impl McpClient for Gemini {
    fn kind(&self) -> ClientKind {
        ClientKind::Gemini
    }

    fn transport_kind(&self) -> TransportKind {
        TransportKind::Http
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
        let entry = Gemini::http_entry(server)?;
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
