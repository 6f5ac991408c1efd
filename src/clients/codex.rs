//! OpenAI Codex CLI adapter: `~/.codex/config.toml` (the `CODEX_HOME`
//! override is honored), remote registrations under the `mcp_servers`
//! table.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use toml::value::Table;
use toml::Value;

use super::probe::ProcessProbe;
use super::{mask_header_value, McpClient, RawConfig};
use crate::backup;
use crate::errors::{Error, Result};
use crate::models::{
    ClientKind, Registration, RunningState, Transport, TransportKind, Vertical, SERVER_BASE_NAME,
};
use crate::paths;

const CONFIG_DIR: &str = ".codex";
const CONFIG_FILE: &str = "config.toml";
const SERVERS_KEY: &str = "mcp_servers";
const ENV_CODEX_HOME: &str = "CODEX_HOME";

const PROBE: ProcessProbe = ProcessProbe {
    unix_name: "codex",
    exact: false,
    windows_image: "codex.exe",
};

pub struct Codex {
    path_override: Option<PathBuf>,
}

impl Codex {
    pub fn new(path_override: Option<PathBuf>) -> Self {
        Codex { path_override }
    }

    fn doc<'a>(&self, config: &'a RawConfig) -> Result<&'a Table> {
        match config {
            RawConfig::Toml(Value::Table(table)) => Ok(table),
            _ => Err(Error::ConfigInvalid(
                "expected a TOML document for this client".to_string(),
            )),
        }
    }

    fn http_entry(server: &Registration) -> Result<Value> {
        match &server.transport {
            Transport::Http { url, headers } => {
                let mut entry = Table::new();
                entry.insert("url".to_string(), Value::String(url.clone()));
                let mut header_table = Table::new();
                for (k, v) in headers {
                    header_table.insert(k.clone(), Value::String(v.clone()));
                }
                entry.insert("http_headers".to_string(), Value::Table(header_table));
                Ok(Value::Table(entry))
            }
            Transport::Stdio { .. } => Err(Error::ConfigInvalid(
                "this client stores a remote server descriptor".to_string(),
            )),
        }
    }

    fn describe_entry(name: &str, entry: &Value) -> String {
        let mut out = format!("Server: {}\n", name);
        if let Some(url) = entry.get("url").and_then(Value::as_str) {
            out.push_str(&format!("  URL: {}\n", url));
        }
        if let Some(headers) = entry.get("http_headers").and_then(Value::as_table) {
            if !headers.is_empty() {
                out.push_str("  Headers:\n");
                for (k, v) in headers {
                    if let Some(v) = v.as_str() {
                        out.push_str(&format!("    {}: {}\n", k, mask_header_value(k, v)));
                    }
                }
            }
        }
        out
    }
}

impl McpClient for Codex {
    fn kind(&self) -> ClientKind {
        ClientKind::Codex
    }

    fn transport_kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn config_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path_override {
            return Ok(path.clone());
        }
        if let Some(home) = paths::env_override(ENV_CODEX_HOME) {
            return Ok(home.join(CONFIG_FILE));
        }
        paths::home_config_path(CONFIG_DIR, CONFIG_FILE)
    }

    fn load_config(&self) -> Result<RawConfig> {
        let path = self.config_path()?;
        match backup::read_optional(&path)? {
            None => Ok(RawConfig::Toml(Value::Table(Table::new()))),
            Some(content) => {
                let doc: Value = toml::from_str(&content).map_err(|e| Error::ConfigParse {
                    path,
                    detail: e.to_string(),
                })?;
                Ok(RawConfig::Toml(doc))
            }
        }
    }

    fn validate_config(&self, config: &RawConfig) -> Result<()> {
        let doc = self.doc(config)?;
        if let Some(servers) = doc.get(SERVERS_KEY) {
            if !servers.is_table() {
                return Err(Error::ConfigInvalid(format!(
                    "'{}' must be a table",
                    SERVERS_KEY
                )));
            }
        }
        Ok(())
    }

    fn has_server(&self, config: &RawConfig, vertical: Vertical) -> Result<bool> {
        let doc = self.doc(config)?;
        Ok(doc
            .get(SERVERS_KEY)
            .and_then(Value::as_table)
            .map(|servers| servers.contains_key(&vertical.server_name()))
            .unwrap_or(false))
    }

    fn server_config(&self, config: &RawConfig, vertical: Vertical) -> Result<Registration> {
        let name = vertical.server_name();
        let doc = self.doc(config)?;
        let entry = doc
            .get(SERVERS_KEY)
            .and_then(Value::as_table)
            .and_then(|servers| servers.get(&name))
            .ok_or_else(|| Error::ServerNotFound(name.clone()))?;

        let url = entry
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::ConfigInvalid(format!("server entry '{}' has no url", name)))?;
        let headers: BTreeMap<String, String> = entry
            .get("http_headers")
            .and_then(Value::as_table)
            .map(|t| {
                t.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Registration {
            name,
            transport: Transport::Http {
                url: url.to_string(),
                headers,
            },
        })
    }

    fn add_server(&self, config: RawConfig, server: &Registration) -> Result<RawConfig> {
        self.validate_config(&config)?;
        let entry = Codex::http_entry(server)?;
        let RawConfig::Toml(Value::Table(mut doc)) = config else {
            return Err(Error::ConfigInvalid(
                "expected a TOML document for this client".to_string(),
            ));
        };

        let servers = doc
            .entry(SERVERS_KEY.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        let servers = servers.as_table_mut().expect("validated above");

        if servers.contains_key(&server.name) {
            return Err(Error::ServerAlreadyExists(server.name.clone()));
        }
        servers.insert(server.name.clone(), entry);
        Ok(RawConfig::Toml(Value::Table(doc)))
    }

    fn remove_server(&self, config: RawConfig, vertical: Vertical) -> Result<RawConfig> {
        self.validate_config(&config)?;
        let name = vertical.server_name();
        let RawConfig::Toml(Value::Table(mut doc)) = config else {
            return Err(Error::ConfigInvalid(
                "expected a TOML document for this client".to_string(),
            ));
        };

        let removed = doc
            .get_mut(SERVERS_KEY)
            .and_then(Value::as_table_mut)
            .map(|servers| servers.remove(&name).is_some())
            .unwrap_or(false);
        if !removed {
            return Err(Error::ServerNotFound(name));
        }

        // An empty [mcp_servers] table is meaningless to Codex; drop it.
        let emptied = doc
            .get(SERVERS_KEY)
            .and_then(Value::as_table)
            .map(Table::is_empty)
            .unwrap_or(false);
        if emptied {
            doc.remove(SERVERS_KEY);
        }
        Ok(RawConfig::Toml(Value::Table(doc)))
    }

    fn save_config(&self, config: &RawConfig) -> Result<()> {
        let path = self.config_path()?;
        let RawConfig::Toml(doc) = config else {
            return Err(Error::ConfigInvalid(
                "expected a TOML document for this client".to_string(),
            ));
        };
        let content =
            toml::to_string_pretty(doc).map_err(|e| Error::ConfigInvalid(e.to_string()))?;
        backup::write_atomic(&path, content.as_bytes())
    }

    fn is_running(&self, timeout: Duration) -> RunningState {
        PROBE.run(timeout)
    }

    fn format_config(&self, config: &RawConfig, only_kirha: bool) -> Result<String> {
        let doc = self.doc(config)?;
        let servers = doc.get(SERVERS_KEY).and_then(Value::as_table);

        let mut sections = Vec::new();
        if let Some(servers) = servers {
            for (name, entry) in servers {
                if only_kirha && !name.starts_with(SERVER_BASE_NAME) {
                    continue;
                }
                sections.push(Codex::describe_entry(name, entry));
            }
        }

        if sections.is_empty() {
            return Ok("No MCP servers configured".to_string());
        }
        Ok(sections.join("\n"))
    }

    fn format_server(&self, config: &RawConfig, vertical: Vertical) -> Result<String> {
        let name = vertical.server_name();
        let doc = self.doc(config)?;
        let entry = doc
            .get(SERVERS_KEY)
            .and_then(Value::as_table)
            .and_then(|servers| servers.get(&name))
            .ok_or_else(|| Error::ServerNotFound(name.clone()))?;
        Ok(Codex::describe_entry(&name, entry))
    }
}
