//! Client adapters: one per target tool, all behind the [`McpClient`]
//! contract. The orchestrator only ever talks to this trait; the concrete
//! config dialect (JSON, TOML, YAML) stays private to each adapter.

pub mod claude;
pub mod claude_code;
pub mod codex;
pub mod cursor;
pub mod docker;
pub mod gemini;
pub mod opencode;
pub mod probe;
pub mod vscode;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Value};

use crate::backup;
use crate::errors::{Error, Result};
use crate::masking::mask_api_key;
use crate::models::{
    ClientKind, Registration, RunningState, Transport, TransportKind, Vertical, ENV_API_KEY,
    HEADER_AUTHORIZATION, SERVER_BASE_NAME,
};

/// A target tool's entire config file, parsed. The orchestrator passes this
/// value back through the owning adapter's operations and never inspects it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawConfig {
    Json(Value),
    Toml(toml::Value),
    Yaml(serde_yaml::Value),
}

/// Capability contract every client adapter implements.
pub trait McpClient {
    fn kind(&self) -> ClientKind;

    /// Registration shape this tool's config stores.
    fn transport_kind(&self) -> TransportKind;

    /// Platform- and tool-specific config file location.
    fn config_path(&self) -> Result<PathBuf>;

    /// Read and parse the config file. A missing file yields a fresh empty
    /// config, not an error.
    fn load_config(&self) -> Result<RawConfig>;

    /// Structural sanity check, run before mutating and after re-reading a
    /// just-written file.
    fn validate_config(&self, config: &RawConfig) -> Result<()>;

    fn has_server(&self, config: &RawConfig, vertical: Vertical) -> Result<bool>;

    fn server_config(&self, config: &RawConfig, vertical: Vertical) -> Result<Registration>;

    /// Insert the registration, preserving all unrelated entries and keys.
    /// Fails with `ServerAlreadyExists` rather than silently overwriting.
    fn add_server(&self, config: RawConfig, server: &Registration) -> Result<RawConfig>;

    /// Remove exactly the named registration, preserving everything else.
    fn remove_server(&self, config: RawConfig, vertical: Vertical) -> Result<RawConfig>;

    /// Serialize and atomically replace the file on disk.
    fn save_config(&self, config: &RawConfig) -> Result<()>;

    fn backup_config(&self) -> Result<Option<PathBuf>> {
        backup::create_backup(&self.config_path()?)
    }

    fn restore_config(&self, backup_path: &Path) -> Result<()> {
        backup::restore_backup(backup_path, &self.config_path()?)
    }

    /// Best-effort process-presence probe; must honor the timeout.
    fn is_running(&self, timeout: Duration) -> RunningState;

    /// Human-readable rendering of the configured servers, credentials
    /// masked. `only_kirha` filters to entries this tool manages.
    fn format_config(&self, config: &RawConfig, only_kirha: bool) -> Result<String>;

    fn format_server(&self, config: &RawConfig, vertical: Vertical) -> Result<String>;
}

/// The adapter registry: the one place that knows the full client set.
pub fn adapter_for(kind: ClientKind, path_override: Option<PathBuf>) -> Box<dyn McpClient> {
    match kind {
        ClientKind::Claude => Box::new(claude::ClaudeDesktop::new(path_override)),
        ClientKind::ClaudeCode => Box::new(claude_code::ClaudeCode::new(path_override)),
        ClientKind::Cursor => Box::new(cursor::Cursor::new(path_override)),
        ClientKind::VsCode => Box::new(vscode::VsCode::new(path_override)),
        ClientKind::Codex => Box::new(codex::Codex::new(path_override)),
        ClientKind::Gemini => Box::new(gemini::Gemini::new(path_override)),
        ClientKind::Opencode => Box::new(opencode::OpenCode::new(path_override)),
        ClientKind::Docker => Box::new(docker::DockerCompose::new(path_override)),
    }
}

// ---------------------------------------------------------------------------
// Shared helpers for the JSON-dialect adapters. Each adapter stores the full
// document as `serde_json::Value` so unrelated user entries and top-level
// keys survive a round trip verbatim.

pub(crate) fn load_json(path: &Path) -> Result<RawConfig> {
    match backup::read_optional(path)? {
        None => Ok(RawConfig::Json(json!({}))),
        Some(content) => {
            let doc: Value = serde_json::from_str(&content).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
            Ok(RawConfig::Json(doc))
        }
    }
}

pub(crate) fn save_json(path: &Path, config: &RawConfig) -> Result<()> {
    let doc = json_doc(config)?;
    let mut content = serde_json::to_string_pretty(doc)
        .map_err(|e| Error::ConfigInvalid(e.to_string()))?;
    content.push('\n');
    backup::write_atomic(path, content.as_bytes())
}

fn json_doc(config: &RawConfig) -> Result<&Value> {
    match config {
        RawConfig::Json(doc) => Ok(doc),
        _ => Err(Error::ConfigInvalid(
            "expected a JSON document for this client".to_string(),
        )),
    }
}

fn json_doc_mut(config: &mut RawConfig) -> Result<&mut Value> {
    match config {
        RawConfig::Json(doc) => Ok(doc),
        _ => Err(Error::ConfigInvalid(
            "expected a JSON document for this client".to_string(),
        )),
    }
}

/// The document must be an object, and the server container, when present,
/// must be an object too.
pub(crate) fn validate_json(config: &RawConfig, container_key: &str) -> Result<()> {
    let doc = json_doc(config)?;
    let obj = doc
        .as_object()
        .ok_or_else(|| Error::ConfigInvalid("top level must be an object".to_string()))?;
    if let Some(servers) = obj.get(container_key) {
        if !servers.is_object() {
            return Err(Error::ConfigInvalid(format!(
                "'{}' must be an object",
                container_key
            )));
        }
    }
    Ok(())
}

pub(crate) fn json_has(config: &RawConfig, container_key: &str, name: &str) -> Result<bool> {
    let doc = json_doc(config)?;
    Ok(doc
        .get(container_key)
        .and_then(Value::as_object)
        .map(|servers| servers.contains_key(name))
        .unwrap_or(false))
}

pub(crate) fn json_add(
    mut config: RawConfig,
    container_key: &str,
    server_name: &str,
    entry: Value,
) -> Result<RawConfig> {
    validate_json(&config, container_key)?;
    let doc = json_doc_mut(&mut config)?;
    let obj = doc.as_object_mut().expect("validated above");

    let servers = obj
        .entry(container_key.to_string())
        .or_insert_with(|| json!({}));
    let servers = servers.as_object_mut().expect("validated above");

    if servers.contains_key(server_name) {
        return Err(Error::ServerAlreadyExists(server_name.to_string()));
    }
    servers.insert(server_name.to_string(), entry);
    Ok(config)
}

pub(crate) fn json_remove(
    mut config: RawConfig,
    container_key: &str,
    server_name: &str,
) -> Result<RawConfig> {
    validate_json(&config, container_key)?;
    let doc = json_doc_mut(&mut config)?;
    let obj = doc.as_object_mut().expect("validated above");

    let removed = match obj.get_mut(container_key).and_then(Value::as_object_mut) {
        Some(servers) => servers.remove(server_name).is_some(),
        None => false,
    };
    if !removed {
        return Err(Error::ServerNotFound(server_name.to_string()));
    }

    // Collapsing an emptied container is schema-neutral for every JSON
    // client we support.
    let emptied = obj
        .get(container_key)
        .and_then(Value::as_object)
        .map(|servers| servers.is_empty())
        .unwrap_or(false);
    if emptied {
        obj.remove(container_key);
    }
    Ok(config)
}

pub(crate) fn json_get(
    config: &RawConfig,
    container_key: &str,
    server_name: &str,
) -> Result<Registration> {
    let doc = json_doc(config)?;
    let entry = doc
        .get(container_key)
        .and_then(Value::as_object)
        .and_then(|servers| servers.get(server_name))
        .ok_or_else(|| Error::ServerNotFound(server_name.to_string()))?;
    registration_from_json(server_name, entry)
}

/// Build the JSON entry for a stdio registration (`command`/`args`/`env`
/// dialect, shared by Claude Desktop, Claude Code, Cursor and VS Code).
pub(crate) fn stdio_entry(server: &Registration) -> Result<Value> {
    match &server.transport {
        Transport::Stdio { command, args, env } => Ok(json!({
            "command": command,
            "args": args,
            "env": env,
        })),
        Transport::Http { .. } => Err(Error::ConfigInvalid(
            "this client stores a local-process launch spec".to_string(),
        )),
    }
}

/// Parse a JSON server entry back into a registration. Accepts both the
/// stdio dialect and the remote dialects (`url` / `httpUrl`).
pub(crate) fn registration_from_json(name: &str, entry: &Value) -> Result<Registration> {
    if let Some(command) = entry.get("command").and_then(Value::as_str) {
        let args = entry
            .get("args")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        let env = string_map(entry.get("env"));
        return Ok(Registration {
            name: name.to_string(),
            transport: Transport::Stdio {
                command: command.to_string(),
                args,
                env,
            },
        });
    }

    let url = entry
        .get("url")
        .or_else(|| entry.get("httpUrl"))
        .and_then(Value::as_str);
    if let Some(url) = url {
        let headers = string_map(entry.get("headers").or_else(|| entry.get("http_headers")));
        return Ok(Registration {
            name: name.to_string(),
            transport: Transport::Http {
                url: url.to_string(),
                headers,
            },
        });
    }

    Err(Error::ConfigInvalid(format!(
        "server entry '{}' has neither a command nor a url",
        name
    )))
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Render all server entries under a JSON container, credentials masked.
pub(crate) fn format_json_config(
    config: &RawConfig,
    container_key: &str,
    only_kirha: bool,
) -> Result<String> {
    let doc = json_doc(config)?;
    let servers = doc.get(container_key).and_then(Value::as_object);

    let mut sections = Vec::new();
    if let Some(servers) = servers {
        for (name, entry) in servers {
            if only_kirha && !name.starts_with(SERVER_BASE_NAME) {
                continue;
            }
            sections.push(describe_json_entry(name, entry));
        }
    }

    if sections.is_empty() {
        return Ok("No MCP servers configured".to_string());
    }
    Ok(sections.join("\n"))
}

pub(crate) fn format_json_server(
    config: &RawConfig,
    container_key: &str,
    server_name: &str,
) -> Result<String> {
    let doc = json_doc(config)?;
    let entry = doc
        .get(container_key)
        .and_then(Value::as_object)
        .and_then(|servers| servers.get(server_name))
        .ok_or_else(|| Error::ServerNotFound(server_name.to_string()))?;
    Ok(describe_json_entry(server_name, entry))
}

fn describe_json_entry(name: &str, entry: &Value) -> String {
    let mut out = format!("Server: {}\n", name);

    if let Some(command) = entry.get("command").and_then(Value::as_str) {
        out.push_str(&format!("  Command: {}\n", command));
        if let Some(args) = entry.get("args").and_then(Value::as_array) {
            let args: Vec<&str> = args.iter().filter_map(Value::as_str).collect();
            out.push_str(&format!("  Args: {}\n", args.join(" ")));
        }
        let env = string_map(entry.get("env"));
        if !env.is_empty() {
            out.push_str("  Environment:\n");
            for (k, v) in &env {
                out.push_str(&format!("    {}: {}\n", k, mask_env_value(k, v)));
            }
        }
    } else if let Some(url) = entry
        .get("url")
        .or_else(|| entry.get("httpUrl"))
        .and_then(Value::as_str)
    {
        out.push_str(&format!("  URL: {}\n", url));
        let headers = string_map(entry.get("headers").or_else(|| entry.get("http_headers")));
        if !headers.is_empty() {
            out.push_str("  Headers:\n");
            for (k, v) in &headers {
                out.push_str(&format!("    {}: {}\n", k, mask_header_value(k, v)));
            }
        }
    } else {
        out.push_str(&format!("  Config: {}\n", entry));
    }

    out
}

pub(crate) fn mask_env_value(key: &str, value: &str) -> String {
    if key == ENV_API_KEY {
        mask_api_key(value)
    } else {
        value.to_string()
    }
}

pub(crate) fn mask_header_value(key: &str, value: &str) -> String {
    if !key.eq_ignore_ascii_case(HEADER_AUTHORIZATION) {
        return value.to_string();
    }
    match value.strip_prefix("Bearer ") {
        Some(token) => format!("Bearer {}", mask_api_key(token)),
        None => mask_api_key(value),
    }
}
