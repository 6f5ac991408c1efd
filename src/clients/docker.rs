//! Docker Compose adapter. Never merges into a user-owned
//! `docker-compose.yml`: the managed services live in a sibling
//! `docker-compose.kirha.yml` that this tool owns outright.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use serde_yaml::{Mapping, Value};
use tracing::debug;

use super::probe::run_with_timeout;
use super::{mask_env_value, McpClient, RawConfig};
use crate::backup;
use crate::errors::{Error, Result};
use crate::models::{
    ClientKind, Registration, RunningState, Transport, TransportKind, Vertical, SERVER_BASE_NAME,
};

const CONFIG_FILE: &str = "docker-compose.kirha.yml";
const COMPOSE_VERSION: &str = "3.8";
const NETWORK: &str = "mcp";
const IMAGE: &str = "node:18-alpine";

pub struct DockerCompose {
    path_override: Option<PathBuf>,
}

impl DockerCompose {
    pub fn new(path_override: Option<PathBuf>) -> Self {
        DockerCompose { path_override }
    }

    fn service_name(vertical: Vertical) -> String {
        format!("{}-mcp", vertical.server_name())
    }

    fn doc<'a>(&self, config: &'a RawConfig) -> Result<&'a Mapping> {
        match config {
            RawConfig::Yaml(Value::Mapping(doc)) => Ok(doc),
            _ => Err(Error::ConfigInvalid(
                "expected a compose document for this client".to_string(),
            )),
        }
    }

    fn fresh_doc() -> Mapping {
        let mut networks = Mapping::new();
        let mut bridge = Mapping::new();
        bridge.insert(yaml_str("driver"), yaml_str("bridge"));
        networks.insert(yaml_str(NETWORK), Value::Mapping(bridge));

        let mut doc = Mapping::new();
        doc.insert(yaml_str("version"), yaml_str(COMPOSE_VERSION));
        doc.insert(yaml_str("services"), Value::Mapping(Mapping::new()));
        doc.insert(yaml_str("networks"), Value::Mapping(networks));
        doc
    }

    fn service_entry(server: &Registration) -> Result<Value> {
        let Transport::Stdio { command, args, env } = &server.transport else {
            return Err(Error::ConfigInvalid(
                "this client stores a local-process launch spec".to_string(),
            ));
        };

        let mut launch = command.clone();
        for arg in args {
            launch.push(' ');
            launch.push_str(arg);
        }

        let mut environment = Mapping::new();
        for (k, v) in env {
            environment.insert(yaml_str(k), yaml_str(v));
        }

        let mut entry = Mapping::new();
        entry.insert(yaml_str("image"), yaml_str(IMAGE));
        entry.insert(
            yaml_str("command"),
            Value::Sequence(vec![yaml_str("sh"), yaml_str("-c"), yaml_str(&launch)]),
        );
        entry.insert(yaml_str("environment"), Value::Mapping(environment));
        entry.insert(yaml_str("restart"), yaml_str("unless-stopped"));
        entry.insert(
            yaml_str("networks"),
            Value::Sequence(vec![yaml_str(NETWORK)]),
        );
        Ok(Value::Mapping(entry))
    }

    fn describe_service(name: &str, entry: &Value) -> String {
        let mut out = format!("Service: {}\n", name);
        if let Some(image) = entry.get("image").and_then(Value::as_str) {
            out.push_str(&format!("  Image: {}\n", image));
        }
        if let Some(command) = entry.get("command").and_then(Value::as_sequence) {
            let parts: Vec<&str> = command.iter().filter_map(Value::as_str).collect();
            out.push_str(&format!("  Command: {}\n", parts.join(" ")));
        }
        if let Some(env) = entry.get("environment").and_then(Value::as_mapping) {
            if !env.is_empty() {
                out.push_str("  Environment:\n");
                for (k, v) in env {
                    if let (Some(k), Some(v)) = (k.as_str(), v.as_str()) {
                        out.push_str(&format!("    {}: {}\n", k, mask_env_value(k, v)));
                    }
                }
            }
        }
        out
    }
}

fn yaml_str(s: &str) -> Value {
    Value::String(s.to_string())
}

impl McpClient for DockerCompose {
    fn kind(&self) -> ClientKind {
        ClientKind::Docker
    }

    fn transport_kind(&self) -> TransportKind {
        TransportKind::Stdio
    }

    fn config_path(&self) -> Result<PathBuf> {
        match &self.path_override {
            Some(path) => Ok(path.clone()),
            None => {
                let cwd = std::env::current_dir().map_err(|e| Error::ConfigRead {
                    path: PathBuf::from("."),
                    source: e,
                })?;
                Ok(cwd.join(CONFIG_FILE))
            }
        }
    }

    fn load_config(&self) -> Result<RawConfig> {
        let path = self.config_path()?;
        match backup::read_optional(&path)? {
            None => {
                debug!(path = %path.display(), "no compose file yet, starting fresh");
                Ok(RawConfig::Yaml(Value::Mapping(DockerCompose::fresh_doc())))
            }
            Some(content) => {
                let doc: Value = serde_yaml::from_str(&content).map_err(|e| Error::ConfigParse {
                    path,
                    detail: e.to_string(),
                })?;
                Ok(RawConfig::Yaml(doc))
            }
        }
    }

    fn validate_config(&self, config: &RawConfig) -> Result<()> {
        let doc = self.doc(config)?;
        if let Some(services) = doc.get(&yaml_str("services")) {
            if !services.is_mapping() {
                return Err(Error::ConfigInvalid(
                    "'services' must be a mapping".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn has_server(&self, config: &RawConfig, vertical: Vertical) -> Result<bool> {
        let doc = self.doc(config)?;
        let service = yaml_str(&DockerCompose::service_name(vertical));
        Ok(doc
            .get(&yaml_str("services"))
            .and_then(Value::as_mapping)
            .map(|services| services.contains_key(&service))
            .unwrap_or(false))
    }

    fn server_config(&self, config: &RawConfig, vertical: Vertical) -> Result<Registration> {
        let service_name = DockerCompose::service_name(vertical);
        let doc = self.doc(config)?;
        let entry = doc
            .get(&yaml_str("services"))
            .and_then(Value::as_mapping)
            .and_then(|services| services.get(&yaml_str(&service_name)))
            .ok_or_else(|| Error::ServerNotFound(vertical.server_name()))?;

        let command = entry
            .get("command")
            .and_then(Value::as_sequence)
            .map(|seq| {
                seq.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let (head, tail) = match command.split_first() {
            Some((head, tail)) => (head.clone(), tail.to_vec()),
            None => (String::new(), Vec::new()),
        };
        let env = entry
            .get("environment")
            .and_then(Value::as_mapping)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| match (k.as_str(), v.as_str()) {
                        (Some(k), Some(v)) => Some((k.to_string(), v.to_string())),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Registration {
            name: vertical.server_name(),
            transport: Transport::Stdio {
                command: head,
                args: tail,
                env,
            },
        })
    }

    fn add_server(&self, config: RawConfig, server: &Registration) -> Result<RawConfig> {
        self.validate_config(&config)?;
        let entry = DockerCompose::service_entry(server)?;
        let service_name = format!("{}-mcp", server.name);
        let RawConfig::Yaml(Value::Mapping(mut doc)) = config else {
            return Err(Error::ConfigInvalid(
                "expected a compose document for this client".to_string(),
            ));
        };

        let services = doc
            .entry(yaml_str("services"))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        let services = services.as_mapping_mut().expect("validated above");

        if services.contains_key(&yaml_str(&service_name)) {
            return Err(Error::ServerAlreadyExists(server.name.clone()));
        }
        services.insert(yaml_str(&service_name), entry);
        Ok(RawConfig::Yaml(Value::Mapping(doc)))
    }

    fn remove_server(&self, config: RawConfig, vertical: Vertical) -> Result<RawConfig> {
        self.validate_config(&config)?;
        let service_name = DockerCompose::service_name(vertical);
        let RawConfig::Yaml(Value::Mapping(mut doc)) = config else {
            return Err(Error::ConfigInvalid(
                "expected a compose document for this client".to_string(),
            ));
        };

        let removed = doc
            .get_mut(&yaml_str("services"))
            .and_then(Value::as_mapping_mut)
            .map(|services| services.remove(&yaml_str(&service_name)).is_some())
            .unwrap_or(false);
        if !removed {
            return Err(Error::ServerNotFound(vertical.server_name()));
        }
        Ok(RawConfig::Yaml(Value::Mapping(doc)))
    }

    fn save_config(&self, config: &RawConfig) -> Result<()> {
        let path = self.config_path()?;
        let doc = self.doc(config)?;

        // Once the last managed service is gone the sibling file has no
        // reason to exist.
        let no_services = doc
            .get(&yaml_str("services"))
            .and_then(Value::as_mapping)
            .map(Mapping::is_empty)
            .unwrap_or(true);
        if no_services {
            if path.exists() {
                std::fs::remove_file(&path).map_err(|e| Error::from_write(&path, e))?;
            }
            return Ok(());
        }

        let content = serde_yaml::to_string(&Value::Mapping(doc.clone()))
            .map_err(|e| Error::ConfigInvalid(e.to_string()))?;
        backup::write_atomic(&path, content.as_bytes())
    }

    fn is_running(&self, timeout: Duration) -> RunningState {
        let mut info = Command::new("docker");
        info.arg("info");
        match run_with_timeout(&mut info, timeout) {
            Ok(Some((status, _))) if status.success() => {}
            Ok(Some(_)) => return RunningState::NotRunning,
            Ok(None) | Err(_) => return RunningState::Unknown,
        }

        let mut ps = Command::new("docker");
        ps.args(["ps", "--filter", "name=kirha-", "--format", "{{.Names}}"]);
        match run_with_timeout(&mut ps, timeout) {
            Ok(Some((status, output))) if status.success() => {
                if output.iter().any(|b| !b.is_ascii_whitespace()) {
                    RunningState::Running
                } else {
                    RunningState::NotRunning
                }
            }
            Ok(Some(_)) | Ok(None) => RunningState::Unknown,
            Err(_) => RunningState::Unknown,
        }
    }

    fn format_config(&self, config: &RawConfig, only_kirha: bool) -> Result<String> {
        let doc = self.doc(config)?;
        let services = doc.get(&yaml_str("services")).and_then(Value::as_mapping);

        let mut sections = Vec::new();
        if let Some(services) = services {
            for (name, entry) in services {
                let Some(name) = name.as_str() else { continue };
                if only_kirha && !name.starts_with(SERVER_BASE_NAME) {
                    continue;
                }
                sections.push(DockerCompose::describe_service(name, entry));
            }
        }

        if sections.is_empty() {
            return Ok("No MCP servers configured".to_string());
        }
        Ok(sections.join("\n"))
    }

    fn format_server(&self, config: &RawConfig, vertical: Vertical) -> Result<String> {
        let service_name = DockerCompose::service_name(vertical);
        let doc = self.doc(config)?;
        let entry = doc
            .get(&yaml_str("services"))
            .and_then(Value::as_mapping)
            .and_then(|services| services.get(&yaml_str(&service_name)))
            .ok_or_else(|| Error::ServerNotFound(vertical.server_name()))?;
        Ok(DockerCompose::describe_service(&service_name, entry))
    }
}
