//! Workflow tests: drive the orchestrator against an in-memory adapter with
//! failure injection, checking the backup/rollback discipline and the
//! read-only guarantees of dry-run and show.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Value};

use kirha_mcp_installer::{
    ClientKind, Error, Installer, McpClient, Operation, RawConfig, Registration, Request,
    RunningState, Transport, TransportKind, Vertical,
};

const SERVERS_KEY: &str = "mcpServers";

/// In-memory stand-in for a JSON-dialect client. The "file" is a
/// `serde_json::Value` cell, and every trait call is recorded by name.
struct MockClient {
    store: RefCell<Value>,
    backup: RefCell<Option<Value>>,
    calls: RefCell<Vec<&'static str>>,
    fail_save: Cell<bool>,
    fail_validate_after_save: Cell<bool>,
    saved: Cell<bool>,
    running: Cell<RunningState>,
}

impl MockClient {
    fn new(initial: Value) -> Self {
        MockClient {
            store: RefCell::new(initial),
            backup: RefCell::new(None),
            calls: RefCell::new(Vec::new()),
            fail_save: Cell::new(false),
            fail_validate_after_save: Cell::new(false),
            saved: Cell::new(false),
            running: Cell::new(RunningState::NotRunning),
        }
    }

    fn record(&self, call: &'static str) {
        self.calls.borrow_mut().push(call);
    }

    fn called(&self, call: &str) -> bool {
        self.calls.borrow().iter().any(|c| *c == call)
    }

    fn stored(&self) -> Value {
        self.store.borrow().clone()
    }

    fn entry(&self, name: &str) -> Option<Value> {
        self.store.borrow()[SERVERS_KEY].get(name).cloned()
    }
}

impl McpClient for MockClient {
    fn kind(&self) -> ClientKind {
        ClientKind::Cursor
    }

    fn transport_kind(&self) -> TransportKind {
        TransportKind::Stdio
    }

    fn config_path(&self) -> kirha_mcp_installer::Result<PathBuf> {
        Ok(PathBuf::from("/mock/mcp.json"))
    }

    fn load_config(&self) -> kirha_mcp_installer::Result<RawConfig> {
        self.record("load");
        Ok(RawConfig::Json(self.stored()))
    }

    fn validate_config(&self, config: &RawConfig) -> kirha_mcp_installer::Result<()> {
        self.record("validate");
        if self.saved.get() && self.fail_validate_after_save.get() {
            return Err(Error::ConfigInvalid("injected post-save failure".into()));
        }
        match config {
            RawConfig::Json(doc) if doc.is_object() => Ok(()),
            _ => Err(Error::ConfigInvalid("top level must be an object".into())),
        }
    }

    fn has_server(
        &self,
        config: &RawConfig,
        vertical: Vertical,
    ) -> kirha_mcp_installer::Result<bool> {
        let RawConfig::Json(doc) = config else {
            panic!("mock only handles JSON")
        };
        Ok(doc[SERVERS_KEY].get(vertical.server_name()).is_some())
    }

    fn server_config(
        &self,
        config: &RawConfig,
        vertical: Vertical,
    ) -> kirha_mcp_installer::Result<Registration> {
        let name = vertical.server_name();
        let RawConfig::Json(doc) = config else {
            panic!("mock only handles JSON")
        };
        let entry = doc[SERVERS_KEY]
            .get(&name)
            .ok_or_else(|| Error::ServerNotFound(name.clone()))?;
        let env = entry["env"]
            .as_object()
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Registration {
            name,
            transport: Transport::Stdio {
                command: entry["command"].as_str().unwrap_or_default().to_string(),
                args: Vec::new(),
                env,
            },
        })
    }

    fn add_server(
        &self,
        config: RawConfig,
        server: &Registration,
    ) -> kirha_mcp_installer::Result<RawConfig> {
        self.record("add");
        let RawConfig::Json(mut doc) = config else {
            panic!("mock only handles JSON")
        };
        let Transport::Stdio { command, env, .. } = &server.transport else {
            panic!("mock stores stdio entries")
        };
        let servers = doc
            .as_object_mut()
            .unwrap()
            .entry(SERVERS_KEY)
            .or_insert_with(|| json!({}));
        if servers.get(&server.name).is_some() {
            return Err(Error::ServerAlreadyExists(server.name.clone()));
        }
        servers[&server.name] = json!({ "command": command, "env": env });
        Ok(RawConfig::Json(doc))
    }

    fn remove_server(
        &self,
        config: RawConfig,
        vertical: Vertical,
    ) -> kirha_mcp_installer::Result<RawConfig> {
        self.record("remove");
        let name = vertical.server_name();
        let RawConfig::Json(mut doc) = config else {
            panic!("mock only handles JSON")
        };
        let removed = doc[SERVERS_KEY]
            .as_object_mut()
            .map(|servers| servers.remove(&name).is_some())
            .unwrap_or(false);
        if !removed {
            return Err(Error::ServerNotFound(name));
        }
        Ok(RawConfig::Json(doc))
    }

    fn save_config(&self, config: &RawConfig) -> kirha_mcp_installer::Result<()> {
        self.record("save");
        if self.fail_save.get() {
            return Err(Error::ConfigInvalid("injected save failure".into()));
        }
        let RawConfig::Json(doc) = config else {
            panic!("mock only handles JSON")
        };
        *self.store.borrow_mut() = doc.clone();
        self.saved.set(true);
        Ok(())
    }

    fn backup_config(&self) -> kirha_mcp_installer::Result<Option<PathBuf>> {
        self.record("backup");
        *self.backup.borrow_mut() = Some(self.stored());
        Ok(Some(PathBuf::from("/mock/mcp.json.backup_20260101_000000")))
    }

    fn restore_config(&self, _backup_path: &Path) -> kirha_mcp_installer::Result<()> {
        self.record("restore");
        let snapshot = self
            .backup
            .borrow()
            .clone()
            .ok_or_else(|| Error::RestoreFailed(std::io::Error::other("no backup taken")))?;
        *self.store.borrow_mut() = snapshot;
        Ok(())
    }

    fn is_running(&self, _timeout: Duration) -> RunningState {
        self.record("probe");
        self.running.get()
    }

    fn format_config(
        &self,
        config: &RawConfig,
        _only_kirha: bool,
    ) -> kirha_mcp_installer::Result<String> {
        let RawConfig::Json(doc) = config else {
            panic!("mock only handles JSON")
        };
        let names: Vec<&str> = doc[SERVERS_KEY]
            .as_object()
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default();
        if names.is_empty() {
            Ok("No MCP servers configured".to_string())
        } else {
            Ok(names.join("\n"))
        }
    }

    fn format_server(
        &self,
        _config: &RawConfig,
        vertical: Vertical,
    ) -> kirha_mcp_installer::Result<String> {
        Ok(vertical.server_name())
    }
}

fn install_request() -> Request {
    let mut request = Request::new(ClientKind::Cursor, Vertical::Crypto, Operation::Install);
    request.api_key = "abcd1234efgh".to_string();
    request
}

#[test]
fn install_writes_registration_and_takes_backup() {
    let client = MockClient::new(json!({ "mcpServers": { "other": { "command": "foo" } } }));
    let result = Installer::new()
        .execute_with(&client, &install_request())
        .unwrap();

    assert!(result.success);
    assert!(result.backup_path.is_some());
    assert!(result.message.contains("Successfully installed"));
    assert!(result.message.contains("kirha-crypto"));

    let entry = client.entry("kirha-crypto").expect("entry written");
    assert_eq!(entry["env"]["KIRHA_API_KEY"], "abcd1234efgh");
    assert_eq!(entry["env"]["KIRHA_VERTICAL"], "crypto");
    assert!(client.entry("other").is_some(), "unrelated entry preserved");
}

#[test]
fn install_twice_fails_with_already_installed() {
    let client = MockClient::new(json!({}));
    let installer = Installer::new();
    installer.execute_with(&client, &install_request()).unwrap();

    let err = installer
        .execute_with(&client, &install_request())
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyInstalled(ClientKind::Cursor)));
}

#[test]
fn save_failure_rolls_back_to_backup() {
    let original = json!({ "mcpServers": { "other": { "command": "foo" } } });
    let client = MockClient::new(original.clone());
    client.fail_save.set(true);

    let err = Installer::new()
        .execute_with(&client, &install_request())
        .unwrap_err();
    assert!(matches!(err, Error::ConfigInvalid(_)));
    assert!(client.called("restore"));
    assert_eq!(client.stored(), original);
}

#[test]
fn post_save_validation_failure_rolls_back() {
    let original = json!({ "mcpServers": {} });
    let client = MockClient::new(original.clone());
    client.fail_validate_after_save.set(true);

    let err = Installer::new()
        .execute_with(&client, &install_request())
        .unwrap_err();
    assert!(matches!(err, Error::InstallationFailed(_)));
    assert!(client.called("restore"));
    assert_eq!(client.stored(), original);
}

#[test]
fn dry_run_never_mutates() {
    let original = json!({ "mcpServers": { "other": { "command": "foo" } } });
    let client = MockClient::new(original.clone());
    let mut request = install_request();
    request.dry_run = true;

    let result = Installer::new().execute_with(&client, &request).unwrap();
    assert!(result.success);
    assert!(result.message.starts_with("Would install"));
    assert!(result.backup_path.is_none());

    assert!(!client.called("backup"));
    assert!(!client.called("add"));
    assert!(!client.called("save"));
    assert_eq!(client.stored(), original);
}

#[test]
fn install_requires_an_api_key() {
    let client = MockClient::new(json!({}));
    let mut request = install_request();
    request.api_key = String::new();

    let err = Installer::new().execute_with(&client, &request).unwrap_err();
    assert!(matches!(err, Error::ApiKeyRequired));
    assert!(!client.called("load"), "fails before touching the config");
}

#[test]
fn running_client_blocks_mutation_unless_forced() {
    let client = MockClient::new(json!({}));
    client.running.set(RunningState::Running);

    let err = Installer::new()
        .execute_with(&client, &install_request())
        .unwrap_err();
    assert!(matches!(err, Error::ClientRunning(ClientKind::Cursor)));

    let mut request = install_request();
    request.force = true;
    let result = Installer::new().execute_with(&client, &request).unwrap();
    assert!(result.message.contains("Please restart"));
}

#[test]
fn unknown_running_state_is_treated_as_not_running() {
    let client = MockClient::new(json!({}));
    client.running.set(RunningState::Unknown);

    let result = Installer::new()
        .execute_with(&client, &install_request())
        .unwrap();
    assert!(result.success);
    assert!(!result.message.contains("Please restart"));
}

#[test]
fn update_replaces_key_in_place() {
    let client = MockClient::new(json!({}));
    let installer = Installer::new();
    installer.execute_with(&client, &install_request()).unwrap();

    let mut request = install_request();
    request.operation = Operation::Update;
    request.api_key = "wxyz9876stuv".to_string();
    let result = installer.execute_with(&client, &request).unwrap();

    assert!(result.message.contains("Successfully updated"));
    let entry = client.entry("kirha-crypto").unwrap();
    assert_eq!(entry["env"]["KIRHA_API_KEY"], "wxyz9876stuv");
}

#[test]
fn update_missing_server_fails_without_backup() {
    let client = MockClient::new(json!({}));
    let mut request = install_request();
    request.operation = Operation::Update;

    let err = Installer::new().execute_with(&client, &request).unwrap_err();
    assert!(matches!(err, Error::NotFoundForUpdate(ClientKind::Cursor)));
    assert!(!client.called("backup"));
    assert!(!client.called("save"));
}

#[test]
fn plan_mode_toggle_can_reuse_the_stored_key() {
    let client = MockClient::new(json!({}));
    let installer = Installer::new();
    installer.execute_with(&client, &install_request()).unwrap();

    let mut request = Request::new(ClientKind::Cursor, Vertical::Crypto, Operation::Update);
    request.plan_mode = Some(true);
    request.reuse_existing_key = true;
    installer.execute_with(&client, &request).unwrap();

    let entry = client.entry("kirha-crypto").unwrap();
    assert_eq!(entry["env"]["KIRHA_API_KEY"], "abcd1234efgh");
    assert_eq!(entry["env"]["KIRHA_PLAN_MODE"], "true");
}

#[test]
fn update_without_key_and_without_reuse_fails() {
    let client = MockClient::new(json!({}));
    let installer = Installer::new();
    installer.execute_with(&client, &install_request()).unwrap();

    let request = Request::new(ClientKind::Cursor, Vertical::Crypto, Operation::Update);
    let err = installer.execute_with(&client, &request).unwrap_err();
    assert!(matches!(err, Error::ApiKeyRequired));

    // The stored entry is untouched.
    let entry = client.entry("kirha-crypto").unwrap();
    assert_eq!(entry["env"]["KIRHA_API_KEY"], "abcd1234efgh");
}

#[test]
fn update_preserves_stored_plan_mode_when_not_toggled() {
    let client = MockClient::new(json!({}));
    let installer = Installer::new();

    let mut request = Request::new(ClientKind::Cursor, Vertical::Crypto, Operation::Update);
    request.plan_mode = Some(true);
    request.reuse_existing_key = true;
    installer.execute_with(&client, &install_request()).unwrap();
    installer.execute_with(&client, &request).unwrap();

    // A later key rotation without a toggle keeps plan mode on.
    let mut rotate = install_request();
    rotate.operation = Operation::Update;
    rotate.api_key = "wxyz9876stuv".to_string();
    installer.execute_with(&client, &rotate).unwrap();

    let entry = client.entry("kirha-crypto").unwrap();
    assert_eq!(entry["env"]["KIRHA_PLAN_MODE"], "true");
    assert_eq!(entry["env"]["KIRHA_API_KEY"], "wxyz9876stuv");
}

#[test]
fn remove_deletes_only_the_managed_entry() {
    let client = MockClient::new(json!({ "mcpServers": { "other": { "command": "foo" } } }));
    let installer = Installer::new();
    installer.execute_with(&client, &install_request()).unwrap();

    let request = Request::new(ClientKind::Cursor, Vertical::Crypto, Operation::Remove);
    let result = installer.execute_with(&client, &request).unwrap();
    assert!(result.message.contains("Successfully removed"));

    assert!(client.entry("kirha-crypto").is_none());
    assert!(client.entry("other").is_some());
}

#[test]
fn remove_missing_server_fails() {
    let client = MockClient::new(json!({}));
    let request = Request::new(ClientKind::Cursor, Vertical::Crypto, Operation::Remove);

    let err = Installer::new().execute_with(&client, &request).unwrap_err();
    assert!(matches!(err, Error::NotFoundForRemove(ClientKind::Cursor)));
    assert!(!client.called("backup"));
}

#[test]
fn show_renders_the_installed_server() {
    let client = MockClient::new(json!({}));
    let installer = Installer::new();
    installer.execute_with(&client, &install_request()).unwrap();

    let request = Request::new(ClientKind::Cursor, Vertical::Crypto, Operation::Show);
    let result = installer.execute_with(&client, &request).unwrap();

    assert!(result.success);
    assert!(result.message.contains("is configured for cursor"));
    assert!(result.message.contains("kirha-crypto"));
}

#[test]
fn show_on_empty_config_is_not_an_error() {
    let client = MockClient::new(json!({}));
    let request = Request::new(ClientKind::Cursor, Vertical::Crypto, Operation::Show);

    let result = Installer::new().execute_with(&client, &request).unwrap();
    assert!(result.success);
    assert!(result.message.contains("No MCP servers configured"));
    assert!(!client.called("save"));
}
