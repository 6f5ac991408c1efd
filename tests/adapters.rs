//! Adapter tests: real adapters pointed at temp directories, exercising the
//! on-disk dialects (JSON, TOML, YAML), backups, and preservation of
//! unrelated user configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;

use kirha_mcp_installer::{
    adapter_for, ClientKind, Installer, McpClient, Operation, Request, Vertical,
};

fn request_for(client: ClientKind, operation: Operation, path: &Path) -> Request {
    let mut request = Request::new(client, Vertical::Crypto, operation);
    request.api_key = "abcd1234efgh".to_string();
    request.config_path = Some(path.to_path_buf());
    request.force = true;
    request.probe_timeout = Duration::from_millis(200);
    request
}

fn run(client: ClientKind, operation: Operation, path: &Path) -> kirha_mcp_installer::InstallResult {
    let request = request_for(client, operation, path);
    let adapter = adapter_for(client, request.config_path.clone());
    Installer::new()
        .execute_with(adapter.as_ref(), &request)
        .unwrap()
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn backup_files(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.contains(".backup_"))
                .unwrap_or(false)
        })
        .collect()
}

#[test]
fn cursor_install_writes_the_stdio_entry() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mcp.json");

    let result = run(ClientKind::Cursor, Operation::Install, &path);
    assert!(result.success);
    // No pre-existing file, so nothing to back up.
    assert!(result.backup_path.is_none());

    let doc = read_json(&path);
    let entry = &doc["mcpServers"]["kirha-crypto"];
    assert_eq!(entry["command"], "npx");
    assert_eq!(entry["args"], json!(["-y", "@kirha/mcp-gateway", "stdio"]));
    assert_eq!(entry["env"]["KIRHA_API_KEY"], "abcd1234efgh");
    assert_eq!(entry["env"]["KIRHA_VERTICAL"], "crypto");
}

#[test]
fn claude_install_preserves_unrelated_settings_and_backs_up() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("claude_desktop_config.json");
    let original = json!({
        "theme": "dark",
        "mcpServers": { "other": { "command": "foo", "args": [] } }
    });
    fs::write(&path, serde_json::to_string_pretty(&original).unwrap()).unwrap();

    let result = run(ClientKind::Claude, Operation::Install, &path);
    let backup = result.backup_path.expect("backup of existing file");
    assert!(backup
        .file_name()
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("claude_desktop_config.json.backup_"));
    assert_eq!(read_json(&backup), original);

    let doc = read_json(&path);
    assert_eq!(doc["theme"], "dark");
    assert_eq!(doc["mcpServers"]["other"]["command"], "foo");
    assert!(doc["mcpServers"]["kirha-crypto"].is_object());
}

#[test]
fn remove_restores_the_original_shape() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mcp.json");
    fs::write(
        &path,
        r#"{ "theme": "dark", "mcpServers": { "other": { "command": "foo" } } }"#,
    )
    .unwrap();

    run(ClientKind::Cursor, Operation::Install, &path);
    run(ClientKind::Cursor, Operation::Remove, &path);

    let doc = read_json(&path);
    assert_eq!(doc["theme"], "dark");
    assert_eq!(doc["mcpServers"]["other"]["command"], "foo");
    assert!(doc["mcpServers"].get("kirha-crypto").is_none());
}

#[test]
fn remove_collapses_an_emptied_container() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mcp.json");

    run(ClientKind::Cursor, Operation::Install, &path);
    run(ClientKind::Cursor, Operation::Remove, &path);

    let doc = read_json(&path);
    assert!(doc.get("mcpServers").is_none());
}

#[test]
fn update_rotates_the_key_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mcp.json");

    run(ClientKind::Cursor, Operation::Install, &path);

    let mut request = request_for(ClientKind::Cursor, Operation::Update, &path);
    request.api_key = "wxyz9876stuv".to_string();
    let adapter = adapter_for(ClientKind::Cursor, request.config_path.clone());
    Installer::new()
        .execute_with(adapter.as_ref(), &request)
        .unwrap();

    let doc = read_json(&path);
    assert_eq!(
        doc["mcpServers"]["kirha-crypto"]["env"]["KIRHA_API_KEY"],
        "wxyz9876stuv"
    );
    // Install left no backup (fresh file); the update took one.
    assert_eq!(backup_files(dir.path()).len(), 1);
}

#[test]
fn corrupt_json_fails_before_any_mutation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mcp.json");
    fs::write(&path, "{ not json").unwrap();

    let request = request_for(ClientKind::Cursor, Operation::Install, &path);
    let adapter = adapter_for(ClientKind::Cursor, request.config_path.clone());
    let err = Installer::new()
        .execute_with(adapter.as_ref(), &request)
        .unwrap_err();
    assert!(matches!(err, kirha_mcp_installer::Error::ConfigParse { .. }));

    assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    assert!(backup_files(dir.path()).is_empty());
}

#[test]
fn gemini_uses_the_http_url_dialect() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");

    run(ClientKind::Gemini, Operation::Install, &path);

    let doc = read_json(&path);
    let entry = &doc["mcpServers"]["kirha-crypto"];
    assert_eq!(entry["httpUrl"], "https://mcp.kirha.com");
    assert_eq!(entry["headers"]["Authorization"], "Bearer abcd1234efgh");
    assert_eq!(entry["headers"]["X-Kirha-Vertical"], "crypto");
}

#[test]
fn vscode_nests_servers_under_the_flat_settings_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(&path, r#"{ "editor.fontSize": 14 }"#).unwrap();

    run(ClientKind::VsCode, Operation::Install, &path);

    let doc = read_json(&path);
    assert_eq!(doc["editor.fontSize"], 14);
    assert_eq!(doc["mcp.servers"]["kirha-crypto"]["command"], "npx");
}

#[test]
fn opencode_stores_an_enabled_remote_entry() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("opencode.json");
    fs::write(&path, r#"{ "theme": "dark" }"#).unwrap();

    run(ClientKind::Opencode, Operation::Install, &path);

    let doc = read_json(&path);
    assert_eq!(doc["theme"], "dark");
    let entry = &doc["mcp"]["kirha-crypto"];
    assert_eq!(entry["type"], "remote");
    assert_eq!(entry["url"], "https://mcp.kirha.com");
    assert_eq!(entry["enabled"], true);
    assert_eq!(entry["headers"]["Authorization"], "Bearer abcd1234efgh");

    run(ClientKind::Opencode, Operation::Remove, &path);
    let doc = read_json(&path);
    assert_eq!(doc["theme"], "dark");
    assert!(doc.get("mcp").is_none());
}

#[test]
fn listing_can_filter_to_managed_entries() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mcp.json");
    fs::write(
        &path,
        r#"{ "mcpServers": { "other": { "command": "foo" } } }"#,
    )
    .unwrap();

    run(ClientKind::Cursor, Operation::Install, &path);

    let adapter = adapter_for(ClientKind::Cursor, Some(path));
    let config = adapter.load_config().unwrap();

    let all = adapter.format_config(&config, false).unwrap();
    assert!(all.contains("Server: kirha-crypto"));
    assert!(all.contains("Server: other"));

    let managed = adapter.format_config(&config, true).unwrap();
    assert!(managed.contains("Server: kirha-crypto"));
    assert!(!managed.contains("Server: other"));
}

#[test]
fn single_server_rendering_masks_the_credential() {
    let dir = TempDir::new().unwrap();

    // TOML header dialect.
    let toml_path = dir.path().join("config.toml");
    run(ClientKind::Codex, Operation::Install, &toml_path);
    let adapter = adapter_for(ClientKind::Codex, Some(toml_path));
    let config = adapter.load_config().unwrap();
    let text = adapter.format_server(&config, Vertical::Crypto).unwrap();
    assert!(text.contains("Server: kirha-crypto"));
    assert!(text.contains("Authorization: Bearer abcd****efgh"), "{}", text);
    assert!(!text.contains("abcd1234efgh"));

    // Compose environment dialect.
    let yml_path = dir.path().join("docker-compose.kirha.yml");
    run(ClientKind::Docker, Operation::Install, &yml_path);
    let adapter = adapter_for(ClientKind::Docker, Some(yml_path));
    let config = adapter.load_config().unwrap();
    let text = adapter.format_server(&config, Vertical::Crypto).unwrap();
    assert!(text.contains("Service: kirha-crypto-mcp"));
    assert!(text.contains("KIRHA_API_KEY: abcd****efgh"), "{}", text);
    assert!(!text.contains("abcd1234efgh"));
}

#[test]
fn codex_stores_a_remote_entry_in_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "model = \"o3\"\n").unwrap();

    run(ClientKind::Codex, Operation::Install, &path);

    let doc: toml::Value = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(doc["model"].as_str(), Some("o3"));
    let entry = &doc["mcp_servers"]["kirha-crypto"];
    assert_eq!(entry["url"].as_str(), Some("https://mcp.kirha.com"));
    assert_eq!(
        entry["http_headers"]["Authorization"].as_str(),
        Some("Bearer abcd1234efgh")
    );

    run(ClientKind::Codex, Operation::Remove, &path);
    let doc: toml::Value = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(doc["model"].as_str(), Some("o3"));
    assert!(doc.get("mcp_servers").is_none());
}

#[test]
fn docker_owns_a_sibling_compose_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("docker-compose.kirha.yml");

    run(ClientKind::Docker, Operation::Install, &path);

    let doc: serde_yaml::Value =
        serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let service = &doc["services"]["kirha-crypto-mcp"];
    assert_eq!(service["image"].as_str(), Some("node:18-alpine"));
    assert_eq!(
        service["environment"]["KIRHA_API_KEY"].as_str(),
        Some("abcd1234efgh")
    );
    assert_eq!(doc["networks"]["mcp"]["driver"].as_str(), Some("bridge"));

    // Removing the last managed service deletes the file outright.
    run(ClientKind::Docker, Operation::Remove, &path);
    assert!(!path.exists());
}

#[test]
fn show_on_missing_file_reports_no_servers() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mcp.json");

    let mut request = Request::new(ClientKind::Cursor, Vertical::Crypto, Operation::Show);
    request.config_path = Some(path.clone());
    let result = Installer::new().show(&request).unwrap();

    assert!(result.success);
    assert!(!result.has_server);
    assert!(result.message.contains("No MCP servers configured"));
    assert!(!path.exists(), "show never creates the file");
}

#[test]
fn show_masks_the_stored_credential() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mcp.json");

    run(ClientKind::Cursor, Operation::Install, &path);

    let mut request = Request::new(ClientKind::Cursor, Vertical::Crypto, Operation::Show);
    request.config_path = Some(path);
    let result = Installer::new().show(&request).unwrap();

    assert!(result.has_server);
    assert!(result.listing.contains("abcd****efgh"));
    assert!(!result.listing.contains("abcd1234efgh"));
    assert!(result.message.contains("is configured for cursor"));
    assert!(result.message.contains("abcd****efgh"));
    assert!(!result.message.contains("abcd1234efgh"));
    let server = result.server.expect("parsed registration");
    assert_eq!(server.name, "kirha-crypto");
}
