//! Domain model: clients, verticals, registrations, requests, results.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

/// Logical server name every registration derives from.
pub const SERVER_BASE_NAME: &str = "kirha";

/// Launch spec for local-process (stdio) registrations.
pub const STDIO_COMMAND: &str = "npx";
pub const STDIO_ARGS: &[&str] = &["-y", "@kirha/mcp-gateway", "stdio"];

/// Endpoint for remote (HTTP) registrations.
pub const REMOTE_URL: &str = "https://mcp.kirha.com";

pub const ENV_API_KEY: &str = "KIRHA_API_KEY";
pub const ENV_VERTICAL: &str = "KIRHA_VERTICAL";
pub const ENV_PLAN_MODE: &str = "KIRHA_PLAN_MODE";
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_VERTICAL: &str = "X-Kirha-Vertical";
pub const HEADER_PLAN_MODE: &str = "X-Kirha-Plan-Mode";

/// Supported target tools. Fixed at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ClientKind {
    /// Claude Desktop
    Claude,
    /// Claude Code CLI
    #[value(alias = "claudecode")]
    ClaudeCode,
    /// Cursor IDE
    Cursor,
    /// VS Code
    #[value(name = "vscode", alias = "vs-code", alias = "code")]
    VsCode,
    /// OpenAI Codex CLI
    Codex,
    /// Gemini CLI
    Gemini,
    /// OpenCode
    Opencode,
    /// Docker Compose
    Docker,
}

impl ClientKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ClientKind::Claude => "claude",
            ClientKind::ClaudeCode => "claude-code",
            ClientKind::Cursor => "cursor",
            ClientKind::VsCode => "vscode",
            ClientKind::Codex => "codex",
            ClientKind::Gemini => "gemini",
            ClientKind::Opencode => "opencode",
            ClientKind::Docker => "docker",
        }
    }
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-product selector; parameterizes the registered server's identity and
/// credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Vertical {
    Crypto,
    Utils,
}

impl Vertical {
    pub fn as_str(self) -> &'static str {
        match self {
            Vertical::Crypto => "crypto",
            Vertical::Utils => "utils",
        }
    }

    /// Identifier the gateway expects in `KIRHA_VERTICAL` /
    /// `X-Kirha-Vertical`.
    pub fn id(self) -> &'static str {
        self.as_str()
    }

    /// Canonical registration name within a client's config.
    pub fn server_name(self) -> String {
        format!("{}-{}", SERVER_BASE_NAME, self.as_str())
    }
}

impl fmt::Display for Vertical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Install,
    Update,
    Remove,
    Show,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Install => "install",
            Operation::Update => "update",
            Operation::Remove => "remove",
            Operation::Show => "show",
        };
        f.write_str(s)
    }
}

/// Which registration shape a client's config stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stdio,
    Http,
}

/// Transport descriptor written into a client's config. Maps are ordered so
/// serialized output is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Stdio {
        command: String,
        args: Vec<String>,
        env: BTreeMap<String, String>,
    },
    Http {
        url: String,
        headers: BTreeMap<String, String>,
    },
}

/// The payload written into a client's config for the managed server.
/// Never persisted anywhere but the target config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub transport: Transport,
}

impl Registration {
    /// Build the Kirha registration for one vertical, in the shape the
    /// target client stores.
    pub fn kirha(
        api_key: &str,
        vertical: Vertical,
        kind: TransportKind,
        plan_mode: Option<bool>,
    ) -> Self {
        let transport = match kind {
            TransportKind::Stdio => {
                let mut env = BTreeMap::new();
                env.insert(ENV_API_KEY.to_string(), api_key.to_string());
                env.insert(ENV_VERTICAL.to_string(), vertical.id().to_string());
                if let Some(enabled) = plan_mode {
                    env.insert(ENV_PLAN_MODE.to_string(), enabled.to_string());
                }
                Transport::Stdio {
                    command: STDIO_COMMAND.to_string(),
                    args: STDIO_ARGS.iter().map(|a| a.to_string()).collect(),
                    env,
                }
            }
            TransportKind::Http => {
                let mut headers = BTreeMap::new();
                headers.insert(
                    HEADER_AUTHORIZATION.to_string(),
                    format!("Bearer {}", api_key),
                );
                headers.insert(HEADER_VERTICAL.to_string(), vertical.id().to_string());
                if let Some(enabled) = plan_mode {
                    headers.insert(HEADER_PLAN_MODE.to_string(), enabled.to_string());
                }
                Transport::Http {
                    url: REMOTE_URL.to_string(),
                    headers,
                }
            }
        };

        Registration {
            name: vertical.server_name(),
            transport,
        }
    }

    /// Extract the credential stored in this registration, if any. Used by
    /// the explicit reuse-existing-key path on update.
    pub fn api_key(&self) -> Option<&str> {
        match &self.transport {
            Transport::Stdio { env, .. } => env.get(ENV_API_KEY).map(String::as_str),
            Transport::Http { headers, .. } => headers
                .get(HEADER_AUTHORIZATION)
                .map(|v| v.strip_prefix("Bearer ").unwrap_or(v)),
        }
    }

    /// Plan-mode flag stored in this registration, if any.
    pub fn plan_mode(&self) -> Option<bool> {
        let raw = match &self.transport {
            Transport::Stdio { env, .. } => env.get(ENV_PLAN_MODE),
            Transport::Http { headers, .. } => headers.get(HEADER_PLAN_MODE),
        }?;
        raw.parse().ok()
    }
}

/// One operation request, built by the CLI layer.
#[derive(Debug, Clone)]
pub struct Request {
    pub client: ClientKind,
    pub vertical: Vertical,
    pub api_key: String,
    pub operation: Operation,
    /// Custom config file location; adapters resolve their platform default
    /// when absent.
    pub config_path: Option<PathBuf>,
    pub dry_run: bool,
    pub verbose: bool,
    /// Proceed even when the client process appears to be running.
    pub force: bool,
    /// Plan-mode toggle carried by `update`; `None` leaves the stored value
    /// alone.
    pub plan_mode: Option<bool>,
    /// Explicit opt-in: re-use the credential already stored in the config
    /// when no API key was supplied (plan-mode-only updates).
    pub reuse_existing_key: bool,
    /// Upper bound on the process-presence probe.
    pub probe_timeout: Duration,
}

impl Request {
    pub fn new(client: ClientKind, vertical: Vertical, operation: Operation) -> Self {
        Request {
            client,
            vertical,
            api_key: String::new(),
            operation,
            config_path: None,
            dry_run: false,
            verbose: false,
            force: false,
            plan_mode: None,
            reuse_existing_key: false,
            probe_timeout: Duration::from_secs(3),
        }
    }
}

/// Outcome of a mutating operation, for the CLI to render.
#[derive(Debug, Clone, Default)]
pub struct InstallResult {
    pub success: bool,
    pub config_path: PathBuf,
    pub backup_path: Option<PathBuf>,
    pub message: String,
}

/// Outcome of the read-only show operation.
#[derive(Debug, Clone, Default)]
pub struct ShowResult {
    pub success: bool,
    pub config_path: PathBuf,
    pub has_server: bool,
    pub server: Option<Registration>,
    pub listing: String,
    pub message: String,
}

/// Best-effort process-presence probe result. Probe failures are reported as
/// `Unknown` and treated as not running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningState {
    Running,
    NotRunning,
    Unknown,
}

impl RunningState {
    pub fn is_running(self) -> bool {
        matches!(self, RunningState::Running)
    }
}
