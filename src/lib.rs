//! kirha-mcp-installer
//!
//! Installs, updates, and removes the Kirha MCP gateway in the local
//! configuration of supported developer tools.

pub mod backup;
pub mod clients;
pub mod errors;
pub mod installer;
pub mod masking;
pub mod models;
pub mod paths;

pub use clients::{adapter_for, McpClient, RawConfig};
pub use errors::{Error, Result};
pub use installer::Installer;
pub use masking::mask_api_key;
pub use models::{
    ClientKind, InstallResult, Operation, Registration, Request, RunningState, ShowResult,
    Transport, TransportKind, Vertical,
};
