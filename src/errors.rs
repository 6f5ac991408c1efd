//! Error taxonomy shared by the orchestrator and every client adapter.

use std::path::PathBuf;

use crate::models::ClientKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read configuration at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration format at {path}: {detail}")]
    ConfigParse { path: PathBuf, detail: String },

    /// The in-memory config has the wrong shape for this adapter.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("failed to write configuration at {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("failed to backup configuration: {0}")]
    BackupFailed(std::io::Error),

    #[error("backup file already exists: {0}")]
    BackupExists(PathBuf),

    #[error("failed to restore configuration from backup: {0}")]
    RestoreFailed(std::io::Error),

    #[error("platform not supported: {0}")]
    PlatformUnsupported(String),

    #[error("{0} is currently running, please close it or pass --force")]
    ClientRunning(ClientKind),

    #[error("API key is required")]
    ApiKeyRequired,

    #[error("invalid API key format")]
    ApiKeyInvalid,

    #[error("MCP server '{0}' already exists in configuration")]
    ServerAlreadyExists(String),

    #[error("MCP server '{0}' not found in configuration")]
    ServerNotFound(String),

    // Workflow-context variants: the orchestrator upgrades the generic
    // exists/not-found errors into these so the CLI can suggest the
    // right follow-up command.
    #[error("MCP server already installed for {0}, use 'update' to modify it")]
    AlreadyInstalled(ClientKind),

    #[error("MCP server not found for {0}, use 'install' to add it")]
    NotFoundForUpdate(ClientKind),

    #[error("MCP server not found for {0}, nothing to remove")]
    NotFoundForRemove(ClientKind),

    /// Post-write round-trip validation failed; the on-disk file was rolled
    /// back if a backup existed.
    #[error("installation failed: {0}")]
    InstallationFailed(&'static str),
}

impl Error {
    /// Classify an I/O error against a path the way every adapter needs:
    /// permission problems are their own variant, everything else is a read
    /// failure. Not-found is handled by callers before this point.
    pub fn from_read(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            Error::PermissionDenied(path.to_path_buf())
        } else {
            Error::ConfigRead {
                path: path.to_path_buf(),
                source: err,
            }
        }
    }

    pub fn from_write(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            Error::PermissionDenied(path.to_path_buf())
        } else {
            Error::ConfigWrite {
                path: path.to_path_buf(),
                source: err,
            }
        }
    }
}
