//! File primitives shared by every adapter: reads that distinguish
//! missing-from-broken, atomic writes, and timestamped backups.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info};

use crate::errors::{Error, Result};

/// Read a config file. `Ok(None)` means the file does not exist, which is a
/// normal first-run case, never an error.
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(Error::from_read(path, err)),
    }
}

/// Atomically replace `path` with `content`: write to a temp file in the
/// same directory, then rename over the target. Parent directories are
/// created as needed.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| Error::from_write(path, e))?;

    let mut tmp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| Error::from_write(path, e))?;
    tmp.write_all(content)
        .map_err(|e| Error::from_write(path, e))?;
    tmp.persist(path)
        .map_err(|e| Error::from_write(path, e.error))?;

    debug!(path = %path.display(), bytes = content.len(), "wrote config file");
    Ok(())
}

/// Copy `path` to a timestamped sibling before a destructive operation.
/// Returns `None` when there is nothing to back up yet. The backup is left
/// on disk after success so the user can undo by hand.
pub fn create_backup(path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        debug!(path = %path.display(), "no existing config to back up");
        return Ok(None);
    }

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(&format!(".backup_{}", timestamp));
    let backup_path = path.with_file_name(name);

    // Clock-resolution guard: two backups within one second would collide.
    if backup_path.exists() {
        return Err(Error::BackupExists(backup_path));
    }

    std::fs::copy(path, &backup_path).map_err(Error::BackupFailed)?;

    info!(
        original = %path.display(),
        backup = %backup_path.display(),
        "created configuration backup"
    );
    Ok(Some(backup_path))
}

/// Copy a backup back over the live path.
pub fn restore_backup(backup_path: &Path, target: &Path) -> Result<()> {
    if !backup_path.exists() {
        return Err(Error::RestoreFailed(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("backup file missing: {}", backup_path.display()),
        )));
    }

    let content = std::fs::read(backup_path).map_err(Error::RestoreFailed)?;
    match write_atomic(target, &content) {
        Ok(()) => {
            info!(
                backup = %backup_path.display(),
                target = %target.display(),
                "restored configuration from backup"
            );
            Ok(())
        }
        Err(Error::ConfigWrite { source, .. }) => Err(Error::RestoreFailed(source)),
        Err(other) => Err(other),
    }
}
