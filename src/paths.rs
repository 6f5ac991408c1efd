//! Config file location resolution for target clients.
//!
//! Env var overrides win, then platform defaults from `dirs`.

use std::path::PathBuf;

use crate::errors::{Error, Result};

/// Returns the override path from an environment variable, tilde-expanded,
/// or `None` when unset or blank.
pub fn env_override(env_var: &str) -> Option<PathBuf> {
    match std::env::var(env_var) {
        Ok(val) => {
            let trimmed = val.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(expand_tilde(trimmed))
            }
        }
        Err(_) => None,
    }
}

/// Platform-conventional config file for a desktop app:
/// `~/Library/Application Support/<app>` on macOS, roaming AppData on
/// Windows, `$XDG_CONFIG_HOME`/`~/.config` on Linux.
pub fn platform_config_path(app: &str, file: &str) -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| Error::PlatformUnsupported(std::env::consts::OS.to_string()))?;
    Ok(base.join(app).join(file))
}

/// Config file in a dotted directory directly under the home directory,
/// e.g. `~/.codex/config.toml`.
pub fn home_config_path(dir: &str, file: &str) -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::PlatformUnsupported(std::env::consts::OS.to_string()))?;
    Ok(home.join(dir).join(file))
}

/// Config file under `~/.config` on macOS and Linux, the way XDG-style CLI
/// tools resolve it regardless of platform convention. Windows falls back
/// to the roaming config dir.
pub fn xdg_config_path(app: &str, file: &str) -> Result<PathBuf> {
    #[cfg(windows)]
    {
        platform_config_path(app, file)
    }
    #[cfg(not(windows))]
    {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::PlatformUnsupported(std::env::consts::OS.to_string()))?;
        Ok(home.join(".config").join(app).join(file))
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_config_path_joins_under_home() {
        let path = home_config_path(".codex", "config.toml").unwrap();
        assert!(path.ends_with(".codex/config.toml"));
    }

    #[test]
    fn platform_config_path_joins_app_and_file() {
        let path = platform_config_path("Claude", "claude_desktop_config.json").unwrap();
        assert!(path.ends_with("Claude/claude_desktop_config.json"));
    }

    #[cfg(not(windows))]
    #[test]
    fn xdg_config_path_joins_under_dot_config() {
        let path = xdg_config_path("opencode", "opencode.json").unwrap();
        assert!(path.ends_with(".config/opencode/opencode.json"));
    }
}
