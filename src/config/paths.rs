//! Where relgraph keeps its configuration file

use directories::BaseDirs;
use std::path::{Path, PathBuf};

/// Overrides every other location when set
pub const CONFIG_DIR_ENV: &str = "RELGRAPH_CONFIG_DIR";

/// Directory holding `config.yaml`
///
/// `$RELGRAPH_CONFIG_DIR` wins. Otherwise `$XDG_CONFIG_HOME/relgraph`, then
/// `~/.config/relgraph` on Unix and the roaming AppData folder on Windows.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }

    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .ok()
        .or_else(platform_config_home)
        .unwrap_or_else(|| PathBuf::from(".config"));
    base.join("relgraph")
}

#[cfg(windows)]
fn platform_config_home() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf())
}

#[cfg(not(windows))]
fn platform_config_home() -> Option<PathBuf> {
    // Always ~/.config, even on macOS
    BaseDirs::new().map(|dirs| dirs.home_dir().join(".config"))
}

/// Path of the configuration file
pub fn root_config_path() -> PathBuf {
    config_dir().join("config.yaml")
}

/// Create `path` and its parents if missing
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
