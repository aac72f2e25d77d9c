//! OS-aware path detection for Pulse storage.
//!
//! - **Windows**: `%APPDATA%\Pulse\`
//! - **macOS**: `~/Library/Application Support/Pulse/`
//! - **Linux**: `~/.local/share/Pulse/` (data), `~/.config/Pulse/` (config)
//!
//! `PULSE_DATA_DIR` and `PULSE_CONFIG_DIR` override the detected locations.

use std::path::PathBuf;
use tracing::debug;

use crate::error::{Result, StorageError};

/// Application name used for storage directories.
pub const APP_NAME: &str = "Pulse";

/// Subdirectory names.
pub const STORE_DIR: &str = "store";
pub const CONFIG_FILE: &str = "config.toml";

/// Pulse storage paths container.
#[derive(Debug, Clone)]
pub struct PulsePaths {
    /// Root data directory (platform-specific).
    pub data_dir: PathBuf,
    /// Key/value blobs, one file per key.
    pub store_dir: PathBuf,
}

impl PulsePaths {
    /// Create PulsePaths with automatic OS detection.
    pub fn new() -> Result<Self> {
        let data_dir = pulse_data_dir()?;
        Ok(Self::from_root(data_dir))
    }

    /// Create PulsePaths from a custom root directory.
    pub fn from_root(data_dir: PathBuf) -> Self {
        Self {
            store_dir: data_dir.join(STORE_DIR),
            data_dir,
        }
    }

    /// Ensure all directories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.store_dir)?;
        debug!(data_dir = %self.data_dir.display(), "Pulse storage directories initialized");
        Ok(())
    }
}

/// Get the Pulse data directory based on the current OS.
pub fn pulse_data_dir() -> Result<PathBuf> {
    if let Some(path) = env_dir("PULSE_DATA_DIR") {
        debug!(path = %path.display(), "Using PULSE_DATA_DIR override");
        return Ok(path);
    }

    let base = dirs::data_dir().ok_or(StorageError::HomeDirNotFound)?;
    Ok(base.join(APP_NAME))
}

/// Get the Pulse config directory based on the current OS.
pub fn pulse_config_dir() -> Result<PathBuf> {
    if let Some(path) = env_dir("PULSE_CONFIG_DIR") {
        debug!(path = %path.display(), "Using PULSE_CONFIG_DIR override");
        return Ok(path);
    }

    let base = dirs::config_dir().ok_or(StorageError::HomeDirNotFound)?;
    Ok(base.join(APP_NAME))
}

/// Default location of the configuration file.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(pulse_config_dir()?.join(CONFIG_FILE))
}

fn env_dir(var: &str) -> Option<PathBuf> {
    std::env::var(var)
        .ok()
        .filter(|val| !val.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_structure() {
        let paths = PulsePaths::from_root(PathBuf::from("/tmp/pulse-test"));
        assert!(paths.store_dir.ends_with(STORE_DIR));
        assert_eq!(paths.data_dir, PathBuf::from("/tmp/pulse-test"));
    }

    #[test]
    fn test_ensure_dirs_creates_tree() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PulsePaths::from_root(dir.path().join("nested"));
        paths.ensure_dirs().unwrap();
        assert!(paths.store_dir.is_dir());
    }

    #[test]
    fn test_default_config_path_ends_with_file_name() {
        if let Ok(path) = default_config_path() {
            assert!(path.ends_with(CONFIG_FILE));
        }
    }
}
