//! CLI configuration lookup.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/elliptics/storage.toml`
//! - Windows: `%APPDATA%/elliptics/storage.toml`

use std::path::{Path, PathBuf};

use elliptics_storage::StorageConfig;

/// Loads `explicit` if given, else the platform file if present, else
/// defaults. Environment overrides apply in every case.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<StorageConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => config_path(),
    };

    if explicit.is_some() || path.exists() {
        let config = StorageConfig::load(&path)?;
        tracing::debug!(path = %path.display(), "using configuration file");
        return Ok(config);
    }

    let mut config = StorageConfig::default();
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("elliptics").join("storage.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("elliptics")
            .join("storage.toml")
    }
}
