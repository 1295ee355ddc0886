//! Browser configuration

use axiom_tabs::{ErrorKind, ErrorPolicy, TabPolicy, DEFAULT_MAX_TABS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Where frozen tabs keep their screenshots
    pub thumbnail_dir: PathBuf,
    /// Maximum number of open tabs
    pub max_tabs: usize,
    /// Ask the user before proceeding past certificate errors
    pub show_security_warnings: bool,
    /// Navigation errors that are logged but never shown
    pub suppressed_errors: Vec<ErrorKind>,
    /// Timeout for touch-icon downloads
    pub touch_icon_timeout_secs: u64,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("axiom.db"),
            thumbnail_dir: data_dir.join("thumbnails"),
            max_tabs: DEFAULT_MAX_TABS,
            show_security_warnings: true,
            suppressed_errors: ErrorPolicy::DEFAULT_SUPPRESSED.to_vec(),
            touch_icon_timeout_secs: 10,
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("AXIOM"))
            .unwrap_or_else(|| PathBuf::from(".axiom"))
    }

    /// Read a JSON config file. Missing fields take their default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn tab_policy(&self) -> TabPolicy {
        TabPolicy {
            max_tabs: self.max_tabs,
            errors: ErrorPolicy::new(self.suppressed_errors.iter().copied()),
            ..TabPolicy::new(self.thumbnail_dir.clone())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}
