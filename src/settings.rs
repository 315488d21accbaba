use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::HostError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub model_id: Option<String>,
    pub model_path: Option<String>,
    /// Run the worker as a child process instead of a thread.
    pub isolated: bool,
}

const APP_DIR: &str = "scribe";
const STORE_PATH: &str = "settings.json";

pub fn settings_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|dir| dir.join(APP_DIR).join(STORE_PATH))
}

/// Reads settings from `path`; a missing or unreadable file yields defaults.
pub fn load_from(path: &Path) -> Settings {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Settings::default(),
        Err(err) => {
            log::warn!("Failed to read settings {}: {err}", path.display());
            return Settings::default();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|err| {
        log::warn!("Ignoring malformed settings {}: {err}", path.display());
        Settings::default()
    })
}

pub fn save_to(path: &Path, settings: &Settings) -> Result<(), HostError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| HostError::Settings(format!("create {}: {e}", parent.display())))?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)
        .map_err(|e| HostError::Settings(format!("write {}: {e}", path.display())))
}

pub fn get_settings() -> Settings {
    settings_path()
        .map(|path| load_from(&path))
        .unwrap_or_default()
}

pub fn save_settings(settings: &Settings) -> Result<(), HostError> {
    let path = settings_path()
        .ok_or_else(|| HostError::Settings("no config directory on this platform".into()))?;
    save_to(&path, settings)
}
