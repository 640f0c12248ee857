use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::version_settings::VersionSettings;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::launch::options::ProxyOptions;

const APP_DIR_NAME: &str = "craftlaunch";
pub const SETTINGS_FILE: &str = "hmcl.json";
const DEFAULT_PROFILE: &str = "Default";

/// A named game directory with its default version settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub name: String,
    pub game_dir: PathBuf,
    pub selected_version: Option<String>,
    /// Used for versions without their own `hmclversion.cfg`.
    pub global: VersionSettings,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROFILE.to_string(),
            game_dir: default_game_dir(),
            selected_version: None,
            global: VersionSettings::default(),
        }
    }
}

/// Launcher-wide settings stored in `hmcl.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LauncherSettings {
    pub last_player_name: String,
    pub selected_profile: String,
    pub profiles: BTreeMap<String, Profile>,
    pub proxy: Option<ProxyOptions>,
    pub download_concurrency: usize,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(DEFAULT_PROFILE.to_string(), Profile::default());
        Self {
            last_player_name: String::new(),
            selected_profile: DEFAULT_PROFILE.to_string(),
            profiles,
            proxy: None,
            download_concurrency: 8,
        }
    }
}

impl LauncherSettings {
    /// The selected profile, falling back to any profile, then a default one.
    pub fn selected_profile(&self) -> Profile {
        self.profiles
            .get(&self.selected_profile)
            .or_else(|| self.profiles.values().next())
            .cloned()
            .unwrap_or_default()
    }
}

/// Explicit load/save of [`LauncherSettings`] at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/craftlaunch/hmcl.json`.
    pub fn default_location() -> Self {
        Self::new(default_data_dir().join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or corrupt files yield defaults.
    pub async fn load(&self) -> LauncherSettings {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No settings at {:?}, using defaults", self.path);
                return LauncherSettings::default();
            }
            Err(e) => {
                warn!("Cannot read {:?}: {}, using defaults", self.path, e);
                return LauncherSettings::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Corrupt settings at {:?}: {}, using defaults", self.path, e);
                LauncherSettings::default()
            }
        }
    }

    pub async fn save(&self, settings: &LauncherSettings) -> LauncherResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| LauncherError::io(&self.path, e))
    }
}

fn default_base_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Launcher data directory.
pub fn default_data_dir() -> PathBuf {
    default_base_dir().join(APP_DIR_NAME)
}

/// `.minecraft` in the platform's usual place.
fn default_game_dir() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".minecraft")
    } else if cfg!(target_os = "macos") {
        default_base_dir().join("minecraft")
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".minecraft")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> (PathBuf, ConfigStore) {
        let dir = std::env::temp_dir().join(format!("config-store-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let store = ConfigStore::new(dir.join("hmcl.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let (dir, store) = temp_store("missing");
        let settings = store.load().await;
        assert_eq!(settings, LauncherSettings::default());
        assert_eq!(settings.selected_profile().name, "Default");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn corrupt_file_yields_defaults() {
        let (dir, store) = temp_store("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(store.path(), "{ nope").unwrap();
        assert_eq!(store.load().await, LauncherSettings::default());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn saved_settings_are_reloaded() {
        let (dir, store) = temp_store("save");
        let mut settings = LauncherSettings::default();
        settings.last_player_name = "Steve".into();
        settings.proxy = Some(ProxyOptions {
            host: "127.0.0.1".into(),
            port: 1080,
            user: None,
            password: None,
        });
        store.save(&settings).await.unwrap();

        let loaded = store.load().await;
        assert_eq!(loaded.last_player_name, "Steve");
        assert_eq!(loaded.proxy.as_ref().map(|p| p.port), Some(1080));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unknown_selected_profile_falls_back() {
        let settings = LauncherSettings {
            selected_profile: "gone".into(),
            ..LauncherSettings::default()
        };
        assert_eq!(settings.selected_profile().name, "Default");
    }
}
