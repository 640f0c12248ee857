use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::launch::options::{tokenize_args, LaunchOptions, ProxyOptions};
use crate::core::layout::GameLayout;

/// Per-version settings file inside `versions/<id>/`.
pub const VERSION_SETTINGS_FILE: &str = "hmclversion.cfg";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameDirType {
    /// The profile's game directory.
    #[default]
    RootFolder,
    /// `versions/<id>/`.
    VersionFolder,
    /// The path in `game_dir`.
    Custom,
}

/// Launch settings persisted per version (or as a profile default).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionSettings {
    /// Java executable; empty means auto-detect.
    pub java: String,
    pub wrapper: String,
    pub perm_size: String,
    pub max_memory: u32,
    pub min_memory: Option<u32>,
    #[serde(rename = "precalledCommand")]
    pub pre_launch_command: String,
    pub java_args: String,
    pub minecraft_args: String,
    #[serde(rename = "noJVMArgs")]
    pub no_jvm_args: bool,
    #[serde(rename = "notCheckJVM")]
    pub not_check_jvm: bool,
    pub not_check_game: bool,
    pub server_ip: String,
    pub fullscreen: bool,
    pub width: u32,
    pub height: u32,
    pub game_dir_type: GameDirType,
    pub game_dir: String,
}

impl Default for VersionSettings {
    fn default() -> Self {
        Self {
            java: String::new(),
            wrapper: String::new(),
            perm_size: String::new(),
            max_memory: suggested_memory_mb(),
            min_memory: None,
            pre_launch_command: String::new(),
            java_args: String::new(),
            minecraft_args: String::new(),
            no_jvm_args: false,
            not_check_jvm: false,
            not_check_game: false,
            server_ip: String::new(),
            fullscreen: false,
            width: 854,
            height: 480,
            game_dir_type: GameDirType::RootFolder,
            game_dir: String::new(),
        }
    }
}

/// A quarter of physical memory, clamped to 1–4 GiB.
fn suggested_memory_mb() -> u32 {
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    let total_mb = system.total_memory() / (1024 * 1024);
    (total_mb / 4).clamp(1024, 4096) as u32
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl VersionSettings {
    pub fn path(layout: &GameLayout, id: &str) -> PathBuf {
        layout.version_root(id).join(VERSION_SETTINGS_FILE)
    }

    /// `None` when the version has no settings file or it is unreadable.
    pub async fn load(layout: &GameLayout, id: &str) -> Option<Self> {
        let path = Self::path(layout, id);
        let raw = tokio::fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str(&raw) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!("Ignoring corrupt {:?}: {}", path, e);
                None
            }
        }
    }

    pub async fn save(&self, layout: &GameLayout, id: &str) -> LauncherResult<()> {
        let path = Self::path(layout, id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        tokio::fs::write(&path, serde_json::to_string_pretty(self)?)
            .await
            .map_err(|e| LauncherError::io(&path, e))
    }

    /// Directory the game runs in for version `id`.
    pub fn game_dir_for(&self, layout: &GameLayout, id: &str, default_run_dir: &Path) -> PathBuf {
        match self.game_dir_type {
            GameDirType::RootFolder => default_run_dir.to_path_buf(),
            GameDirType::VersionFolder => layout.version_root(id),
            GameDirType::Custom => match non_blank(&self.game_dir) {
                Some(dir) => PathBuf::from(dir),
                None => default_run_dir.to_path_buf(),
            },
        }
    }

    /// Populate launch options from these settings.
    pub fn to_launch_options(
        &self,
        game_dir: PathBuf,
        profile_name: &str,
        proxy: Option<ProxyOptions>,
    ) -> LaunchOptions {
        let mut options = LaunchOptions {
            game_dir,
            profile_name: profile_name.to_string(),
            min_memory_mb: self.min_memory,
            max_memory_mb: (self.max_memory > 0).then_some(self.max_memory),
            perm_size_mb: self.perm_size.trim().parse().ok(),
            width: self.width,
            height: self.height,
            fullscreen: self.fullscreen,
            server: non_blank(&self.server_ip),
            proxy,
            wrapper: non_blank(&self.wrapper),
            pre_launch_command: non_blank(&self.pre_launch_command),
            java_args: tokenize_args(&self.java_args),
            minecraft_args: tokenize_args(&self.minecraft_args),
            no_jvm_args: self.no_jvm_args,
            not_check_game: self.not_check_game,
            not_check_jvm: self.not_check_jvm,
            ..LaunchOptions::default()
        };
        if let Some(java) = non_blank(&self.java) {
            options.java_path = PathBuf::from(java);
        }
        options
    }
}
