// ─── Launch Task ───
// Prepares every file a version needs, builds its command and spawns it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::classpath::{
    build_classpath, cleanup_natives, extract_natives, missing_libraries, safe_path_str,
};
use super::command::LaunchCommandBuilder;
use super::events::{LaunchListener, LaunchState, Prompt};
use super::options::LaunchOptions;
use super::process::{
    batch_quote, batch_script_line, format_command, posix_quote, posix_script_line, GameProcess,
    ProcessLauncher,
};
use crate::core::assets::AssetReconciler;
use crate::core::auth::AuthSession;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::install::GameInstaller;
use crate::core::version::{
    OsName, Platform, ResolvedLibrary, VersionManager, VersionManifest, VersionRepairer,
};

/// Upper bound on parents installed while resolving one version.
const MAX_PARENT_INSTALLS: usize = 8;

/// Everything needed to start a prepared version.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub version_id: String,
    /// The version with its `inheritsFrom` chain merged.
    pub version: VersionManifest,
    pub argv: Vec<String>,
    pub game_dir: PathBuf,
    pub natives_dir: PathBuf,
}

pub struct GameLauncher {
    versions: VersionManager,
    options: LaunchOptions,
    session: AuthSession,
    platform: Platform,
    listener: Arc<dyn LaunchListener>,
    installer: Option<GameInstaller>,
}

impl GameLauncher {
    pub fn new(
        versions: VersionManager,
        options: LaunchOptions,
        session: AuthSession,
        listener: Arc<dyn LaunchListener>,
    ) -> Self {
        Self {
            versions,
            options,
            session: session.sanitized(),
            platform: Platform::current(),
            listener,
            installer: None,
        }
    }

    /// Allow downloading missing files and parent versions.
    pub fn with_installer(mut self, installer: GameInstaller) -> Self {
        self.installer = Some(installer);
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn versions(&self) -> &VersionManager {
        &self.versions
    }

    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }

    // ── Preparation ─────────────────────────────────────

    /// Resolve `version_id`, make sure its files are present and build the
    /// command line.
    pub async fn make_launch_command(&mut self, version_id: &str) -> LauncherResult<LaunchPlan> {
        self.listener
            .on_state_changed(LaunchState::GeneratingLaunchingCodes);
        let version = self.resolve_version(version_id).await?;
        info!("Preparing {} (main class {:?})", version_id, version.main_class);

        let layout = self.versions.layout().clone();
        let libraries_dir = layout.libraries_dir();
        let natives_dir = self.versions.natives_dir(version_id);
        cleanup_natives(&natives_dir).await;

        let libraries = version.resolved_libraries(&self.platform);
        if !self.options.not_check_game {
            self.listener
                .on_state_changed(LaunchState::DownloadingLibraries);
            self.check_libraries(&libraries).await?;
        }

        self.ensure_game_jar(&version).await?;

        self.listener
            .on_state_changed(LaunchState::DecompressingNatives);
        extract_natives(&libraries, &libraries_dir, &natives_dir).await?;

        self.listener.on_state_changed(LaunchState::CheckingAssets);
        if !self.options.not_check_game {
            self.check_assets(&version).await?;
        }
        let game_assets = AssetReconciler::new(layout.clone())
            .reconstruct_assets(version.asset_index_id())
            .await?;

        let game_jar = self.versions.jar_path(&version);
        let classpath = build_classpath(&libraries, &libraries_dir, &game_jar)?;
        debug!("Classpath len={}", classpath.len());

        let argv = LaunchCommandBuilder::new(
            &version,
            &self.options,
            &self.session,
            &layout,
            &self.platform,
        )
        .natives_dir(natives_dir.clone())
        .game_assets(game_assets)
        .classpath(classpath)
        .physical_memory_mb(physical_memory_mb())
        .build()?;

        Ok(LaunchPlan {
            version_id: version_id.to_string(),
            version,
            argv,
            game_dir: self.options.game_dir.clone(),
            natives_dir,
        })
    }

    /// Resolve the chain, installing missing parents as hidden versions.
    async fn resolve_version(&mut self, id: &str) -> LauncherResult<VersionManifest> {
        for _ in 0..MAX_PARENT_INSTALLS {
            match self.versions.resolve(id) {
                Err(LauncherError::MissingParentVersion { version, parent }) => {
                    let Some(installer) = &self.installer else {
                        return Err(LauncherError::MissingParentVersion { version, parent });
                    };
                    info!("{} inherits from {}, installing it", version, parent);
                    installer.install_version(&parent, true).await?;
                    let repairer: &dyn VersionRepairer = installer;
                    self.versions
                        .refresh(self.listener.as_ref(), Some(repairer))
                        .await?;
                }
                other => return other,
            }
        }
        self.versions.resolve(id)
    }

    async fn check_libraries(&self, libraries: &[ResolvedLibrary]) -> LauncherResult<()> {
        let libraries_dir = self.versions.layout().libraries_dir();
        let missing: Vec<ResolvedLibrary> = missing_libraries(libraries, &libraries_dir)
            .into_iter()
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        info!("{} libraries missing", missing.len());
        if let Some(installer) = &self.installer {
            installer.download_libraries(&missing).await;
        }

        let names: Vec<String> = missing_libraries(&missing, &libraries_dir)
            .into_iter()
            .map(|l| l.name.clone())
            .collect();
        if names.is_empty() {
            return Ok(());
        }

        let prompt = Prompt::MissingLibraries { names };
        if !self.listener.confirm(&prompt) {
            return Err(LauncherError::Aborted(prompt.to_string()));
        }
        warn!("Launching with missing libraries");
        Ok(())
    }

    async fn ensure_game_jar(&self, version: &VersionManifest) -> LauncherResult<()> {
        let jar = self.versions.jar_path(version);
        if jar.is_file() {
            return Ok(());
        }

        if let Some(installer) = &self.installer {
            let prompt = Prompt::MissingGameJar { path: jar.clone() };
            if !self.listener.confirm(&prompt) {
                return Err(LauncherError::Aborted(prompt.to_string()));
            }
            installer.download_game_jar(version).await?;
        }

        if jar.is_file() {
            Ok(())
        } else {
            Err(LauncherError::MissingGameJar(jar))
        }
    }

    async fn check_assets(&self, version: &VersionManifest) -> LauncherResult<()> {
        let layout = self.versions.layout();
        let index_id = version.asset_index_id();
        if AssetReconciler::new(layout.clone())
            .check_assets_exist(index_id)
            .await
        {
            return Ok(());
        }

        let Some(installer) = &self.installer else {
            warn!("Assets of {} are incomplete", index_id);
            return Ok(());
        };
        let prompt = Prompt::MissingAssets {
            index: index_id.to_string(),
        };
        if !self.listener.confirm(&prompt) {
            warn!("Continuing without assets of {}", index_id);
            return Ok(());
        }

        if !layout.asset_index_file(index_id).is_file() {
            installer.download_asset_index(version).await?;
        }
        let failed = installer.download_assets(index_id).await?;
        if failed > 0 {
            warn!("{} assets of {} could not be downloaded", failed, index_id);
        }
        Ok(())
    }

    // ── Launch ──────────────────────────────────────────

    /// Start the game described by `plan`.
    pub async fn launch(&self, plan: &LaunchPlan) -> LauncherResult<GameProcess> {
        self.listener.on_state_changed(LaunchState::Launching);
        self.versions.on_launch(&plan.version_id).await?;

        if let Some(command) = &self.options.pre_launch_command {
            run_pre_launch_command(command, &plan.game_dir).await?;
        }

        info!(
            "Launching {}: {}",
            plan.version_id,
            self.session.redact(&format_command(&plan.argv))
        );

        ProcessLauncher::new(plan.version_id.clone(), plan.argv.clone())
            .current_dir(plan.game_dir.clone())
            .env("APPDATA", safe_path_str(self.versions.layout().base_dir()))
            .natives_dir(&plan.natives_dir)
            .spawn()
    }

    /// Write `plan` as a `.bat` (Windows) or `.sh` script and return its path.
    pub async fn write_launch_script(
        &self,
        plan: &LaunchPlan,
        path: &Path,
    ) -> LauncherResult<PathBuf> {
        let windows = self.platform.os == OsName::Windows;
        let mut script_path = path.to_path_buf();
        if script_path.extension().is_none() {
            script_path.set_extension(if windows { "bat" } else { "sh" });
        }

        let newline = if windows { "\r\n" } else { "\n" };
        let mut lines = Vec::new();
        if windows {
            lines.push("@echo off".to_string());
            lines.push(format!(
                "set \"appdata={}\"",
                safe_path_str(self.versions.layout().base_dir()).replace('%', "%%")
            ));
            lines.push(format!("cd /D {}", batch_quote(&safe_path_str(&plan.game_dir))));
        } else {
            lines.push("#!/usr/bin/env bash".to_string());
            lines.push(format!("cd {}", posix_quote(&safe_path_str(&plan.game_dir))));
        }
        // The hook is a shell command of the user's own and is written as is.
        if let Some(command) = &self.options.pre_launch_command {
            lines.push(command.clone());
        }
        lines.push(if windows {
            batch_script_line(&plan.argv)
        } else {
            posix_script_line(&plan.argv)
        });

        let mut content = lines.join(newline);
        content.push_str(newline);

        if let Some(parent) = script_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        tokio::fs::write(&script_path, content)
            .await
            .map_err(|e| LauncherError::io(&script_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = tokio::fs::metadata(&script_path)
                .await
                .map_err(|e| LauncherError::io(&script_path, e))?
                .permissions();
            perms.set_mode(perms.mode() | 0o755);
            tokio::fs::set_permissions(&script_path, perms)
                .await
                .map_err(|e| LauncherError::io(&script_path, e))?;
        }

        info!("Wrote launch script {:?}", script_path);
        Ok(script_path)
    }
}

/// Run the user's pre-launch command through the platform shell and wait.
async fn run_pre_launch_command(command: &str, dir: &Path) -> LauncherResult<()> {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut cmd = tokio::process::Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    };
    if dir.is_dir() {
        cmd.current_dir(dir);
    }

    info!("Running pre-launch command: {}", command);
    let status = cmd
        .status()
        .await
        .map_err(|e| LauncherError::JavaExecution(format!("pre-launch command: {}", e)))?;
    if !status.success() {
        warn!("Pre-launch command exited with {:?}", status.code());
    }
    Ok(())
}

fn physical_memory_mb() -> u64 {
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    system.total_memory() / 1024 / 1024
}
