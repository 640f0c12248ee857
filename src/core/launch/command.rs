// ─── Launch Command Builder ───
// Turns a resolved version plus launch options into the full argv.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::arguments::{sanitize_window_args, strip_classpath_args, Placeholders};
use super::classpath::{get_classpath_separator, safe_path_str};
use super::options::{tokenize_args, LaunchOptions};
use crate::core::auth::AuthSession;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::{APP_NAME, APP_VERSION};
use crate::core::layout::GameLayout;
use crate::core::version::{Features, OsName, Platform, VersionManifest};

const WINDOWS_HEAP_DUMP_FLAG: &str =
    "-XX:HeapDumpPath=MojangTricksIntelDriversForPerformance_javaw.exe_minecraft.exe.heapdump";

/// Inputs for one launch command.
pub struct LaunchCommandBuilder<'a> {
    pub version: &'a VersionManifest,
    pub options: &'a LaunchOptions,
    pub session: &'a AuthSession,
    pub layout: &'a GameLayout,
    pub platform: &'a Platform,
    pub natives_dir: PathBuf,
    /// Value of `${game_assets}`: the virtual asset root or `assets/`.
    pub game_assets: PathBuf,
    pub classpath: String,
    /// Physical memory in MB for the `-Xmx` sanity warning.
    pub physical_memory_mb: Option<u64>,
}

impl<'a> LaunchCommandBuilder<'a> {
    pub fn new(
        version: &'a VersionManifest,
        options: &'a LaunchOptions,
        session: &'a AuthSession,
        layout: &'a GameLayout,
        platform: &'a Platform,
    ) -> Self {
        Self {
            version,
            options,
            session,
            layout,
            platform,
            natives_dir: layout.natives_dir(&version.id),
            game_assets: layout.assets_dir(),
            classpath: String::new(),
            physical_memory_mb: None,
        }
    }

    pub fn natives_dir(mut self, dir: PathBuf) -> Self {
        self.natives_dir = dir;
        self
    }

    pub fn game_assets(mut self, dir: PathBuf) -> Self {
        self.game_assets = dir;
        self
    }

    pub fn classpath(mut self, classpath: String) -> Self {
        self.classpath = classpath;
        self
    }

    pub fn physical_memory_mb(mut self, mb: u64) -> Self {
        self.physical_memory_mb = Some(mb);
        self
    }

    /// Values for every supported `${...}` placeholder.
    pub fn placeholders(&self) -> Placeholders {
        let version = self.version;
        let options = self.options;
        let session = self.session;

        let mut p = Placeholders::new();
        p.set("auth_player_name", session.player_name.as_str())
            .set("auth_session", session.session.as_str())
            .set("auth_uuid", session.uuid.as_str())
            .set("auth_access_token", session.access_token.as_str())
            .set("user_type", session.user_type.as_str())
            .set("user_properties", session.user_properties.as_str())
            .set(
                "version_name",
                options.version_name.as_deref().unwrap_or(&version.id),
            )
            .set(
                "version_type",
                version.version_type.as_deref().unwrap_or("release"),
            )
            .set("profile_name", options.profile_name.as_str())
            .set("game_directory", safe_path_str(&options.game_dir))
            .set("game_assets", safe_path_str(&self.game_assets))
            .set("assets_root", safe_path_str(&self.layout.assets_dir()))
            .set("assets_index_name", version.asset_index_id())
            .set("natives_directory", safe_path_str(&self.natives_dir))
            .set("library_directory", safe_path_str(&self.layout.libraries_dir()))
            .set("classpath", self.classpath.as_str())
            .set("classpath_separator", get_classpath_separator())
            .set("launcher_name", APP_NAME)
            .set("launcher_version", APP_VERSION)
            .set("resolution_width", options.width.to_string())
            .set("resolution_height", options.height.to_string());
        p
    }

    pub fn build(&self) -> LauncherResult<Vec<String>> {
        let main_class = self
            .version
            .main_class
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| LauncherError::MalformedVersion {
                id: self.version.id.clone(),
                reason: "no mainClass".into(),
            })?;
        if self.classpath.trim().is_empty() {
            return Err(LauncherError::Other(format!(
                "Empty classpath for version {}",
                self.version.id
            )));
        }

        let placeholders = self.placeholders();
        // Window size is appended below, so the templated variant stays off.
        let features = Features::new();
        let mut argv = self.head_command(&placeholders, &features);

        argv.push("-cp".into());
        argv.push(self.classpath.clone());
        argv.push(main_class.to_string());

        let game_templates = self
            .version
            .game_argument_templates(self.platform, &features);
        argv.extend(sanitize_window_args(
            placeholders.substitute_args(&game_templates),
        ));
        argv.extend(self.trailing_game_args());

        debug!("Built launch command with {} arguments", argv.len());
        Ok(argv)
    }

    /// Wrapper, java, user JVM args and generated JVM flags.
    fn head_command(&self, placeholders: &Placeholders, features: &Features) -> Vec<String> {
        let options = self.options;
        let mut argv = Vec::new();

        if let Some(wrapper) = &options.wrapper {
            argv.extend(tokenize_args(wrapper));
        }
        argv.push(options.java_path.to_string_lossy().to_string());
        argv.extend(options.java_args.iter().cloned());

        if options.no_jvm_args {
            return argv;
        }

        let is_windows = self.platform.os == OsName::Windows;
        if is_windows {
            argv.push(WINDOWS_HEAP_DUMP_FLAG.into());
        }
        if !has_flag(&options.java_args, "-XX:+UseG1GC") {
            argv.push("-XX:+UseG1GC".into());
            argv.push("-XX:-UseAdaptiveSizePolicy".into());
            argv.push("-XX:-OmitStackTraceInFastThrow".into());
            argv.push("-Xmn128m".into());
        }

        if let Some(perm) = options.perm_size_mb {
            if options.java_major.is_some_and(|major| major < 8) {
                argv.push(format!("-XX:PermSize={}m", perm));
            } else {
                argv.push(format!("-XX:MetaspaceSize={}m", perm));
            }
        }

        if let Some(max) = options.max_memory_mb {
            if !options.not_check_jvm {
                if let Some(physical) = self.physical_memory_mb {
                    if u64::from(max) > physical {
                        warn!(
                            "-Xmx{}m exceeds physical memory of {} MB",
                            max, physical
                        );
                    }
                }
            }
            argv.push(format!("-Xmx{}m", max));
        }
        if let Some(min) = options.min_memory_mb {
            argv.push(format!("-Xms{}m", min));
        }

        match self
            .version
            .jvm_argument_templates(self.platform, features)
        {
            Some(templates) => {
                argv.extend(strip_classpath_args(placeholders.substitute_args(&templates)));
            }
            None => {
                argv.push(format!(
                    "-Djava.library.path={}",
                    safe_path_str(&self.natives_dir)
                ));
                argv.push(format!("-Dminecraft.launcher.brand={}", APP_NAME));
                argv.push(format!("-Dminecraft.launcher.version={}", APP_VERSION));
            }
        }

        argv.push("-Dfml.ignoreInvalidMinecraftCertificates=true".into());
        argv.push("-Dfml.ignorePatchDiscrepancies=true".into());

        if !is_windows {
            if let Some(home) = Path::new(&safe_path_str(&options.game_dir)).parent() {
                argv.push(format!("-Duser.home={}", home.to_string_lossy()));
            }
        }

        argv
    }

    /// Window, server, proxy and user game arguments.
    fn trailing_game_args(&self) -> Vec<String> {
        let options = self.options;
        let mut args = Vec::new();

        if options.height > 0 {
            args.push("--height".into());
            args.push(options.height.to_string());
        }
        if options.width > 0 {
            args.push("--width".into());
            args.push(options.width.to_string());
        }

        if let Some((host, port)) = options.server_address() {
            args.push("--server".into());
            args.push(host);
            args.push("--port".into());
            args.push(port.to_string());
        }

        if options.fullscreen {
            args.push("--fullscreen".into());
        }

        if let Some(proxy) = options.proxy.as_ref().filter(|p| !p.host.trim().is_empty()) {
            args.push("--proxyHost".into());
            args.push(proxy.host.clone());
            args.push("--proxyPort".into());
            args.push(proxy.port.to_string());
            if let Some(user) = proxy.user.as_deref().filter(|u| !u.is_empty()) {
                args.push("--proxyUser".into());
                args.push(user.to_string());
                args.push("--proxyPass".into());
                args.push(proxy.password.clone().unwrap_or_default());
            }
        }

        args.extend(options.minecraft_args.iter().cloned());
        args
    }
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|arg| arg == flag)
}
