// ─── Craftlaunch CLI ───
// Lists, installs and launches versions of a game directory.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};

use craftlaunch_lib::core::assets::AssetReconciler;
use craftlaunch_lib::core::auth::AuthSession;
use craftlaunch_lib::core::config::{ConfigStore, LauncherSettings, VersionSettings};
use craftlaunch_lib::core::downloader::Downloader;
use craftlaunch_lib::core::error::{LauncherError, LauncherResult};
use craftlaunch_lib::core::http::build_http_client;
use craftlaunch_lib::core::install::GameInstaller;
use craftlaunch_lib::core::java::JavaRuntime;
use craftlaunch_lib::core::launch::process::format_command;
use craftlaunch_lib::core::launch::{
    AutoConfirm, GameLauncher, LaunchListener, LaunchState, ProcessEvent, Prompt,
};
use craftlaunch_lib::core::layout::GameLayout;
use craftlaunch_lib::core::modpack::{ModpackInfo, ModpackManager, SUGGESTED_BLACKLIST};
use craftlaunch_lib::core::version::{VersionManager, VersionRepairer};

/// Minecraft version manager and launcher.
#[derive(Parser, Debug)]
#[command(name = "craftlaunch")]
#[command(version, about)]
struct Cli {
    /// Game directory [default: from the selected profile].
    #[arg(long, global = true, value_name = "DIR")]
    game_dir: Option<PathBuf>,

    /// Settings file [default: platform data directory].
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Answer yes to every prompt.
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List installed versions, or downloadable releases with --remote.
    List {
        #[arg(long)]
        remote: bool,
        /// Include hidden (dependency-only) versions.
        #[arg(long)]
        all: bool,
    },

    /// Download a version with its libraries and assets.
    Install { id: String },

    /// Report whether all assets of a version are present.
    CheckAssets { id: String },

    /// Prepare and start a version.
    Launch(LaunchArgs),

    /// Pack a version's run directory and JSON into a modpack zip.
    ExportModpack {
        id: String,
        output: PathBuf,
        /// Pack name written to modpack.json [default: the version id].
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Extra relative paths to leave out; repeatable.
        #[arg(long = "exclude", value_name = "PATH")]
        exclude: Vec<String>,
        /// Also leave out saves, options and other personal files.
        #[arg(long)]
        no_personal: bool,
    },

    /// Install a modpack zip as a new version.
    ImportModpack {
        archive: PathBuf,
        /// Version id [default: the pack name].
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Args, Debug)]
struct LaunchArgs {
    id: String,

    /// Offline player name [default: last used].
    #[arg(short, long)]
    player: Option<String>,

    /// Java executable overriding the version settings.
    #[arg(long, value_name = "PATH")]
    java: Option<PathBuf>,

    /// Maximum heap in MB.
    #[arg(long, value_name = "MB")]
    max_memory: Option<u32>,

    /// Print the command instead of starting the game.
    #[arg(long)]
    dry_run: bool,

    /// Write a launch script to this path instead of starting the game.
    #[arg(long, value_name = "FILE")]
    script: Option<PathBuf>,
}

/// Asks every prompt on the terminal.
struct TerminalListener;

impl LaunchListener for TerminalListener {
    fn on_state_changed(&self, state: LaunchState) {
        info!("Launch state: {:?}", state);
    }

    fn confirm(&self, prompt: &Prompt) -> bool {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "{} [y/N] ", prompt);
        let _ = stderr.flush();

        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

#[tokio::main]
async fn main() {
    craftlaunch_lib::init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> LauncherResult<()> {
    let store = match &cli.config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::default_location(),
    };
    let mut settings = store.load().await;
    let profile = settings.selected_profile();
    let layout = GameLayout::new(cli.game_dir.clone().unwrap_or_else(|| profile.game_dir.clone()));
    info!("Using game directory {:?}", layout.base_dir());

    let listener: Arc<dyn LaunchListener> = if cli.yes {
        Arc::new(AutoConfirm(true))
    } else {
        Arc::new(TerminalListener)
    };

    let client = build_http_client()?;
    let downloader = Downloader::new(client).with_concurrency(settings.download_concurrency);
    let installer = GameInstaller::new(layout.clone(), downloader);

    match cli.command {
        Command::List { remote: true, .. } => {
            for entry in installer.version_list().await?.releases() {
                println!("{}\t{}", entry.id, entry.release_time.format("%Y-%m-%d"));
            }
        }
        Command::List { remote: false, all } => {
            let mut versions = VersionManager::new(layout);
            versions
                .refresh(listener.as_ref(), Some(&installer as &dyn VersionRepairer))
                .await?;
            for version in versions.versions().filter(|v| all || !v.hidden) {
                println!(
                    "{}\t{}",
                    version.id,
                    version.version_type.as_deref().unwrap_or("unknown")
                );
            }
        }
        Command::Install { id } => {
            installer.install_version(&id, false).await?;
            println!("Installed {}", id);
        }
        Command::CheckAssets { id } => {
            let mut versions = VersionManager::new(layout.clone());
            versions
                .refresh(listener.as_ref(), Some(&installer as &dyn VersionRepairer))
                .await?;
            let version = versions.resolve(&id)?;
            let index_id = version.asset_index_id();
            let reconciler = AssetReconciler::new(layout);
            if reconciler.check_assets_exist(index_id).await {
                println!("Assets of {} ({}) are complete", id, index_id);
            } else {
                let missing = reconciler.missing_objects(index_id).await.unwrap_or_default();
                println!(
                    "Assets of {} ({}) are incomplete: {} objects missing",
                    id,
                    index_id,
                    missing.len()
                );
            }
        }
        Command::Launch(args) => {
            launch(args, layout, &mut settings, listener, installer).await?;
            store.save(&settings).await?;
        }
        Command::ExportModpack {
            id,
            output,
            name,
            description,
            mut exclude,
            no_personal,
        } => {
            let mut versions = VersionManager::new(layout.clone());
            versions
                .refresh(listener.as_ref(), Some(&installer as &dyn VersionRepairer))
                .await?;
            if no_personal {
                exclude.extend(SUGGESTED_BLACKLIST.iter().map(|s| s.to_string()));
            }
            let info = ModpackInfo {
                name: Some(name.unwrap_or_else(|| id.clone())),
                description,
            };
            let count = ModpackManager::new(layout)
                .export(&versions, &id, &output, &exclude, &info)
                .await?;
            println!("Exported {} files to {}", count, output.display());
        }
        Command::ImportModpack { archive, id } => {
            let id = ModpackManager::new(layout).import(&archive, id.as_deref()).await?;
            println!("Imported {}", id);
        }
    }

    Ok(())
}

async fn launch(
    args: LaunchArgs,
    layout: GameLayout,
    settings: &mut LauncherSettings,
    listener: Arc<dyn LaunchListener>,
    installer: GameInstaller,
) -> LauncherResult<()> {
    let profile = settings.selected_profile();
    let mut versions = VersionManager::new(layout.clone());
    versions
        .refresh(listener.as_ref(), Some(&installer as &dyn VersionRepairer))
        .await?;
    if versions.get(&args.id).is_none() {
        return Err(LauncherError::VersionNotFound(args.id));
    }

    let version_settings = VersionSettings::load(&layout, &args.id)
        .await
        .unwrap_or_else(|| profile.global.clone());
    let game_dir =
        version_settings.game_dir_for(&layout, &args.id, &versions.run_directory(&args.id));
    let mut options =
        version_settings.to_launch_options(game_dir, &profile.name, settings.proxy.clone());
    if let Some(java) = args.java {
        options.java_path = java;
    }
    if let Some(mb) = args.max_memory {
        options.max_memory_mb = Some(mb);
    }

    match JavaRuntime::detect(&options.java_path).await {
        Ok(runtime) => {
            info!("Using Java {} at {:?}", runtime.version, runtime.path);
            options.java_major = Some(runtime.major);
        }
        Err(e) => warn!("{}", e),
    }
    if let (Some(required), Some(found)) = (
        versions.resolve(&args.id).ok().and_then(|v| v.required_java_major()),
        options.java_major,
    ) {
        if found < required {
            warn!("{} needs Java {}, found Java {}", args.id, required, found);
        }
    }

    let player = args
        .player
        .unwrap_or_else(|| settings.last_player_name.clone());
    let session = AuthSession::offline(&player);
    settings.last_player_name = session.player_name.clone();

    let mut launcher =
        GameLauncher::new(versions, options, session.clone(), listener).with_installer(installer);
    let plan = launcher.make_launch_command(&args.id).await?;

    if let Some(path) = args.script {
        let written = launcher.write_launch_script(&plan, &path).await?;
        println!("{}", written.display());
        return Ok(());
    }
    if args.dry_run {
        println!("{}", session.redact(&format_command(&plan.argv)));
        return Ok(());
    }

    let mut process = launcher.launch(&plan).await?;
    while let Some(event) = process.next_event().await {
        match event {
            ProcessEvent::Output { .. } => {}
            ProcessEvent::Crash(signal) => eprintln!("{}: {:?}", args.id, signal),
            ProcessEvent::Exited => {
                info!("{} exited normally", args.id);
                break;
            }
            ProcessEvent::ExitedAbnormally { code } => {
                eprintln!("{} exited with code {:?}", args.id, code);
                break;
            }
        }
    }
    Ok(())
}
