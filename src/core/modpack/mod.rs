// ─── Modpacks ───
// Zip archives holding a run directory under `minecraft/`, the resolved
// version JSON as `minecraft/pack.json` and a `modpack.json` description.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::layout::GameLayout;
use crate::core::version::VersionManager;

/// Never exported: caches, logs, downloads and files owned by the launcher.
pub const MODPACK_BLACKLIST: &[&str] = &[
    "usernamecache.json",
    "asm",
    "logs",
    "backups",
    "versions",
    "assets",
    "usercache.json",
    "libraries",
    "crash-reports",
    "launcher_profiles.json",
    "NVIDIA",
    "AMD",
    "TCNodeTracker",
    "screenshots",
    "natives",
    "native",
    "$native",
    "pack.json",
    "launcher.jar",
    "minetweaker.log",
    "launcher.pack.lzma",
];

/// Personal files a user usually leaves out of a pack.
pub const SUGGESTED_BLACKLIST: &[&str] = &[
    "fonts",
    "saves",
    "servers.dat",
    "options.txt",
    "optionsof.txt",
    "journeymap",
    "optionsshaders.txt",
    "mods/VoxelMods",
];

const ROOT: &str = "minecraft/";
const PACK_JSON: &str = "minecraft/pack.json";
const INFO_JSON: &str = "modpack.json";

/// Contents of `modpack.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModpackInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `true` when `relative` (with `/` separators) is a blacklisted file or
/// lies under a blacklisted directory.
pub fn is_blacklisted(blacklist: &[String], relative: &str) -> bool {
    blacklist.iter().any(|entry| {
        relative == entry
            || relative
                .strip_prefix(entry.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

pub struct ModpackManager {
    layout: GameLayout,
}

impl ModpackManager {
    pub fn new(layout: GameLayout) -> Self {
        Self { layout }
    }

    // ── Export ──────────────────────────────────────────

    /// Pack the run directory of `id` and its resolved JSON into `output`.
    ///
    /// `extra_blacklist` adds relative paths to [`MODPACK_BLACKLIST`].
    /// Returns the number of game files written.
    pub async fn export(
        &self,
        versions: &VersionManager,
        id: &str,
        output: &Path,
        extra_blacklist: &[String],
        info: &ModpackInfo,
    ) -> LauncherResult<usize> {
        let mut version = versions.resolve(id)?;
        version.jar = Some(version.jar_id().to_string());
        version.run_dir = Some("version".into());
        let pack_json = serde_json::to_string_pretty(&version)?;
        let info_json = serde_json::to_string_pretty(info)?;

        let mut blacklist: Vec<String> = MODPACK_BLACKLIST.iter().map(|s| s.to_string()).collect();
        blacklist.extend(extra_blacklist.iter().cloned());
        blacklist.push(format!("{}.jar", id));
        blacklist.push(format!("{}.json", id));
        blacklist.push(format!("{}-natives", id));

        let run_dir = versions.run_directory(id);
        let output = output.to_path_buf();
        info!("Exporting {} from {:?} to {:?}", id, run_dir, output);

        tokio::task::spawn_blocking(move || -> LauncherResult<usize> {
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
            }
            let file = std::fs::File::create(&output).map_err(|e| LauncherError::io(&output, e))?;
            let mut zip = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);

            let mut count = 0usize;
            add_dir_to_zip(&mut zip, &run_dir, &run_dir, &blacklist, options, &mut count)?;

            zip.start_file(PACK_JSON, options)?;
            zip.write_all(pack_json.as_bytes())
                .map_err(|e| LauncherError::io(&output, e))?;
            zip.start_file(INFO_JSON, options)?;
            zip.write_all(info_json.as_bytes())
                .map_err(|e| LauncherError::io(&output, e))?;
            zip.finish()?;
            Ok(count)
        })
        .await
        .map_err(|e| LauncherError::Other(format!("Task join error: {}", e)))?
    }

    // ── Import ──────────────────────────────────────────

    /// Read `modpack.json` from an archive.
    pub async fn read_info(&self, archive: &Path) -> LauncherResult<ModpackInfo> {
        let archive = archive.to_path_buf();
        tokio::task::spawn_blocking(move || -> LauncherResult<ModpackInfo> {
            let file = std::fs::File::open(&archive).map_err(|e| LauncherError::io(&archive, e))?;
            let mut zip = zip::ZipArchive::new(file)?;
            let entry = match zip.by_name(INFO_JSON) {
                Ok(entry) => entry,
                Err(zip::result::ZipError::FileNotFound) => return Ok(ModpackInfo::default()),
                Err(e) => return Err(e.into()),
            };
            Ok(serde_json::from_reader(entry)?)
        })
        .await
        .map_err(|e| LauncherError::Other(format!("Task join error: {}", e)))?
    }

    /// Install an archive as version `id`, or under the name from its
    /// `modpack.json`. Returns the installed id.
    ///
    /// An existing version of that id is moved to `<id>-<timestamp>` and
    /// its `saves` are carried over.
    pub async fn import(&self, archive: &Path, id: Option<&str>) -> LauncherResult<String> {
        let id = match id {
            Some(id) => id.to_string(),
            None => self
                .read_info(archive)
                .await?
                .name
                .filter(|name| !name.trim().is_empty())
                .ok_or_else(|| LauncherError::Other("Modpack has no name, pass an id".into()))?,
        };
        if !is_plain_name(&id) {
            return Err(LauncherError::Other(format!("Invalid version id {:?}", id)));
        }

        let target = self.layout.version_root(&id);
        let backup = if target.exists() {
            let backup_id = format!("{}-{}", id, chrono::Utc::now().timestamp_millis());
            self.move_version(&id, &backup_id).await?;
            info!("Backed up previous {} to {}", id, backup_id);
            Some(backup_id)
        } else {
            None
        };

        let archive_path = archive.to_path_buf();
        let dest = target.clone();
        let extracted = tokio::task::spawn_blocking(move || extract_pack(&archive_path, &dest))
            .await
            .map_err(|e| LauncherError::Other(format!("Task join error: {}", e)))?;
        if let Err(e) = extracted {
            let _ = tokio::fs::remove_dir_all(&target).await;
            if let Some(backup_id) = &backup {
                if let Err(e) = self.move_version(backup_id, &id).await {
                    warn!("Failed to restore {}: {}", backup_id, e);
                }
            }
            return Err(e);
        }

        let pack_path = target.join("pack.json");
        let raw = tokio::fs::read_to_string(&pack_path)
            .await
            .map_err(|e| LauncherError::io(&pack_path, e))?;
        let mut pack: serde_json::Value = serde_json::from_str(&raw)?;
        if let Some(object) = pack.as_object_mut() {
            object.insert("id".into(), serde_json::Value::String(id.clone()));
        }
        let json_path = self.layout.version_json(&id);
        tokio::fs::write(&json_path, serde_json::to_string_pretty(&pack)?)
            .await
            .map_err(|e| LauncherError::io(&json_path, e))?;
        if pack_path != json_path {
            tokio::fs::remove_file(&pack_path)
                .await
                .map_err(|e| LauncherError::io(&pack_path, e))?;
        }

        if let Some(backup_id) = backup {
            let saves = self.layout.version_root(&backup_id).join("saves");
            if saves.is_dir() {
                let dest = target.join("saves");
                let _ = tokio::fs::remove_dir_all(&dest).await;
                tokio::task::spawn_blocking(move || copy_dir(&saves, &dest))
                    .await
                    .map_err(|e| LauncherError::Other(format!("Task join error: {}", e)))??;
                info!("Restored saves of {}", id);
            }
        }

        info!("Imported modpack as {}", id);
        Ok(id)
    }

    /// Rename a version folder along with its JSON and jar.
    async fn move_version(&self, from: &str, to: &str) -> LauncherResult<()> {
        let source = self.layout.version_root(from);
        let dest = self.layout.version_root(to);
        tokio::fs::rename(&source, &dest)
            .await
            .map_err(|e| LauncherError::io(&source, e))?;
        for ext in ["json", "jar"] {
            let old = dest.join(format!("{}.{}", from, ext));
            if old.exists() {
                let new = dest.join(format!("{}.{}", to, ext));
                if let Err(e) = tokio::fs::rename(&old, &new).await {
                    warn!("Failed to rename {:?}: {}", old, e);
                }
            }
        }
        Ok(())
    }
}

fn add_dir_to_zip(
    zip: &mut zip::ZipWriter<std::fs::File>,
    root: &Path,
    dir: &Path,
    blacklist: &[String],
    options: zip::write::SimpleFileOptions,
    count: &mut usize,
) -> LauncherResult<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| LauncherError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        if is_blacklisted(blacklist, &relative) {
            debug!("Leaving {} out of the modpack", relative);
            continue;
        }
        if path.is_dir() {
            add_dir_to_zip(zip, root, &path, blacklist, options, count)?;
            continue;
        }
        if !path.is_file() {
            continue;
        }
        zip.start_file(format!("{}{}", ROOT, relative), options)?;
        let mut src = std::fs::File::open(&path).map_err(|e| LauncherError::io(&path, e))?;
        std::io::copy(&mut src, zip).map_err(|e| LauncherError::io(&path, e))?;
        *count += 1;
    }
    Ok(())
}

/// Unpack every entry under `minecraft/` into `dest`.
fn extract_pack(archive: &Path, dest: &Path) -> LauncherResult<()> {
    let file = std::fs::File::open(archive).map_err(|e| LauncherError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file)?;
    let pack: serde_json::Value = match zip.by_name(PACK_JSON) {
        Ok(entry) => serde_json::from_reader(entry)?,
        Err(_) => {
            return Err(LauncherError::Other(format!(
                "{:?} is not a modpack: no {}",
                archive, PACK_JSON
            )))
        }
    };
    if pack.get("jar").and_then(|v| v.as_str()).is_none() {
        return Err(LauncherError::Other(format!(
            "{:?} is not a modpack: {} names no game jar",
            archive, PACK_JSON
        )));
    }

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe modpack entry {}", entry.name());
            continue;
        };
        let Ok(relative) = relative.strip_prefix("minecraft") else {
            continue;
        };
        if relative.as_os_str().is_empty()
            || !relative.components().all(|c| matches!(c, Component::Normal(_)))
        {
            continue;
        }
        let out_path = dest.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| LauncherError::io(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let mut out = std::fs::File::create(&out_path).map_err(|e| LauncherError::io(&out_path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::io(&out_path, e))?;
    }
    Ok(())
}

fn copy_dir(from: &Path, to: &Path) -> LauncherResult<()> {
    std::fs::create_dir_all(to).map_err(|e| LauncherError::io(to, e))?;
    for entry in std::fs::read_dir(from).map_err(|e| LauncherError::io(from, e))? {
        let entry = entry.map_err(|e| LauncherError::io(from, e))?;
        let target = to.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| LauncherError::io(&target, e))?;
        }
    }
    Ok(())
}

fn is_plain_name(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\'])
}
