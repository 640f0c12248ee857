// ─── Version Manager ───
// Catalog of installed versions under `<base>/versions/`, with repair
// prompts for broken folders and `inheritsFrom` resolution.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::manifest::VersionManifest;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::launch::events::{LaunchListener, Prompt};
use crate::core::layout::GameLayout;

/// Re-fetches a version JSON whose local copy is unusable.
#[async_trait]
pub trait VersionRepairer: Send + Sync {
    async fn redownload_version_json(&self, id: &str) -> LauncherResult<()>;
}

/// Folders and files in a run directory that are safe to wipe.
const CLEANABLE_DIRS: &[&str] = &[
    "natives",
    "native",
    "$native",
    "AMD",
    "NVIDIA",
    "crash-reports",
    "logs",
    "asm",
    "server-resource-packs",
];
const CLEANABLE_FILES: &[&str] = &["output-client.log", "usercache.json", "usernamecache.json"];

pub struct VersionManager {
    layout: GameLayout,
    versions: BTreeMap<String, VersionManifest>,
}

impl VersionManager {
    pub fn new(layout: GameLayout) -> Self {
        Self {
            layout,
            versions: BTreeMap::new(),
        }
    }

    pub fn layout(&self) -> &GameLayout {
        &self.layout
    }

    // ── Catalog ─────────────────────────────────────────

    /// Installed versions sorted by id, hidden ones included.
    pub fn versions(&self) -> impl Iterator<Item = &VersionManifest> {
        self.versions.values()
    }

    /// Versions meant to be shown to the user.
    pub fn visible_versions(&self) -> impl Iterator<Item = &VersionManifest> {
        self.versions.values().filter(|v| !v.hidden)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&VersionManifest> {
        if id.trim().is_empty() {
            return None;
        }
        self.versions.get(id)
    }

    /// Rescan `<base>/versions/`.
    ///
    /// For each folder `<id>`:
    /// - a lone JSON with another name → ask to rename it to `<id>.json`
    /// - still no `<id>.json` → ask to delete the folder, then skip it
    /// - unparsable JSON → ask to re-download through `repairer`, skip on failure
    /// - JSON whose `id` differs from the folder → rewrite the id
    pub async fn refresh(
        &mut self,
        listener: &dyn LaunchListener,
        repairer: Option<&dyn VersionRepairer>,
    ) -> LauncherResult<()> {
        self.versions.clear();

        if self.layout.base_dir().is_dir() {
            if let Err(e) = write_launcher_profiles(&self.layout).await {
                warn!("Failed to create launcher_profiles.json: {}", e);
            }
        }

        let versions_dir = self.layout.versions_dir();
        if !versions_dir.exists() {
            debug!("No versions directory at {:?}", versions_dir);
            return Ok(());
        }

        let mut entries = tokio::fs::read_dir(&versions_dir)
            .await
            .map_err(|e| LauncherError::io(&versions_dir, e))?;

        let mut dirs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LauncherError::io(&versions_dir, e))?
        {
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();

        for dir in dirs {
            let Some(id) = dir.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            match self.load_version_dir(&id, &dir, listener, repairer).await {
                Ok(Some(version)) => {
                    debug!("Loaded version {}", id);
                    self.versions.insert(id, version);
                }
                Ok(None) => {}
                Err(e) => warn!("Skipping version folder {}: {}", id, e),
            }
        }

        info!("Found {} installed versions", self.versions.len());
        Ok(())
    }

    async fn load_version_dir(
        &self,
        id: &str,
        dir: &Path,
        listener: &dyn LaunchListener,
        repairer: Option<&dyn VersionRepairer>,
    ) -> LauncherResult<Option<VersionManifest>> {
        let json_path = self.layout.version_json(id);

        if !json_path.exists() {
            let candidates = match json_files_in(dir).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!("Skipping unreadable version folder {}: {}", id, e);
                    return Ok(None);
                }
            };
            if let [found] = candidates.as_slice() {
                let found_name = file_name_of(found);
                warn!("Version folder {} holds mismatched json {}", id, found_name);
                let prompt = Prompt::MismatchedVersionJson {
                    id: id.to_string(),
                    found: found_name,
                };
                if listener.confirm(&prompt) {
                    if let Err(e) = tokio::fs::rename(found, &json_path).await {
                        warn!("Failed to rename {:?}: {}", found, e);
                    }
                }
            }
        }

        if !json_path.exists() {
            let prompt = Prompt::UnrecoverableVersion { id: id.to_string() };
            if listener.confirm(&prompt) {
                if let Err(e) = tokio::fs::remove_dir_all(dir).await {
                    warn!("Failed to delete {:?}: {}", dir, e);
                }
            }
            return Ok(None);
        }

        let mut raw = match read_version_value(&json_path).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Malformed json for version {}: {}", id, e);
                let prompt = Prompt::MalformedVersion { id: id.to_string() };
                let Some(repairer) = repairer.filter(|_| listener.confirm(&prompt)) else {
                    return Ok(None);
                };
                if let Err(e) = repairer.redownload_version_json(id).await {
                    warn!("Could not re-download version {}: {}", id, e);
                    return Ok(None);
                }
                match read_version_value(&json_path).await {
                    Ok(value) => value,
                    Err(e) => {
                        warn!("Ignoring {:?}, json is still malformed: {}", dir, e);
                        return Ok(None);
                    }
                }
            }
        };

        let declared_id = raw.get("id").and_then(|v| v.as_str()).unwrap_or_default();
        if declared_id != id {
            warn!(
                "Version folder {} declares id {:?}, rewriting it",
                id, declared_id
            );
            if let Some(object) = raw.as_object_mut() {
                object.insert("id".into(), serde_json::Value::String(id.to_string()));
            }
            let pretty = serde_json::to_string_pretty(&raw)?;
            if let Err(e) = tokio::fs::write(&json_path, pretty).await {
                warn!("Failed to rewrite {:?}: {}", json_path, e);
            }
        }

        match serde_json::from_value::<VersionManifest>(raw) {
            Ok(version) => Ok(Some(version)),
            Err(e) => {
                warn!("Ignoring {:?}, json is not a version: {}", dir, e);
                Ok(None)
            }
        }
    }

    // ── Resolution ──────────────────────────────────────

    /// Merge the `inheritsFrom` chain of `id` into a single manifest.
    pub fn resolve(&self, id: &str) -> LauncherResult<VersionManifest> {
        let mut chain: Vec<&VersionManifest> = Vec::new();
        let mut visited = HashSet::new();
        let mut current = self
            .get(id)
            .ok_or_else(|| LauncherError::VersionNotFound(id.to_string()))?;

        loop {
            if !visited.insert(current.id.as_str()) {
                return Err(LauncherError::CircularInheritance(current.id.clone()));
            }
            chain.push(current);

            let Some(parent_id) = current.inherits_from.as_deref() else {
                break;
            };
            current = self
                .get(parent_id)
                .ok_or_else(|| LauncherError::MissingParentVersion {
                    version: current.id.clone(),
                    parent: parent_id.to_string(),
                })?;
        }

        let mut iter = chain.into_iter().rev();
        let mut resolved = match iter.next() {
            Some(root) => root.clone(),
            None => return Err(LauncherError::VersionNotFound(id.to_string())),
        };
        for child in iter {
            resolved = child.merged_over(&resolved);
        }
        Ok(resolved)
    }

    // ── Paths ───────────────────────────────────────────

    pub fn version_root(&self, id: &str) -> PathBuf {
        self.layout.version_root(id)
    }

    /// Working directory of the game: the version folder when its
    /// `runDir` is `"version"`, otherwise the base directory.
    pub fn run_directory(&self, id: &str) -> PathBuf {
        match self.get(id).and_then(|v| v.run_dir.as_deref()) {
            Some("version") => self.layout.version_root(id),
            _ => self.layout.base_dir().to_path_buf(),
        }
    }

    pub fn jar_path(&self, version: &VersionManifest) -> PathBuf {
        self.layout.version_jar(version.jar_id())
    }

    pub fn natives_dir(&self, id: &str) -> PathBuf {
        self.layout.natives_dir(id)
    }

    // ── Mutations ───────────────────────────────────────

    /// Delete a version folder. Missing folders are not an error.
    pub async fn remove(&mut self, id: &str) -> LauncherResult<()> {
        let root = self.layout.version_root(id);
        self.versions.remove(id);
        if !root.exists() {
            return Ok(());
        }
        tokio::fs::remove_dir_all(&root)
            .await
            .map_err(|e| LauncherError::io(&root, e))?;
        info!("Removed version {}", id);
        Ok(())
    }

    /// Rename a version folder together with its JSON, jar and declared id.
    pub async fn rename(&mut self, from: &str, to: &str) -> LauncherResult<()> {
        let from_root = self.layout.version_root(from);
        let to_root = self.layout.version_root(to);
        if to_root.exists() {
            return Err(LauncherError::Other(format!("Version {} already exists", to)));
        }
        tokio::fs::rename(&from_root, &to_root)
            .await
            .map_err(|e| LauncherError::io(&from_root, e))?;

        let old_json = to_root.join(format!("{}.json", from));
        let new_json = self.layout.version_json(to);
        tokio::fs::rename(&old_json, &new_json)
            .await
            .map_err(|e| LauncherError::io(&old_json, e))?;

        let mut raw = read_version_value(&new_json).await?;
        if let Some(object) = raw.as_object_mut() {
            object.insert("id".into(), serde_json::Value::String(to.to_string()));
        }
        tokio::fs::write(&new_json, serde_json::to_string_pretty(&raw)?)
            .await
            .map_err(|e| LauncherError::io(&new_json, e))?;

        let old_jar = to_root.join(format!("{}.jar", from));
        if old_jar.exists() {
            let new_jar = to_root.join(format!("{}.jar", to));
            if let Err(e) = tokio::fs::rename(&old_jar, &new_jar).await {
                warn!("Failed to rename jar {:?}: {}", old_jar, e);
            }
        }

        if let Some(mut version) = self.versions.remove(from) {
            version.id = to.to_string();
            self.versions.insert(to.to_string(), version);
        }
        info!("Renamed version {} to {}", from, to);
        Ok(())
    }

    /// Prepare the run directory right before the game starts.
    pub async fn on_launch(&self, id: &str) -> LauncherResult<()> {
        let resource_packs = self.run_directory(id).join("resourcepacks");
        if let Err(e) = tokio::fs::create_dir_all(&resource_packs).await {
            warn!("Failed to create {:?}: {}", resource_packs, e);
        }
        Ok(())
    }

    /// Remove natives, logs, crash reports and caches of a version.
    pub async fn clean_folder(&self, id: &str) -> LauncherResult<()> {
        let natives = self.layout.natives_dir(id);
        if natives.exists() {
            tokio::fs::remove_dir_all(&natives)
                .await
                .map_err(|e| LauncherError::io(&natives, e))?;
        }

        let run_dir = self.run_directory(id);
        for name in CLEANABLE_DIRS {
            let path = run_dir.join(name);
            if path.is_dir() {
                if let Err(e) = tokio::fs::remove_dir_all(&path).await {
                    warn!("Failed to delete {:?}: {}", path, e);
                }
            }
        }
        for name in CLEANABLE_FILES {
            let path = run_dir.join(name);
            if path.is_file() {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!("Failed to delete {:?}: {}", path, e);
                }
            }
        }
        Ok(())
    }
}

async fn read_version_value(path: &Path) -> LauncherResult<serde_json::Value> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LauncherError::io(path, e))?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    if !value.is_object() {
        return Err(LauncherError::MalformedVersion {
            id: file_name_of(path),
            reason: "version json is not an object".into(),
        });
    }
    Ok(value)
}

/// Create a default `launcher_profiles.json` unless one exists.
/// Returns whether a file was written.
pub async fn write_launcher_profiles(layout: &GameLayout) -> LauncherResult<bool> {
    let path = layout.launcher_profiles_file();
    if path.exists() {
        return Ok(false);
    }
    let profiles = serde_json::json!({
        "selectedProfile": "(Default)",
        "profiles": {"(Default)": {"name": "(Default)"}},
        "clientToken": uuid::Uuid::new_v4().to_string(),
    });
    tokio::fs::write(&path, serde_json::to_string_pretty(&profiles)?)
        .await
        .map_err(|e| LauncherError::io(&path, e))?;
    debug!("Created {:?}", path);
    Ok(true)
}

async fn json_files_in(dir: &Path) -> LauncherResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| LauncherError::io(dir, e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| LauncherError::io(dir, e))?
    {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            found.push(path);
        }
    }
    Ok(found)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::launch::events::AutoConfirm;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn temp_base(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "craftlaunch-versions-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("versions")).unwrap();
        dir
    }

    fn write_version(base: &Path, folder: &str, file: &str, json: serde_json::Value) {
        let dir = base.join("versions").join(folder);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file), json.to_string()).unwrap();
    }

    struct FixingRepairer {
        base: PathBuf,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VersionRepairer for FixingRepairer {
        async fn redownload_version_json(&self, id: &str) -> LauncherResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            write_version(
                &self.base,
                id,
                &format!("{}.json", id),
                serde_json::json!({"id": id, "mainClass": "net.minecraft.client.main.Main"}),
            );
            Ok(())
        }
    }

    #[tokio::test]
    async fn refresh_loads_sorted_catalog_and_fixes_ids() {
        let base = temp_base("catalog");
        write_version(&base, "1.8.9", "1.8.9.json", serde_json::json!({"id": "1.8.9"}));
        write_version(&base, "1.12.2", "1.12.2.json", serde_json::json!({"id": "other", "runDir": "version"}));

        let mut manager = VersionManager::new(GameLayout::new(&base));
        manager.refresh(&AutoConfirm(true), None).await.unwrap();

        let ids: Vec<&str> = manager.versions().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["1.12.2", "1.8.9"]);

        let rewritten =
            std::fs::read_to_string(base.join("versions/1.12.2/1.12.2.json")).unwrap();
        assert!(rewritten.contains("\"1.12.2\""));
        assert_eq!(manager.run_directory("1.12.2"), base.join("versions/1.12.2"));
        assert_eq!(manager.run_directory("1.8.9"), base);

        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn refresh_renames_mismatched_json_and_deletes_empty_folders() {
        let base = temp_base("repair");
        write_version(&base, "custom", "renamed.json", serde_json::json!({"id": "custom"}));
        std::fs::create_dir_all(base.join("versions/empty")).unwrap();

        let mut manager = VersionManager::new(GameLayout::new(&base));
        manager.refresh(&AutoConfirm(true), None).await.unwrap();

        assert!(manager.get("custom").is_some());
        assert!(base.join("versions/custom/custom.json").exists());
        assert!(!base.join("versions/empty").exists());

        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn declined_prompts_leave_folders_untouched() {
        let base = temp_base("declined");
        std::fs::create_dir_all(base.join("versions/empty")).unwrap();
        write_version(&base, "broken", "broken.json", serde_json::json!([1, 2]));

        let mut manager = VersionManager::new(GameLayout::new(&base));
        manager.refresh(&AutoConfirm(false), None).await.unwrap();

        assert!(manager.is_empty());
        assert!(base.join("versions/empty").exists());

        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn refresh_creates_launcher_profiles_once() {
        let base = temp_base("profiles");
        let layout = GameLayout::new(&base);
        let mut manager = VersionManager::new(layout.clone());
        manager.refresh(&AutoConfirm(false), None).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(layout.launcher_profiles_file()).unwrap())
                .unwrap();
        assert_eq!(written["selectedProfile"], "(Default)");
        assert_eq!(written["profiles"]["(Default)"]["name"], "(Default)");

        std::fs::write(layout.launcher_profiles_file(), "{\"profiles\":{}}").unwrap();
        manager.refresh(&AutoConfirm(false), None).await.unwrap();
        assert!(!write_launcher_profiles(&layout).await.unwrap());
        assert_eq!(
            std::fs::read_to_string(layout.launcher_profiles_file()).unwrap(),
            "{\"profiles\":{}}"
        );
        let _ = std::fs::remove_dir_all(&base);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_folder_does_not_abort_refresh() {
        use std::os::unix::fs::PermissionsExt;

        let base = temp_base("unreadable");
        write_version(&base, "1.8.9", "1.8.9.json", serde_json::json!({"id": "1.8.9"}));
        let locked = base.join("versions/locked");
        std::fs::create_dir_all(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let mut manager = VersionManager::new(GameLayout::new(&base));
        let result = manager.refresh(&AutoConfirm(false), None).await;

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        result.unwrap();
        assert!(manager.get("1.8.9").is_some());
        assert!(manager.get("locked").is_none());
        assert!(locked.exists());
        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn malformed_json_is_redownloaded() {
        let base = temp_base("malformed");
        let dir = base.join("versions/1.7.10");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("1.7.10.json"), "{ not json").unwrap();

        let repairer = FixingRepairer {
            base: base.clone(),
            calls: AtomicUsize::new(0),
        };
        let mut manager = VersionManager::new(GameLayout::new(&base));
        manager
            .refresh(&AutoConfirm(true), Some(&repairer))
            .await
            .unwrap();

        assert_eq!(repairer.calls.load(Ordering::SeqCst), 1);
        assert!(manager.get("1.7.10").is_some());

        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn resolve_merges_chain_and_detects_problems() {
        let base = temp_base("resolve");
        write_version(&base, "1.12.2", "1.12.2.json", serde_json::json!({
            "id": "1.12.2",
            "mainClass": "net.minecraft.client.main.Main",
            "libraries": [{"name": "com.mojang:patchy:1.1"}]
        }));
        write_version(&base, "forge", "forge.json", serde_json::json!({
            "id": "forge",
            "inheritsFrom": "1.12.2",
            "libraries": [{"name": "net.minecraftforge:forge:14.23.5.2859"}]
        }));
        write_version(&base, "orphan", "orphan.json", serde_json::json!({
            "id": "orphan", "inheritsFrom": "1.0"
        }));
        write_version(&base, "a", "a.json", serde_json::json!({"id": "a", "inheritsFrom": "b"}));
        write_version(&base, "b", "b.json", serde_json::json!({"id": "b", "inheritsFrom": "a"}));

        let mut manager = VersionManager::new(GameLayout::new(&base));
        manager.refresh(&AutoConfirm(true), None).await.unwrap();

        let forge = manager.resolve("forge").unwrap();
        assert_eq!(forge.libraries().len(), 2);
        assert_eq!(forge.jar_id(), "1.12.2");
        assert_eq!(
            manager.jar_path(&forge),
            base.join("versions/1.12.2/1.12.2.jar")
        );

        assert!(matches!(
            manager.resolve("orphan"),
            Err(LauncherError::MissingParentVersion { .. })
        ));
        assert!(matches!(
            manager.resolve("a"),
            Err(LauncherError::CircularInheritance(_))
        ));
        assert!(matches!(
            manager.resolve("nope"),
            Err(LauncherError::VersionNotFound(_))
        ));

        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn rename_moves_json_jar_and_id() {
        let base = temp_base("rename");
        write_version(&base, "old", "old.json", serde_json::json!({"id": "old"}));
        std::fs::write(base.join("versions/old/old.jar"), b"jar").unwrap();

        let mut manager = VersionManager::new(GameLayout::new(&base));
        manager.refresh(&AutoConfirm(true), None).await.unwrap();
        manager.rename("old", "new").await.unwrap();

        assert!(base.join("versions/new/new.json").exists());
        assert!(base.join("versions/new/new.jar").exists());
        assert_eq!(manager.get("new").unwrap().id, "new");

        manager.remove("new").await.unwrap();
        assert!(!base.join("versions/new").exists());
        assert!(manager.get("new").is_none());

        let _ = std::fs::remove_dir_all(&base);
    }
}
