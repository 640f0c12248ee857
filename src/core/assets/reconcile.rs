// ─── Asset Reconciler ───
// Compares the content-addressed object store with an asset index and
// rebuilds name-addressed "virtual" trees for legacy versions.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use super::asset_index::{AssetIndex, AssetObject};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::layout::GameLayout;

pub struct AssetReconciler {
    layout: GameLayout,
}

impl AssetReconciler {
    pub fn new(layout: GameLayout) -> Self {
        Self { layout }
    }

    pub fn object_path(&self, object: &AssetObject) -> PathBuf {
        self.layout.asset_objects_dir().join(object.location())
    }

    /// `false` when the index is missing or unreadable, or any object it
    /// references is absent from the store.
    pub async fn check_assets_exist(&self, index_id: &str) -> bool {
        let index_file = self.layout.asset_index_file(index_id);
        if !self.layout.assets_dir().exists() || !index_file.is_file() {
            return false;
        }

        match AssetIndex::load(&index_file).await {
            Ok(index) => index
                .objects
                .values()
                .all(|object| self.object_path(object).exists()),
            Err(e) => {
                debug!("Asset index {} unreadable: {}", index_id, e);
                false
            }
        }
    }

    /// Objects of the index whose file is not in the store.
    pub async fn missing_objects(&self, index_id: &str) -> LauncherResult<Vec<AssetObject>> {
        let index = AssetIndex::load(&self.layout.asset_index_file(index_id)).await?;
        Ok(index
            .objects
            .into_values()
            .filter(|object| !self.object_path(object).exists())
            .collect())
    }

    /// Directory to pass as the game's assets root.
    ///
    /// Virtual indexes get their objects copied by name into
    /// `assets/virtual/<id>/`. When fewer than a tenth of the objects are
    /// present, the flat `assets` directory is returned instead.
    pub async fn reconstruct_assets(&self, index_id: &str) -> LauncherResult<PathBuf> {
        let assets_dir = self.layout.assets_dir();
        let index_file = self.layout.asset_index_file(index_id);
        if !index_file.is_file() {
            warn!("No asset index {:?}, cannot reconstruct assets", index_file);
            return Ok(assets_dir);
        }

        let index = match AssetIndex::load(&index_file).await {
            Ok(index) => index,
            Err(e) => {
                warn!("Unable to read asset index {}: {}", index_id, e);
                return Ok(assets_dir);
            }
        };
        if !index.is_virtual {
            return Ok(assets_dir);
        }

        let virtual_root = self.layout.virtual_assets_dir(index_id);
        let total = index.objects.len();
        let mut present = 0usize;

        for (name, object) in &index.objects {
            let original = self.object_path(object);
            if !original.exists() {
                continue;
            }
            present += 1;

            let Some(relative) = enclosed_name(name) else {
                warn!("Skipping unsafe asset name {:?} in {}", name, index_id);
                continue;
            };
            let target = virtual_root.join(relative);
            if target.is_file() {
                continue;
            }
            if let Err(e) = copy_object(&original, &target).await {
                warn!("Failed to copy asset {}: {}", name, e);
            }
        }

        if present * 10 < total {
            info!(
                "Only {}/{} virtual assets of {} present, using flat assets directory",
                present, total, index_id
            );
            return Ok(assets_dir);
        }
        Ok(virtual_root)
    }
}

async fn copy_object(original: &Path, target: &Path) -> LauncherResult<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::io(parent, e))?;
    }
    tokio::fs::copy(original, target)
        .await
        .map_err(|e| LauncherError::io(target, e))?;
    Ok(())
}

/// `name` as a relative path that cannot leave the directory it is
/// joined to.
fn enclosed_name(name: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!relative.as_os_str().is_empty()).then_some(relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_layout(name: &str) -> GameLayout {
        let dir = std::env::temp_dir().join(format!("assets-test-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("assets/indexes")).unwrap();
        GameLayout::new(dir)
    }

    fn write_index(layout: &GameLayout, id: &str, is_virtual: bool, count: usize) -> Vec<String> {
        let mut objects = serde_json::Map::new();
        let mut hashes = Vec::new();
        for i in 0..count {
            let hash = format!("{:02x}{:038x}", i, i);
            objects.insert(
                format!("sounds/sound{}.ogg", i),
                serde_json::json!({"hash": hash, "size": 3}),
            );
            hashes.push(hash);
        }
        let index = serde_json::json!({"virtual": is_virtual, "objects": objects});
        std::fs::write(layout.asset_index_file(id), index.to_string()).unwrap();
        hashes
    }

    fn store_object(layout: &GameLayout, hash: &str) {
        let path = layout.asset_objects_dir().join(&hash[..2]).join(hash);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"ogg").unwrap();
    }

    fn cleanup(layout: &GameLayout) {
        let _ = std::fs::remove_dir_all(layout.base_dir());
    }

    #[tokio::test]
    async fn check_assets_exist_requires_every_object() {
        let layout = temp_layout("check");
        let reconciler = AssetReconciler::new(layout.clone());
        assert!(!reconciler.check_assets_exist("1.12").await);

        let hashes = write_index(&layout, "1.12", false, 3);
        store_object(&layout, &hashes[0]);
        store_object(&layout, &hashes[1]);
        assert!(!reconciler.check_assets_exist("1.12").await);
        assert_eq!(reconciler.missing_objects("1.12").await.unwrap().len(), 1);

        store_object(&layout, &hashes[2]);
        assert!(reconciler.check_assets_exist("1.12").await);

        std::fs::write(layout.asset_index_file("broken"), "{").unwrap();
        assert!(!reconciler.check_assets_exist("broken").await);

        cleanup(&layout);
    }

    #[tokio::test]
    async fn virtual_index_is_rebuilt_by_name() {
        let layout = temp_layout("virtual");
        let hashes = write_index(&layout, "legacy", true, 4);
        for hash in &hashes {
            store_object(&layout, hash);
        }

        let reconciler = AssetReconciler::new(layout.clone());
        let root = reconciler.reconstruct_assets("legacy").await.unwrap();

        assert_eq!(root, layout.virtual_assets_dir("legacy"));
        assert!(Path::new(&root).join("sounds/sound0.ogg").is_file());
        assert!(Path::new(&root).join("sounds/sound3.ogg").is_file());

        cleanup(&layout);
    }

    #[tokio::test]
    async fn sparse_virtual_store_falls_back_to_flat_dir() {
        let layout = temp_layout("sparse");
        let hashes = write_index(&layout, "legacy", true, 20);
        store_object(&layout, &hashes[0]);

        let reconciler = AssetReconciler::new(layout.clone());
        let root = reconciler.reconstruct_assets("legacy").await.unwrap();
        assert_eq!(root, layout.assets_dir());

        // Two of twenty is exactly one tenth: the virtual root is kept.
        store_object(&layout, &hashes[1]);
        let root = reconciler.reconstruct_assets("legacy").await.unwrap();
        assert_eq!(root, layout.virtual_assets_dir("legacy"));

        cleanup(&layout);
    }

    #[tokio::test]
    async fn asset_names_cannot_escape_the_virtual_root() {
        let layout = temp_layout("escape");
        let hash = format!("{:02x}{:038x}", 7, 7);
        store_object(&layout, &hash);
        let index = serde_json::json!({
            "virtual": true,
            "objects": {
                "../../../escaped.txt": {"hash": hash, "size": 3},
                "/tmp/absolute.txt": {"hash": hash, "size": 3},
                "./lang/en_us.lang": {"hash": hash, "size": 3}
            }
        });
        std::fs::write(layout.asset_index_file("legacy"), index.to_string()).unwrap();

        let reconciler = AssetReconciler::new(layout.clone());
        let root = reconciler.reconstruct_assets("legacy").await.unwrap();

        assert_eq!(root, layout.virtual_assets_dir("legacy"));
        assert!(root.join("lang/en_us.lang").is_file());
        assert!(!layout.base_dir().join("escaped.txt").exists());
        assert!(!layout.assets_dir().join("escaped.txt").exists());
        assert_eq!(enclosed_name("/tmp/absolute.txt"), None);
        assert_eq!(enclosed_name("a/../../b"), None);

        cleanup(&layout);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_copies_do_not_abort_reconstruction() {
        let layout = temp_layout("copy-fail");
        let hashes = write_index(&layout, "legacy", true, 2);
        for hash in &hashes {
            store_object(&layout, hash);
        }
        // A file where the sounds directory belongs makes every copy fail.
        let blocked = layout.virtual_assets_dir("legacy").join("sounds");
        std::fs::create_dir_all(blocked.parent().unwrap()).unwrap();
        std::fs::write(&blocked, b"not a dir").unwrap();

        let reconciler = AssetReconciler::new(layout.clone());
        let root = reconciler.reconstruct_assets("legacy").await.unwrap();
        assert_eq!(root, layout.virtual_assets_dir("legacy"));

        cleanup(&layout);
    }

    #[tokio::test]
    async fn non_virtual_or_missing_index_uses_flat_dir() {
        let layout = temp_layout("flat");
        write_index(&layout, "1.20", false, 2);
        let reconciler = AssetReconciler::new(layout.clone());

        assert_eq!(
            reconciler.reconstruct_assets("1.20").await.unwrap(),
            layout.assets_dir()
        );
        assert_eq!(
            reconciler.reconstruct_assets("absent").await.unwrap(),
            layout.assets_dir()
        );

        cleanup(&layout);
    }
}
