// ─── Game Layout ───
// Every on-disk location inside a game base directory (`.minecraft`).

use std::path::{Path, PathBuf};

/// Paths of a game directory:
///
/// - `versions/<id>/<id>.json` and `<id>.jar`
/// - `versions/<id>/<id>-natives/`
/// - `libraries/` (Maven layout)
/// - `assets/{indexes,objects,virtual}/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLayout {
    base_dir: PathBuf,
}

impl GameLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.base_dir.join("versions")
    }

    pub fn version_root(&self, id: &str) -> PathBuf {
        self.versions_dir().join(id)
    }

    pub fn version_json(&self, id: &str) -> PathBuf {
        self.version_root(id).join(format!("{}.json", id))
    }

    /// Jar of a version; `jar_id` is the manifest's `jar` field or its id.
    pub fn version_jar(&self, jar_id: &str) -> PathBuf {
        self.version_root(jar_id).join(format!("{}.jar", jar_id))
    }

    /// Natives are extracted per launch into the version folder.
    pub fn natives_dir(&self, id: &str) -> PathBuf {
        self.version_root(id).join(format!("{}-natives", id))
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.base_dir.join("libraries")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.base_dir.join("assets")
    }

    pub fn asset_indexes_dir(&self) -> PathBuf {
        self.assets_dir().join("indexes")
    }

    pub fn asset_index_file(&self, index_id: &str) -> PathBuf {
        self.asset_indexes_dir().join(format!("{}.json", index_id))
    }

    pub fn asset_objects_dir(&self) -> PathBuf {
        self.assets_dir().join("objects")
    }

    pub fn virtual_assets_dir(&self, index_id: &str) -> PathBuf {
        self.assets_dir().join("virtual").join(index_id)
    }

    /// Read by mod loader installers, which refuse directories without it.
    pub fn launcher_profiles_file(&self) -> PathBuf {
        self.base_dir.join("launcher_profiles.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_paths_follow_id() {
        let layout = GameLayout::new("/games/.minecraft");
        assert_eq!(
            layout.version_json("1.8.9"),
            PathBuf::from("/games/.minecraft/versions/1.8.9/1.8.9.json")
        );
        assert_eq!(
            layout.natives_dir("1.8.9"),
            PathBuf::from("/games/.minecraft/versions/1.8.9/1.8.9-natives")
        );
        assert_eq!(
            layout.asset_index_file("legacy"),
            PathBuf::from("/games/.minecraft/assets/indexes/legacy.json")
        );
    }
}
