use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult};

pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net";

/// Asset index JSON (`assets/indexes/<id>.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetIndex {
    #[serde(default)]
    pub objects: BTreeMap<String, AssetObject>,
    /// Legacy indexes expect files laid out by name under `virtual/<id>/`.
    #[serde(rename = "virtual", default)]
    pub is_virtual: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetObject {
    /// `<hash[0:2]>/<hash>`, relative to `assets/objects`.
    pub fn location(&self) -> PathBuf {
        let prefix = self.hash.get(..2).unwrap_or(&self.hash);
        PathBuf::from(prefix).join(&self.hash)
    }

    pub fn url(&self) -> String {
        let prefix = self.hash.get(..2).unwrap_or(&self.hash);
        format!("{}/{}/{}", RESOURCES_URL, prefix, self.hash)
    }
}

impl AssetIndex {
    pub async fn load(path: &Path) -> LauncherResult<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LauncherError::io(path, e))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_virtual_flag_and_locations() {
        let index: AssetIndex = serde_json::from_value(serde_json::json!({
            "virtual": true,
            "objects": {
                "sounds/step/grass1.ogg": {"hash": "ab12cd34", "size": 42}
            }
        }))
        .unwrap();

        assert!(index.is_virtual);
        let object = &index.objects["sounds/step/grass1.ogg"];
        assert_eq!(object.location(), PathBuf::from("ab/ab12cd34"));
        assert_eq!(
            object.url(),
            "https://resources.download.minecraft.net/ab/ab12cd34"
        );
    }
}
