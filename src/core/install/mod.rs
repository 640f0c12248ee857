// ─── Game Installer ───
// Downloads version JSON, game jar, libraries and assets into a layout.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::core::assets::AssetReconciler;
use crate::core::downloader::{DownloadEntry, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::layout::GameLayout;
use crate::core::launch::classpath::missing_libraries;
use crate::core::version::manifest::VersionManifest;
use crate::core::version::{ResolvedLibrary, VersionList, VersionRepairer};

pub struct GameInstaller {
    layout: GameLayout,
    downloader: Downloader,
    version_list: OnceCell<VersionList>,
    version_list_url: String,
}

impl GameInstaller {
    pub fn new(layout: GameLayout, downloader: Downloader) -> Self {
        Self {
            layout,
            downloader,
            version_list: OnceCell::new(),
            version_list_url: crate::core::version::remote::VERSION_LIST_URL.to_string(),
        }
    }

    /// Use a mirror of the official version list.
    pub fn with_version_list_url(mut self, url: impl Into<String>) -> Self {
        self.version_list_url = url.into();
        self
    }

    /// The remote version list, fetched once per installer.
    pub async fn version_list(&self) -> LauncherResult<&VersionList> {
        self.version_list
            .get_or_try_init(|| VersionList::fetch_from(self.downloader.client(), &self.version_list_url))
            .await
    }

    /// Download `versions/<id>/<id>.json`; `hidden` marks it as a
    /// dependency not meant to be listed.
    pub async fn download_version_json(&self, id: &str, hidden: bool) -> LauncherResult<()> {
        let entry = self
            .version_list()
            .await?
            .find_version(id)
            .cloned()
            .ok_or_else(|| LauncherError::VersionNotFound(id.to_string()))?;

        let raw = self.downloader.fetch_bytes(&entry.url).await?;
        if let Some(expected) = entry.sha1.as_deref() {
            let actual = crate::core::downloader::sha1_hex(&raw);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(LauncherError::Sha1Mismatch {
                    path: self.layout.version_json(id),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        let mut value: serde_json::Value = serde_json::from_slice(&raw)?;
        if let Some(object) = value.as_object_mut() {
            object.insert("id".into(), serde_json::Value::String(id.to_string()));
            if hidden {
                object.insert("hidden".into(), serde_json::Value::Bool(true));
            }
        }

        let path = self.layout.version_json(id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        tokio::fs::write(&path, serde_json::to_string_pretty(&value)?)
            .await
            .map_err(|e| LauncherError::io(&path, e))?;
        info!("Saved version json {:?}", path);
        Ok(())
    }

    /// Download the client jar declared by a (resolved) version.
    pub async fn download_game_jar(&self, version: &VersionManifest) -> LauncherResult<()> {
        let client = version
            .downloads
            .as_ref()
            .and_then(|d| d.client.as_ref())
            .ok_or_else(|| LauncherError::MalformedVersion {
                id: version.id.clone(),
                reason: "no client download".into(),
            })?;
        let dest = self.layout.version_jar(version.jar_id());
        if let Some(expected) = client.sha1.as_deref().filter(|_| dest.is_file()) {
            match Downloader::validate_sha1(&dest, expected).await {
                Ok(true) => {
                    info!("Game jar for {} is already valid", version.id);
                    return Ok(());
                }
                Ok(false) => warn!("Game jar for {} fails its checksum", version.id),
                Err(e) => warn!("Unable to check game jar for {}: {}", version.id, e),
            }
        }
        info!("Downloading game jar for {}", version.id);
        self.downloader
            .download_file(&client.url, &dest, client.sha1.as_deref())
            .await
    }

    /// Download libraries missing from disk. Returns the names that failed.
    pub async fn download_libraries(&self, libraries: &[ResolvedLibrary]) -> Vec<String> {
        let libraries_dir = self.layout.libraries_dir();
        let entries: Vec<DownloadEntry> = missing_libraries(libraries, &libraries_dir)
            .into_iter()
            .map(|lib| DownloadEntry {
                url: lib.url.clone(),
                dest: lib.file_path(&libraries_dir),
                sha1: lib.sha1.clone(),
                size: lib.size,
            })
            .collect();
        if entries.is_empty() {
            return Vec::new();
        }

        self.downloader
            .download_batch(entries)
            .await
            .into_iter()
            .map(|(entry, e)| {
                warn!("Library download failed {}: {}", entry.url, e);
                libraries
                    .iter()
                    .find(|l| l.file_path(&libraries_dir) == entry.dest)
                    .map(|l| l.name.clone())
                    .unwrap_or(entry.url)
            })
            .collect()
    }

    /// Download the asset index of a version. An existing index is kept
    /// aside as `<id>-renamed.json` and restored if the download fails.
    pub async fn download_asset_index(&self, version: &VersionManifest) -> LauncherResult<()> {
        let index_id = version.asset_index_id();
        let info = version
            .asset_index
            .as_ref()
            .and_then(|ai| ai.url.as_deref().map(|url| (url, ai.sha1.as_deref())));
        let Some((url, sha1)) = info else {
            return Err(LauncherError::MalformedVersion {
                id: version.id.clone(),
                reason: format!("no download url for asset index {}", index_id),
            });
        };

        let index_file = self.layout.asset_index_file(index_id);
        let backup = self
            .layout
            .asset_indexes_dir()
            .join(format!("{}-renamed.json", index_id));
        let had_previous = index_file.is_file();
        if had_previous {
            tokio::fs::rename(&index_file, &backup)
                .await
                .map_err(|e| LauncherError::io(&index_file, e))?;
        }

        match self.downloader.download_file(url, &index_file, sha1).await {
            Ok(()) => {
                if had_previous {
                    let _ = tokio::fs::remove_file(&backup).await;
                }
                Ok(())
            }
            Err(e) => {
                if had_previous {
                    if let Err(restore) = tokio::fs::rename(&backup, &index_file).await {
                        warn!("Failed to restore asset index {:?}: {}", backup, restore);
                    }
                }
                Err(e)
            }
        }
    }

    /// Download every object of an index that is not in the store.
    /// Returns the number of objects that failed.
    pub async fn download_assets(&self, index_id: &str) -> LauncherResult<usize> {
        let reconciler = AssetReconciler::new(self.layout.clone());
        let missing = reconciler.missing_objects(index_id).await?;
        info!("Downloading {} asset objects for {}", missing.len(), index_id);

        let entries = missing
            .iter()
            .map(|object| DownloadEntry {
                url: object.url(),
                dest: reconciler.object_path(object),
                sha1: Some(object.hash.clone()),
                size: Some(object.size),
            })
            .collect();
        let failures = self.downloader.download_batch(entries).await;
        if !failures.is_empty() {
            warn!("{} asset downloads failed", failures.len());
        }
        Ok(failures.len())
    }

    /// Install a version from the remote list: JSON, jar, libraries,
    /// asset index and assets.
    pub async fn install_version(&self, id: &str, hidden: bool) -> LauncherResult<VersionManifest> {
        self.download_version_json(id, hidden).await?;

        let raw = tokio::fs::read_to_string(self.layout.version_json(id))
            .await
            .map_err(|e| LauncherError::io(self.layout.version_json(id), e))?;
        let version = VersionManifest::parse(&raw)?;

        if version.inherits_from.is_some() {
            // Needs its parent before files can be resolved.
            return Ok(version);
        }

        self.download_game_jar(&version).await?;
        let platform = crate::core::version::Platform::current();
        let failed = self
            .download_libraries(&version.resolved_libraries(&platform))
            .await;
        if !failed.is_empty() {
            return Err(LauncherError::MissingLibraries(failed));
        }
        if version.asset_index.is_some() {
            self.download_asset_index(&version).await?;
            self.download_assets(version.asset_index_id()).await?;
        }

        info!("Installed version {}", id);
        Ok(version)
    }
}

#[async_trait]
impl VersionRepairer for GameInstaller {
    async fn redownload_version_json(&self, id: &str) -> LauncherResult<()> {
        self.download_version_json(id, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::http::build_http_client;

    fn installer(name: &str) -> (GameLayout, GameInstaller) {
        let base = std::env::temp_dir().join(format!("installer-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&base);
        let layout = GameLayout::new(&base);
        let downloader = Downloader::new(build_http_client().unwrap());
        (layout.clone(), GameInstaller::new(layout, downloader))
    }

    #[tokio::test]
    async fn missing_asset_index_url_is_malformed() {
        let (layout, installer) = installer("no-index-url");
        let version: VersionManifest =
            serde_json::from_value(serde_json::json!({"id": "old", "assets": "legacy"})).unwrap();
        let err = installer.download_asset_index(&version).await.unwrap_err();
        assert!(matches!(err, LauncherError::MalformedVersion { .. }));
        let _ = std::fs::remove_dir_all(layout.base_dir());
    }

    #[tokio::test]
    async fn failed_index_download_restores_previous_file() {
        let (layout, installer) = installer("restore");
        std::fs::create_dir_all(layout.asset_indexes_dir()).unwrap();
        std::fs::write(layout.asset_index_file("1.12"), "{\"objects\":{}}").unwrap();

        let version: VersionManifest = serde_json::from_value(serde_json::json!({
            "id": "1.12.2",
            "assetIndex": {"id": "1.12", "url": "http://127.0.0.1:9/1.12.json"}
        }))
        .unwrap();
        assert!(installer.download_asset_index(&version).await.is_err());

        let restored = std::fs::read_to_string(layout.asset_index_file("1.12")).unwrap();
        assert_eq!(restored, "{\"objects\":{}}");
        assert!(!layout.asset_indexes_dir().join("1.12-renamed.json").exists());
        let _ = std::fs::remove_dir_all(layout.base_dir());
    }

    #[tokio::test]
    async fn nothing_to_download_when_libraries_exist() {
        let (layout, installer) = installer("libs-present");
        assert!(installer.download_libraries(&[]).await.is_empty());
        let _ = std::fs::remove_dir_all(layout.base_dir());
    }

    #[tokio::test]
    async fn valid_game_jar_is_not_downloaded_again() {
        let (layout, installer) = installer("jar-valid");
        let jar = layout.version_jar("1.8.9");
        std::fs::create_dir_all(jar.parent().unwrap()).unwrap();
        std::fs::write(&jar, b"abc").unwrap();

        let version_with = |sha1: &str| -> VersionManifest {
            serde_json::from_value(serde_json::json!({
                "id": "1.8.9",
                "downloads": {"client": {"url": "http://127.0.0.1:9/client.jar", "sha1": sha1}}
            }))
            .unwrap()
        };
        installer
            .download_game_jar(&version_with("a9993e364706816aba3e25717850c26c9cd0d89d"))
            .await
            .unwrap();
        assert!(installer.download_game_jar(&version_with("00")).await.is_err());
        assert_eq!(std::fs::read(&jar).unwrap(), b"abc");
        let _ = std::fs::remove_dir_all(layout.base_dir());
    }

    #[tokio::test]
    async fn version_without_client_download_is_malformed() {
        let (layout, installer) = installer("no-client");
        let version: VersionManifest =
            serde_json::from_value(serde_json::json!({"id": "custom"})).unwrap();
        assert!(matches!(
            installer.download_game_jar(&version).await,
            Err(LauncherError::MalformedVersion { .. })
        ));
        let _ = std::fs::remove_dir_all(layout.base_dir());
    }
}
