// ─── Remote Version List ───
// Fetching and parsing the official version list (version_manifest_v2).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::core::error::{LauncherError, LauncherResult};

pub const VERSION_LIST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

#[derive(Debug, Clone, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

/// Top-level official version list.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionList {
    #[serde(default)]
    pub latest: Option<LatestVersions>,
    pub versions: Vec<VersionEntry>,
}

/// A single downloadable version.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    pub release_time: DateTime<Utc>,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionList {
    pub async fn fetch(client: &reqwest::Client) -> LauncherResult<Self> {
        Self::fetch_from(client, VERSION_LIST_URL).await
    }

    pub async fn fetch_from(client: &reqwest::Client, url: &str) -> LauncherResult<Self> {
        info!("Fetching version list from {}", url);

        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let list: VersionList = response.json().await?;

        info!("Loaded {} versions from version list", list.versions.len());
        Ok(list)
    }

    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Release versions, newest first.
    pub fn releases(&self) -> Vec<&VersionEntry> {
        let mut releases: Vec<&VersionEntry> = self
            .versions
            .iter()
            .filter(|v| v.version_type == "release")
            .collect();
        releases.sort_by(|a, b| b.release_time.cmp(&a.release_time));
        releases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_and_sorts_releases() {
        let list: VersionList = serde_json::from_value(serde_json::json!({
            "latest": {"release": "1.20.4", "snapshot": "24w03a"},
            "versions": [
                {"id": "24w03a", "type": "snapshot", "url": "https://example.com/a.json",
                 "releaseTime": "2024-01-17T12:00:00+00:00"},
                {"id": "1.8.9", "type": "release", "url": "https://example.com/b.json",
                 "releaseTime": "2015-12-03T09:24:39+00:00"},
                {"id": "1.20.4", "type": "release", "url": "https://example.com/c.json",
                 "releaseTime": "2023-12-07T12:56:20+00:00", "sha1": "abc123"}
            ]
        }))
        .unwrap();

        assert_eq!(list.latest.as_ref().unwrap().release, "1.20.4");
        let ids: Vec<&str> = list.releases().iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["1.20.4", "1.8.9"]);
        assert_eq!(
            list.find_version("1.20.4").unwrap().sha1.as_deref(),
            Some("abc123")
        );
        assert!(list.find_version("1.0").is_none());
    }
}
