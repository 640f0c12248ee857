// ─── Version Manifest ───
// Parses a per-version JSON (`versions/<id>/<id>.json`) and merges
// `inheritsFrom` parents.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::LauncherResult;

use super::library::{Library, ResolvedLibrary};
use super::rules::{self, Features, Platform, Rule};

/// Asset index id used when a version names none.
pub const DEFAULT_ASSET_INDEX: &str = "legacy";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionManifest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,
    /// Id of the version whose jar is launched (defaults to `id`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jar: Option<String>,
    /// Legacy space-separated argument template (pre-1.13).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Arguments>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub libraries: Option<Vec<Library>>,
    /// Legacy asset index id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndexInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<VersionDownloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_version: Option<JavaVersionInfo>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub version_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// `"version"` runs the game inside the version folder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_dir: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_launcher_version: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersionInfo {
    pub major_version: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<DownloadArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<DownloadArtifact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadArtifact {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<Argument>,
    #[serde(default)]
    pub jvm: Vec<Argument>,
}

/// Either a plain template string or a rule-guarded value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    Plain(String),
    Conditional { rules: Vec<Rule>, value: ArgumentValue },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Single(String),
    Many(Vec<String>),
}

impl Argument {
    fn templates(&self, platform: &Platform, features: &Features) -> Vec<String> {
        match self {
            Argument::Plain(arg) => vec![arg.clone()],
            Argument::Conditional { rules, value } => {
                if !rules::allow_with_features(rules, platform, features) {
                    return vec![];
                }
                match value {
                    ArgumentValue::Single(s) => vec![s.clone()],
                    ArgumentValue::Many(values) => values.clone(),
                }
            }
        }
    }
}

impl VersionManifest {
    pub fn parse(raw: &str) -> LauncherResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn jar_id(&self) -> &str {
        self.jar.as_deref().unwrap_or(&self.id)
    }

    pub fn libraries(&self) -> &[Library] {
        self.libraries.as_deref().unwrap_or(&[])
    }

    /// Asset index id: `assetIndex.id`, then legacy `assets`, then `legacy`.
    pub fn asset_index_id(&self) -> &str {
        self.asset_index
            .as_ref()
            .map(|ai| ai.id.as_str())
            .or(self.assets.as_deref())
            .unwrap_or(DEFAULT_ASSET_INDEX)
    }

    pub fn required_java_major(&self) -> Option<u32> {
        self.java_version.as_ref().map(|j| j.major_version)
    }

    /// Resolve every library for `platform`, skipping excluded ones.
    ///
    /// Libraries with unparsable names are logged and left out.
    pub fn resolved_libraries(&self, platform: &Platform) -> Vec<ResolvedLibrary> {
        let mut resolved = Vec::new();
        for library in self.libraries() {
            match library.resolve(platform) {
                Ok(Some(lib)) => resolved.push(lib),
                Ok(None) => {}
                Err(e) => warn!("Skipping library {}: {}", library.name, e),
            }
        }
        resolved
    }

    /// Game argument templates: structured `arguments.game` when present,
    /// otherwise the tokenized legacy `minecraftArguments`.
    pub fn game_argument_templates(&self, platform: &Platform, features: &Features) -> Vec<String> {
        match &self.arguments {
            Some(args) if !args.game.is_empty() => args
                .game
                .iter()
                .flat_map(|a| a.templates(platform, features))
                .collect(),
            _ => self
                .minecraft_arguments
                .as_deref()
                .map(|s| s.split_whitespace().map(ToString::to_string).collect())
                .unwrap_or_default(),
        }
    }

    /// JVM argument templates, `None` for legacy versions that carry none.
    pub fn jvm_argument_templates(
        &self,
        platform: &Platform,
        features: &Features,
    ) -> Option<Vec<String>> {
        let args = self.arguments.as_ref()?;
        if args.jvm.is_empty() {
            return None;
        }
        Some(
            args.jvm
                .iter()
                .flat_map(|a| a.templates(platform, features))
                .collect(),
        )
    }

    /// Merge this version over an already resolved `parent`.
    ///
    /// Fields set on the child win; libraries are the child's followed by
    /// the parent's. The result no longer inherits from anything.
    pub fn merged_over(&self, parent: &VersionManifest) -> VersionManifest {
        let libraries = match (&self.libraries, &parent.libraries) {
            (Some(own), Some(inherited)) => {
                let mut merged = own.clone();
                merged.extend(inherited.iter().cloned());
                Some(merged)
            }
            (Some(own), None) => Some(own.clone()),
            (None, inherited) => inherited.clone(),
        };

        let arguments = match (&self.arguments, &parent.arguments) {
            (Some(own), Some(inherited)) => {
                let mut jvm = inherited.jvm.clone();
                jvm.extend(own.jvm.iter().cloned());
                let mut game = inherited.game.clone();
                game.extend(own.game.iter().cloned());
                Some(Arguments { game, jvm })
            }
            (own, inherited) => own.clone().or_else(|| inherited.clone()),
        };

        VersionManifest {
            id: self.id.clone(),
            main_class: self.main_class.clone().or_else(|| parent.main_class.clone()),
            inherits_from: None,
            jar: self
                .jar
                .clone()
                .or_else(|| parent.jar.clone())
                .or_else(|| Some(parent.id.clone())),
            minecraft_arguments: self
                .minecraft_arguments
                .clone()
                .or_else(|| parent.minecraft_arguments.clone()),
            arguments,
            libraries,
            assets: self.assets.clone().or_else(|| parent.assets.clone()),
            asset_index: self
                .asset_index
                .clone()
                .or_else(|| parent.asset_index.clone()),
            downloads: self.downloads.clone().or_else(|| parent.downloads.clone()),
            java_version: self
                .java_version
                .clone()
                .or_else(|| parent.java_version.clone()),
            version_type: self.version_type.clone(),
            release_time: self.release_time.clone(),
            time: self.time.clone(),
            run_dir: self.run_dir.clone(),
            hidden: self.hidden,
            minimum_launcher_version: self
                .minimum_launcher_version
                .max(parent.minimum_launcher_version),
        }
    }
}
