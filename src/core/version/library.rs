// ─── Library Entries ───
// A library as declared in a version JSON and its platform-resolved form.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::LauncherResult;
use crate::core::maven::{MavenArtifact, MOJANG_LIBRARIES};

use super::rules::{self, Platform, Rule};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    /// Repository base for libraries without `downloads` (Forge style).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
    /// OS name → classifier, e.g. `"windows": "natives-windows-${arch}"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractRules {
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl ExtractRules {
    /// Whether a zip entry may be extracted into the natives directory.
    pub fn allows(&self, entry_name: &str) -> bool {
        !self
            .exclude
            .iter()
            .any(|prefix| entry_name.starts_with(prefix.as_str()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<LibraryArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<BTreeMap<String, LibraryArtifact>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// A library after rule evaluation and path formatting for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLibrary {
    pub name: String,
    /// Path relative to the libraries directory.
    pub path: PathBuf,
    pub url: String,
    pub sha1: Option<String>,
    pub size: Option<u64>,
    /// Native jars are extracted, never put on the classpath.
    pub native: bool,
    pub extract: ExtractRules,
}

impl ResolvedLibrary {
    pub fn file_path(&self, libraries_dir: &Path) -> PathBuf {
        libraries_dir.join(&self.path)
    }
}

impl Library {
    /// Rule decision for this library on `platform`.
    pub fn allow(&self, platform: &Platform) -> bool {
        rules::allow(self.rules.as_deref().unwrap_or(&[]), platform)
    }

    pub fn is_native(&self) -> bool {
        self.natives.is_some()
    }

    /// Classifier of the native jar for `platform`, with `${arch}` expanded.
    pub fn native_classifier(&self, platform: &Platform) -> Option<String> {
        let natives = self.natives.as_ref()?;
        natives
            .get(platform.os.as_str())
            .map(|classifier| classifier.replace("${arch}", platform.bits()))
    }

    /// Compute the platform-specific file of this library.
    ///
    /// Returns `Ok(None)` when rules exclude the library, or when it is a
    /// native library without a classifier for this OS.
    pub fn resolve(&self, platform: &Platform) -> LauncherResult<Option<ResolvedLibrary>> {
        if !self.allow(platform) {
            return Ok(None);
        }

        let classifier = if self.is_native() {
            match self.native_classifier(platform) {
                Some(c) => Some(c),
                None => return Ok(None),
            }
        } else {
            None
        };

        let mut artifact = MavenArtifact::parse(&self.name)?;
        if let Some(c) = &classifier {
            artifact = artifact.with_classifier(c);
        }

        let declared = self.downloads.as_ref().and_then(|d| match &classifier {
            Some(c) => d.classifiers.as_ref().and_then(|map| map.get(c)),
            None => d.artifact.as_ref(),
        });

        let path = declared
            .and_then(|d| d.path.as_deref())
            .map(PathBuf::from)
            .unwrap_or_else(|| artifact.local_path());

        let url = match declared.and_then(|d| d.url.as_deref()) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => artifact.url(self.url.as_deref().unwrap_or(MOJANG_LIBRARIES)),
        };

        Ok(Some(ResolvedLibrary {
            name: self.name.clone(),
            path,
            url,
            sha1: declared.and_then(|d| d.sha1.clone()),
            size: declared.and_then(|d| d.size),
            native: classifier.is_some(),
            extract: self.extract.clone().unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::rules::OsName;
    use super::*;

    fn lwjgl_platform() -> Library {
        serde_json::from_value(serde_json::json!({
            "name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.1",
            "natives": {
                "linux": "natives-linux",
                "windows": "natives-windows-${arch}"
            },
            "extract": { "exclude": ["META-INF/"] },
            "downloads": {
                "classifiers": {
                    "natives-linux": {
                        "path": "org/lwjgl/lwjgl/lwjgl-platform/2.9.1/lwjgl-platform-2.9.1-natives-linux.jar",
                        "url": "https://libraries.minecraft.net/org/lwjgl/lwjgl/lwjgl-platform/2.9.1/lwjgl-platform-2.9.1-natives-linux.jar",
                        "sha1": "aa",
                        "size": 10
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn plain_library_resolves_to_maven_path() {
        let lib: Library =
            serde_json::from_value(serde_json::json!({"name": "com.google.guava:guava:17.0"}))
                .unwrap();
        let resolved = lib
            .resolve(&Platform::new(OsName::Linux, "x86_64"))
            .unwrap()
            .unwrap();
        assert_eq!(
            resolved.path,
            PathBuf::from("com/google/guava/guava/17.0/guava-17.0.jar")
        );
        assert_eq!(
            resolved.url,
            "https://libraries.minecraft.net/com/google/guava/guava/17.0/guava-17.0.jar"
        );
        assert!(!resolved.native);
    }

    #[test]
    fn native_library_uses_declared_classifier_download() {
        let resolved = lwjgl_platform()
            .resolve(&Platform::new(OsName::Linux, "x86_64"))
            .unwrap()
            .unwrap();
        assert!(resolved.native);
        assert_eq!(resolved.sha1.as_deref(), Some("aa"));
        assert!(!resolved.extract.allows("META-INF/MANIFEST.MF"));
        assert!(resolved.extract.allows("liblwjgl64.so"));
    }

    #[test]
    fn native_classifier_expands_arch() {
        let lib = lwjgl_platform();
        assert_eq!(
            lib.native_classifier(&Platform::new(OsName::Windows, "x86")),
            Some("natives-windows-32".to_string())
        );
        let resolved = lib
            .resolve(&Platform::new(OsName::Windows, "x86_64"))
            .unwrap()
            .unwrap();
        assert!(resolved
            .path
            .ends_with("lwjgl-platform-2.9.1-natives-windows-64.jar"));
    }

    #[test]
    fn native_library_without_os_classifier_is_skipped() {
        assert!(lwjgl_platform()
            .resolve(&Platform::new(OsName::Osx, "x86_64"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn custom_repository_url_is_used() {
        let lib: Library = serde_json::from_value(serde_json::json!({
            "name": "net.minecraftforge:forge:1.7.10-10.13.4.1614",
            "url": "https://maven.minecraftforge.net/"
        }))
        .unwrap();
        let resolved = lib
            .resolve(&Platform::new(OsName::Linux, "x86_64"))
            .unwrap()
            .unwrap();
        assert!(resolved
            .url
            .starts_with("https://maven.minecraftforge.net/net/minecraftforge/forge/"));
    }
}
