// ─── Classpath Builder ───
// Classpath assembly and native library extraction for a resolved version.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::ResolvedLibrary;

/// Build the `-cp` value: every non-native library that exists, followed by
/// the game jar. Entries keep their first position when duplicated.
pub fn build_classpath(
    libraries: &[ResolvedLibrary],
    libraries_dir: &Path,
    game_jar: &Path,
) -> LauncherResult<String> {
    if !game_jar.is_file() {
        return Err(LauncherError::MissingGameJar(game_jar.to_path_buf()));
    }

    let mut entries: Vec<String> = Vec::with_capacity(libraries.len() + 1);
    for library in libraries.iter().filter(|l| !l.native) {
        let path = library.file_path(libraries_dir);
        if !path.exists() {
            warn!("Library {} missing from classpath: {:?}", library.name, path);
            continue;
        }
        entries.push(safe_path_str(&path));
    }
    entries.push(safe_path_str(game_jar));

    entries.retain(|entry| !entry.trim().is_empty());
    dedup_preserving_order(&mut entries);

    Ok(entries.join(get_classpath_separator()))
}

/// Libraries whose file is absent from `libraries_dir`.
pub fn missing_libraries<'a>(
    libraries: &'a [ResolvedLibrary],
    libraries_dir: &Path,
) -> Vec<&'a ResolvedLibrary> {
    libraries
        .iter()
        .filter(|l| !l.file_path(libraries_dir).exists())
        .collect()
}

/// Platform-specific Java classpath separator.
pub fn get_classpath_separator() -> &'static str {
    if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    }
}

fn dedup_preserving_order(entries: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    entries.retain(|entry| {
        let key = if cfg!(target_os = "windows") {
            entry.to_lowercase()
        } else {
            entry.clone()
        };
        seen.insert(key)
    });
}

/// Unpack every native jar into `natives_dir`, skipping entries matched by
/// the library's exclude prefixes.
pub async fn extract_natives(
    libraries: &[ResolvedLibrary],
    libraries_dir: &Path,
    natives_dir: &Path,
) -> LauncherResult<()> {
    tokio::fs::create_dir_all(natives_dir)
        .await
        .map_err(|e| LauncherError::io(natives_dir, e))?;

    for library in libraries.iter().filter(|l| l.native) {
        let jar_path = library.file_path(libraries_dir);
        if !jar_path.exists() {
            warn!("Native jar {:?} is missing, skipping", jar_path);
            continue;
        }

        let jar_bytes = tokio::fs::read(&jar_path)
            .await
            .map_err(|e| LauncherError::io(&jar_path, e))?;

        let dest_dir = natives_dir.to_path_buf();
        let rules = library.extract.clone();
        let extracted = tokio::task::spawn_blocking(move || -> LauncherResult<usize> {
            let mut archive = zip::ZipArchive::new(std::io::Cursor::new(jar_bytes))?;
            let mut count = 0;

            for i in 0..archive.len() {
                let mut file = archive.by_index(i)?;
                if file.is_dir() || !rules.allows(file.name()) {
                    continue;
                }
                let Some(relative) = file.enclosed_name() else {
                    warn!("Skipping unsafe native entry {}", file.name());
                    continue;
                };

                let dest = dest_dir.join(relative);
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
                }
                let mut out =
                    std::fs::File::create(&dest).map_err(|e| LauncherError::io(&dest, e))?;
                std::io::copy(&mut file, &mut out).map_err(|e| LauncherError::io(&dest, e))?;
                count += 1;
            }
            Ok(count)
        })
        .await
        .map_err(|e| LauncherError::Other(format!("Task join error: {}", e)))??;

        debug!("Extracted {} entries from {:?}", extracted, jar_path);
    }

    Ok(())
}

/// Remove the natives directory left by a previous session.
pub async fn cleanup_natives(natives_dir: &Path) {
    if natives_dir.exists() {
        if let Err(e) = tokio::fs::remove_dir_all(natives_dir).await {
            warn!("Failed to clean natives {:?}: {}", natives_dir, e);
        }
    }
}

/// Canonical path as a string, falling back to the path itself.
pub fn safe_path_str(path: &Path) -> String {
    let resolved: PathBuf = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let text = resolved.to_string_lossy().to_string();

    #[cfg(target_os = "windows")]
    {
        // Java rejects extended-length `\\?\C:\...` entries on the classpath.
        if let Some(stripped) = text.strip_prefix(r"\\?\") {
            return stripped.to_string();
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::core::version::ExtractRules;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("classpath-test-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn library(path: &str, native: bool) -> ResolvedLibrary {
        ResolvedLibrary {
            name: path.to_string(),
            path: PathBuf::from(path),
            url: String::new(),
            sha1: None,
            size: None,
            native,
            extract: ExtractRules::default(),
        }
    }

    #[test]
    fn zero_libraries_yields_canonical_jar() {
        let temp = temp_dir("zero");
        let jar = temp.join("1.8.9.jar");
        std::fs::write(&jar, b"jar").unwrap();

        let classpath = build_classpath(&[], &temp.join("libraries"), &jar).unwrap();
        assert_eq!(classpath, safe_path_str(&jar));

        let _ = std::fs::remove_dir_all(&temp);
    }

    #[test]
    fn classpath_skips_natives_and_duplicates() {
        let temp = temp_dir("entries");
        let libs = temp.join("libraries");
        for name in ["a.jar", "b.jar", "natives.jar"] {
            std::fs::create_dir_all(&libs).unwrap();
            std::fs::write(libs.join(name), b"lib").unwrap();
        }
        let jar = temp.join("game.jar");
        std::fs::write(&jar, b"jar").unwrap();

        let libraries = vec![
            library("a.jar", false),
            library("natives.jar", true),
            library("b.jar", false),
            library("a.jar", false),
            library("missing.jar", false),
        ];
        let classpath = build_classpath(&libraries, &libs, &jar).unwrap();
        let sep = get_classpath_separator();
        let parts: Vec<&str> = classpath.split(sep).collect();

        assert_eq!(parts.len(), 3);
        assert!(parts[0].ends_with("a.jar"));
        assert!(parts[1].ends_with("b.jar"));
        assert!(parts[2].ends_with("game.jar"));
        assert!(!classpath.ends_with(sep));
        assert!(!classpath.contains("natives.jar"));

        assert_eq!(missing_libraries(&libraries, &libs).len(), 1);

        let _ = std::fs::remove_dir_all(&temp);
    }

    #[test]
    fn missing_game_jar_is_an_error() {
        let temp = temp_dir("nojar");
        let err = build_classpath(&[], &temp, &temp.join("absent.jar")).unwrap_err();
        assert!(matches!(err, LauncherError::MissingGameJar(_)));
        let _ = std::fs::remove_dir_all(&temp);
    }

    #[tokio::test]
    async fn extract_natives_honors_exclusions() {
        let temp = temp_dir("natives");
        let libs = temp.join("libraries");
        std::fs::create_dir_all(&libs).unwrap();

        {
            let file = std::fs::File::create(libs.join("lwjgl-natives.jar")).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("META-INF/MANIFEST.MF", options).unwrap();
            zip.write_all(b"Manifest-Version: 1.0").unwrap();
            zip.start_file("liblwjgl.so", options).unwrap();
            zip.write_all(b"elf").unwrap();
            zip.finish().unwrap();
        }

        let mut native = library("lwjgl-natives.jar", true);
        native.extract = ExtractRules {
            exclude: vec!["META-INF/".into()],
        };
        let natives_dir = temp.join("natives");
        extract_natives(&[native, library("absent.jar", true)], &libs, &natives_dir)
            .await
            .unwrap();

        assert!(natives_dir.join("liblwjgl.so").exists());
        assert!(!natives_dir.join("META-INF").exists());

        cleanup_natives(&natives_dir).await;
        assert!(!natives_dir.exists());

        let _ = std::fs::remove_dir_all(&temp);
    }
}
