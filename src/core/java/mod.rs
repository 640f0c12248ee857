// ─── Java Runtime ───
// Locating and inspecting the Java executable that runs the game.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaRuntime {
    pub path: PathBuf,
    /// Full version string, e.g. `1.8.0_392` or `17.0.9`.
    pub version: String,
    pub major: u32,
    pub is_64bit: bool,
}

impl JavaRuntime {
    /// Run `java -XshowSettings:properties -version` and parse the output.
    pub async fn detect(path: &Path) -> LauncherResult<Self> {
        let output = Command::new(path)
            .args(["-XshowSettings:properties", "-version"])
            .output()
            .await
            .map_err(|e| LauncherError::JavaExecution(format!("{}: {}", path.display(), e)))?;

        let text = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stderr),
            String::from_utf8_lossy(&output.stdout)
        );
        debug!("Inspecting {:?}: {}", path, text.lines().next().unwrap_or(""));

        parse_version_output(path, &text).ok_or_else(|| {
            LauncherError::JavaExecution(format!("Cannot read Java version of {}", path.display()))
        })
    }
}

/// Java from `JAVA_HOME` when set, otherwise whatever `java` is on `PATH`.
pub fn default_java_binary() -> PathBuf {
    if let Some(home) = std::env::var_os("JAVA_HOME") {
        let candidate = PathBuf::from(home).join("bin").join(java_exe());
        if candidate.is_file() {
            return candidate;
        }
    }
    PathBuf::from(java_exe())
}

fn java_exe() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

fn parse_version_output(path: &Path, output: &str) -> Option<JavaRuntime> {
    let version = parse_version_string(output)?;
    let lower = output.to_ascii_lowercase();
    let is_64bit = lower.contains("sun.arch.data.model = 64")
        || lower.contains("os.arch = amd64")
        || lower.contains("os.arch = x86_64")
        || lower.contains("os.arch = aarch64")
        || lower.contains("64-bit");

    Some(JavaRuntime {
        path: path.to_path_buf(),
        major: parse_major_version(&version),
        version,
        is_64bit,
    })
}

fn parse_version_string(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let start = line.find('"')?;
        let end = line[start + 1..].find('"')?;
        Some(line[start + 1..start + 1 + end].to_string())
    })
}

/// `1.8.0_392` → 8, `17.0.9` → 17.
pub fn parse_major_version(version: &str) -> u32 {
    let mut parts = version.split(|c: char| c == '.' || c == '_' || c == '-' || c == '+');
    let major: u32 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    if major == 1 {
        parts.next().and_then(|s| s.parse().ok()).unwrap_or(major)
    } else {
        major
    }
}
