use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default port appended as `--port` when a server has none.
pub const DEFAULT_SERVER_PORT: u16 = 25565;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyOptions {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Everything about a launch that is not in the version JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Working directory of the game (`${game_directory}`).
    pub game_dir: PathBuf,
    pub java_path: PathBuf,
    /// Major version of `java_path` when known; picks PermSize vs MetaspaceSize.
    pub java_major: Option<u32>,
    pub profile_name: String,
    /// Overrides `${version_name}`; defaults to the version id.
    pub version_name: Option<String>,
    pub min_memory_mb: Option<u32>,
    pub max_memory_mb: Option<u32>,
    /// PermSize (Java < 8) or MetaspaceSize, in MB.
    pub perm_size_mb: Option<u32>,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    /// `host` or `host:port`.
    pub server: Option<String>,
    pub proxy: Option<ProxyOptions>,
    /// Command prefixed before java, e.g. `optirun`.
    pub wrapper: Option<String>,
    /// Run and waited on before the game starts.
    pub pre_launch_command: Option<String>,
    pub java_args: Vec<String>,
    pub minecraft_args: Vec<String>,
    /// Skip every generated JVM flag.
    pub no_jvm_args: bool,
    /// Skip library and asset checks.
    pub not_check_game: bool,
    /// Skip the warning about `-Xmx` exceeding physical memory.
    pub not_check_jvm: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            game_dir: PathBuf::from("."),
            java_path: crate::core::java::default_java_binary(),
            java_major: None,
            profile_name: crate::core::http::APP_NAME.to_string(),
            version_name: None,
            min_memory_mb: None,
            max_memory_mb: None,
            perm_size_mb: None,
            width: 854,
            height: 480,
            fullscreen: false,
            server: None,
            proxy: None,
            wrapper: None,
            pre_launch_command: None,
            java_args: Vec::new(),
            minecraft_args: Vec::new(),
            no_jvm_args: false,
            not_check_game: false,
            not_check_jvm: false,
        }
    }
}

impl LaunchOptions {
    /// `(host, port)` of the configured server.
    pub fn server_address(&self) -> Option<(String, u16)> {
        let server = self.server.as_deref()?.trim();
        if server.is_empty() {
            return None;
        }
        match server.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => match port.parse::<u16>() {
                Ok(port) => Some((host.to_string(), port)),
                Err(_) => Some((server.to_string(), DEFAULT_SERVER_PORT)),
            },
            _ => Some((server.to_string(), DEFAULT_SERVER_PORT)),
        }
    }
}

/// Split a user-entered argument string on whitespace, keeping double
/// quoted sections together.
pub fn tokenize_args(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut has_token = false;

    for c in raw.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                has_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        args.push(current);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_address_defaults_port() {
        let mut options = LaunchOptions {
            server: Some("mc.example.net".into()),
            ..LaunchOptions::default()
        };
        assert_eq!(
            options.server_address(),
            Some(("mc.example.net".to_string(), DEFAULT_SERVER_PORT))
        );

        options.server = Some("mc.example.net:25570".into());
        assert_eq!(
            options.server_address(),
            Some(("mc.example.net".to_string(), 25570))
        );

        options.server = Some("  ".into());
        assert_eq!(options.server_address(), None);
    }

    #[test]
    fn tokenize_keeps_quoted_sections() {
        assert_eq!(
            tokenize_args(r#"-Dfoo=bar  -Dpath="C:\Program Files\x" -XX:+UseG1GC"#),
            vec!["-Dfoo=bar", r"-Dpath=C:\Program Files\x", "-XX:+UseG1GC"]
        );
        assert!(tokenize_args("   ").is_empty());
        assert_eq!(tokenize_args(r#""""#), vec![""]);
    }
}
