// ─── Game Process ───
// Spawns the game, pumps its output and reports crashes and exit.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::classpath::safe_path_str;
use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    fn as_str(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// Known failure markers in game output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrashSignal {
    JvmStartupFailure,
    OutOfMemory,
    GameCrashed,
    CorruptedLibraryArchive,
}

pub fn detect_crash(line: &str) -> Option<CrashSignal> {
    if line.contains("Could not create the Java Virtual Machine")
        || line.contains("Error occurred during initialization of VM")
        || line.contains("A fatal exception has occurred")
    {
        return Some(CrashSignal::JvmStartupFailure);
    }
    if line.contains("java.lang.OutOfMemoryError") {
        return Some(CrashSignal::OutOfMemory);
    }
    if line.contains("#@!@# Game crashed!") || line.contains("---- Minecraft Crash Report ----") {
        return Some(CrashSignal::GameCrashed);
    }
    if line.contains("zip END header not found") {
        return Some(CrashSignal::CorruptedLibraryArchive);
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Output { stream: OutputStream, line: String },
    /// Sent at most once per signal kind.
    Crash(CrashSignal),
    /// Exit code 0.
    Exited,
    ExitedAbnormally { code: Option<i32> },
}

/// Configures and spawns the game command.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    tag: String,
    argv: Vec<String>,
    current_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl ProcessLauncher {
    /// `tag` prefixes logged output lines, usually the version id.
    pub fn new(tag: impl Into<String>, argv: Vec<String>) -> Self {
        Self {
            tag: tag.into(),
            argv,
            current_dir: None,
            env: BTreeMap::new(),
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Prepend the natives directory to the platform's library search path.
    pub fn natives_dir(self, natives_dir: &Path) -> Self {
        let native_path = safe_path_str(natives_dir);
        let var = if cfg!(target_os = "windows") {
            "PATH"
        } else if cfg!(target_os = "macos") {
            "DYLD_LIBRARY_PATH"
        } else {
            "LD_LIBRARY_PATH"
        };
        let merged = append_env_path(var, &native_path);
        self.env(var, merged)
    }

    pub fn spawn(self) -> LauncherResult<GameProcess> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| LauncherError::JavaExecution("empty launch command".into()))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| LauncherError::JavaExecution(format!("{}: {}", program, e)))?;
        let pid = child.id();
        info!("Started {} (pid {:?})", self.tag, pid);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = oneshot::channel();
        let seen: Arc<Mutex<HashSet<CrashSignal>>> = Arc::default();

        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(pump_lines(
                stdout,
                OutputStream::Stdout,
                self.tag.clone(),
                event_tx.clone(),
                seen.clone(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(pump_lines(
                stderr,
                OutputStream::Stderr,
                self.tag.clone(),
                event_tx.clone(),
                seen,
            ));
        }

        let tag = self.tag;
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                Ok(()) = kill_rx => {
                    info!("Killing {}", tag);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill {}: {}", tag, e);
                    }
                    child.wait().await
                }
            };

            for reader in readers {
                let _ = reader.await;
            }

            let event = match status {
                Ok(status) if status.success() => {
                    info!("{} exited normally", tag);
                    ProcessEvent::Exited
                }
                Ok(status) => {
                    error!("{} exited with {:?}", tag, status.code());
                    ProcessEvent::ExitedAbnormally {
                        code: status.code(),
                    }
                }
                Err(e) => {
                    error!("Waiting for {} failed: {}", tag, e);
                    ProcessEvent::ExitedAbnormally { code: None }
                }
            };
            let _ = event_tx.send(event);
        });

        Ok(GameProcess {
            pid,
            events: event_rx,
            kill: Some(kill_tx),
        })
    }
}

fn pump_lines<R>(
    reader: R,
    stream: OutputStream,
    tag: String,
    events: mpsc::UnboundedSender<ProcessEvent>,
    seen: Arc<Mutex<HashSet<CrashSignal>>>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("[mc:{}][{}] read failed: {}", tag, stream.as_str(), e);
                    break;
                }
            }
            // JVMs print in the system code page, which is not always UTF-8.
            let line = String::from_utf8_lossy(&buf)
                .trim_end_matches(['\n', '\r'])
                .to_string();

            match stream {
                OutputStream::Stdout => info!("[mc:{}][{}] {}", tag, stream.as_str(), line),
                OutputStream::Stderr => warn!("[mc:{}][{}] {}", tag, stream.as_str(), line),
            }

            let crash = detect_crash(&line);
            let _ = events.send(ProcessEvent::Output { stream, line });

            if let Some(signal) = crash {
                let first = seen.lock().map(|mut s| s.insert(signal)).unwrap_or(false);
                if first {
                    error!("[mc:{}] detected {:?}", tag, signal);
                    let _ = events.send(ProcessEvent::Crash(signal));
                }
            }
        }
        debug!("[mc:{}][{}] closed", tag, stream.as_str());
    })
}

/// Handle to a running game.
pub struct GameProcess {
    pid: Option<u32>,
    events: mpsc::UnboundedReceiver<ProcessEvent>,
    kill: Option<oneshot::Sender<()>>,
}

impl GameProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Next event, `None` once the exit event has been consumed.
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        self.events.recv().await
    }

    /// Ask the process to terminate. Later calls do nothing.
    pub fn kill(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }

    /// Drain events until exit and return the exit code (`None` if killed
    /// by a signal or the wait failed).
    pub async fn wait(mut self) -> Option<i32> {
        while let Some(event) = self.next_event().await {
            match event {
                ProcessEvent::Exited => return Some(0),
                ProcessEvent::ExitedAbnormally { code } => return code,
                _ => {}
            }
        }
        None
    }
}

fn append_env_path(var_name: &str, value: &str) -> String {
    let separator = if cfg!(target_os = "windows") { ";" } else { ":" };
    match std::env::var(var_name) {
        Ok(existing) if !existing.trim().is_empty() => {
            format!("{}{}{}", value, separator, existing)
        }
        _ => value.to_string(),
    }
}

/// Render argv as a single copy/paste friendly command line.
pub fn format_command(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| shell_escape(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=' | '+')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}

/// One line of a POSIX shell script running `argv` verbatim.
pub fn posix_script_line(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| posix_quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One line of a Windows batch file running `argv` verbatim.
pub fn batch_script_line(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| batch_quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Single-quoted unless every character is inert to the shell.
pub fn posix_quote(raw: &str) -> String {
    if !raw.is_empty()
        && raw.chars().all(|ch| {
            ch.is_ascii_alphanumeric()
                || matches!(ch, '-' | '_' | '.' | '/' | ':' | '=' | '+' | ',' | '@')
        })
    {
        return raw.to_string();
    }
    format!("'{}'", raw.replace('\'', "'\\''"))
}

/// Quoted for cmd.exe and the C runtime argument parser. `%` is doubled
/// because batch files expand variables even inside quotes.
pub fn batch_quote(raw: &str) -> String {
    let raw = raw.replace('%', "%%");
    if !raw.is_empty()
        && raw.chars().all(|ch| {
            ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=' | '+')
        })
    {
        return raw;
    }

    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('"');
    let mut backslashes = 0usize;
    for ch in raw.chars() {
        match ch {
            '\\' => backslashes += 1,
            '"' => {
                quoted.extend(std::iter::repeat('\\').take(backslashes * 2 + 1));
                quoted.push('"');
                backslashes = 0;
            }
            _ => {
                quoted.extend(std::iter::repeat('\\').take(backslashes));
                quoted.push(ch);
                backslashes = 0;
            }
        }
    }
    quoted.extend(std::iter::repeat('\\').take(backslashes * 2));
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_quoting_disarms_expansion() {
        assert_eq!(posix_quote("Main"), "Main");
        assert_eq!(posix_quote(""), "''");
        assert_eq!(posix_quote("$HOME"), "'$HOME'");
        assert_eq!(posix_quote("a`id`b"), "'a`id`b'");
        assert_eq!(posix_quote("C:\\dir"), "'C:\\dir'");
        assert_eq!(posix_quote("it's"), "'it'\\''s'");
        assert_eq!(
            posix_script_line(&["java".into(), "-cp".into(), "a b.jar".into()]),
            "java -cp 'a b.jar'"
        );
    }

    #[test]
    fn batch_quoting_doubles_percent_signs() {
        assert_eq!(batch_quote("C:\\Games\\java.exe"), "C:\\Games\\java.exe");
        assert_eq!(batch_quote("%APPDATA%"), "\"%%APPDATA%%\"");
        assert_eq!(batch_quote("100%"), "\"100%%\"");
        assert_eq!(batch_quote("a & b"), "\"a & b\"");
        assert_eq!(batch_quote("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(batch_quote("C:\\my dir\\"), "\"C:\\my dir\\\\\"");
        assert_eq!(batch_quote(""), "\"\"");
    }

    #[test]
    fn crash_markers_are_classified() {
        assert_eq!(
            detect_crash("Error: Could not create the Java Virtual Machine."),
            Some(CrashSignal::JvmStartupFailure)
        );
        assert_eq!(
            detect_crash("Exception in thread \"main\" java.lang.OutOfMemoryError: Java heap space"),
            Some(CrashSignal::OutOfMemory)
        );
        assert_eq!(
            detect_crash("---- Minecraft Crash Report ----"),
            Some(CrashSignal::GameCrashed)
        );
        assert_eq!(
            detect_crash("java.util.zip.ZipException: zip END header not found"),
            Some(CrashSignal::CorruptedLibraryArchive)
        );
        assert_eq!(detect_crash("[Client thread/INFO]: Setting user: Steve"), None);
    }

    #[test]
    fn format_command_quotes_spaces() {
        let argv = vec![
            "java".to_string(),
            "-Xmx2048m".to_string(),
            "-Dpath=/opt/my games".to_string(),
            String::new(),
        ];
        assert_eq!(
            format_command(&argv),
            "java -Xmx2048m \"-Dpath=/opt/my games\" \"\""
        );
    }

    #[test]
    fn append_env_path_prefixes_new_value() {
        let merged = append_env_path("CRAFTLAUNCH_TEST_UNSET_VAR", "/natives");
        assert_eq!(merged, "/natives");
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(ProcessLauncher::new("empty", Vec::new()).spawn().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn output_crash_and_exit_events() {
        let script = "echo hello; \
                      echo 'java.lang.OutOfMemoryError: heap' 1>&2; \
                      echo 'java.lang.OutOfMemoryError: again' 1>&2; \
                      exit 3";
        let mut process = ProcessLauncher::new(
            "test",
            vec!["sh".into(), "-c".into(), script.into()],
        )
        .env("APPDATA", "/tmp")
        .spawn()
        .unwrap();

        let mut outputs = Vec::new();
        let mut crashes = Vec::new();
        let mut exit = None;
        while let Some(event) = process.next_event().await {
            match event {
                ProcessEvent::Output { line, .. } => outputs.push(line),
                ProcessEvent::Crash(signal) => crashes.push(signal),
                other => exit = Some(other),
            }
        }

        assert!(outputs.contains(&"hello".to_string()));
        assert_eq!(outputs.len(), 3);
        assert_eq!(crashes, vec![CrashSignal::OutOfMemory]);
        assert_eq!(exit, Some(ProcessEvent::ExitedAbnormally { code: Some(3) }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_utf8_output_keeps_the_pipe_drained() {
        let script = "printf 'bad\\377line\\n'; \
                      i=0; while [ $i -lt 20000 ]; do \
                      echo 'filler output line to overflow the pipe buffer'; \
                      i=$((i+1)); done; \
                      echo 'java.lang.OutOfMemoryError: late'; \
                      echo done; exit 0";
        let mut process =
            ProcessLauncher::new("latin1", vec!["sh".into(), "-c".into(), script.into()])
                .spawn()
                .unwrap();

        let mut outputs = Vec::new();
        let mut crashes = Vec::new();
        let mut exit = None;
        while let Some(event) = process.next_event().await {
            match event {
                ProcessEvent::Output { line, .. } => outputs.push(line),
                ProcessEvent::Crash(signal) => crashes.push(signal),
                other => exit = Some(other),
            }
        }

        assert_eq!(outputs.first().map(String::as_str), Some("bad\u{FFFD}line"));
        assert_eq!(outputs.last().map(String::as_str), Some("done"));
        assert_eq!(outputs.len(), 20003);
        assert_eq!(crashes, vec![CrashSignal::OutOfMemory]);
        assert_eq!(exit, Some(ProcessEvent::Exited));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_exit_and_kill() {
        let process = ProcessLauncher::new("ok", vec!["sh".into(), "-c".into(), "exit 0".into()])
            .spawn()
            .unwrap();
        assert_eq!(process.wait().await, Some(0));

        let mut process =
            ProcessLauncher::new("sleeper", vec!["sh".into(), "-c".into(), "exec sleep 30".into()])
                .spawn()
                .unwrap();
        process.kill();
        assert_eq!(process.wait().await, None);
    }
}
