// ─── Launch Events ───
// Progress states and yes/no decisions raised while preparing a launch.

use std::path::PathBuf;

use tracing::info;

/// Stage reached by the launcher while preparing the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    GeneratingLaunchingCodes,
    DownloadingLibraries,
    DecompressingNatives,
    CheckingAssets,
    Launching,
}

/// A question the launcher cannot answer on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Libraries still missing after downloading; continue anyway?
    MissingLibraries { names: Vec<String> },
    /// Asset objects of this index are missing; download them?
    MissingAssets { index: String },
    /// The version jar does not exist; download it?
    MissingGameJar { path: PathBuf },
    /// The version JSON does not parse; re-download it?
    MalformedVersion { id: String },
    /// `versions/<id>/` holds a single JSON named differently; rename it?
    MismatchedVersionJson { id: String, found: String },
    /// `versions/<id>/` holds no usable JSON; delete the folder?
    UnrecoverableVersion { id: String },
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Prompt::MissingLibraries { names } => write!(
                f,
                "{} libraries could not be downloaded ({}). Launch anyway?",
                names.len(),
                names.join(", ")
            ),
            Prompt::MissingAssets { index } => {
                write!(f, "Assets of index {} are incomplete. Download them?", index)
            }
            Prompt::MissingGameJar { path } => {
                write!(f, "Game jar {} is missing. Download it?", path.display())
            }
            Prompt::MalformedVersion { id } => {
                write!(f, "The JSON of version {} is malformed. Download it again?", id)
            }
            Prompt::MismatchedVersionJson { id, found } => write!(
                f,
                "Version folder {} contains {} instead of {}.json. Rename it?",
                id, found, id
            ),
            Prompt::UnrecoverableVersion { id } => write!(
                f,
                "Version folder {} has no usable JSON. Delete the folder?",
                id
            ),
        }
    }
}

/// Receives launch progress and answers prompts.
pub trait LaunchListener: Send + Sync {
    fn on_state_changed(&self, _state: LaunchState) {}

    /// `true` to proceed with the action the prompt proposes.
    fn confirm(&self, prompt: &Prompt) -> bool;
}

/// Answers every prompt the same way. Used for unattended launches.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl LaunchListener for AutoConfirm {
    fn on_state_changed(&self, state: LaunchState) {
        info!("Launch state: {:?}", state);
    }

    fn confirm(&self, prompt: &Prompt) -> bool {
        info!("{} -> {}", prompt, if self.0 { "yes" } else { "no" });
        self.0
    }
}
