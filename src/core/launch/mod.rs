pub mod arguments;
pub mod classpath;
pub mod command;
pub mod events;
pub mod options;
pub mod process;
pub mod task;

pub use classpath::{build_classpath, cleanup_natives, extract_natives};
pub use command::LaunchCommandBuilder;
pub use events::{AutoConfirm, LaunchListener, LaunchState, Prompt};
pub use options::{LaunchOptions, ProxyOptions};
pub use process::{GameProcess, OutputStream, ProcessEvent, ProcessLauncher};
pub use task::{GameLauncher, LaunchPlan};
