mod settings;
mod version_settings;

pub use settings::{default_data_dir, ConfigStore, LauncherSettings, Profile, SETTINGS_FILE};
pub use version_settings::{GameDirType, VersionSettings, VERSION_SETTINGS_FILE};
