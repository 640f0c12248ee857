pub mod library;
pub mod manager;
pub mod manifest;
pub mod remote;
pub mod rules;

pub use library::{ExtractRules, Library, ResolvedLibrary};
pub use manager::{VersionManager, VersionRepairer};
pub use manifest::{Argument, ArgumentValue, Arguments, VersionManifest};
pub use remote::{VersionEntry, VersionList};
pub use rules::{Features, OsName, Platform, Rule, RuleAction};
