mod artifact;

pub use artifact::MavenArtifact;

/// Default repository for game libraries without an explicit download URL.
pub const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net";
