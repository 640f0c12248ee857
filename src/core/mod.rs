// ─── Craftlaunch Core ───
// Version resolution, file checks and process launching for Minecraft.
//
// Architecture:
//   core/
//     version/    - Version JSON, OS rules, inheritsFrom resolution, catalog
//     maven/      - Artifact coordinates and repository paths
//     downloader/ - Concurrent downloads with SHA-1 validation
//     assets/     - Asset index + virtual asset reconstruction
//     install/    - Fetching versions, jars, libraries and assets
//     launch/     - Command builder, natives, process supervision
//     java/       - Java runtime detection
//     auth/       - Offline sessions
//     config/     - Launcher and per-version settings
//     modpack/    - Zip import and export of a version with its run directory

pub mod assets;
pub mod auth;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod install;
pub mod java;
pub mod launch;
pub mod layout;
pub mod maven;
pub mod modpack;
pub mod version;
