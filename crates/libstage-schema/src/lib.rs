//! Resource listing, platform naming, and loader configuration for libstage.
//!
//! This crate defines the schema layer: the bundled resource listing
//! (`ResourceManifest`) with its filename charset rules, the host platform
//! family (`PlatformFamily`) and the pure mapping from logical library names to
//! platform filenames (`library_filename`, `LibrarySpec`), and the loader
//! configuration (`LoaderConfig`) read from TOML and the environment.

pub mod config;
pub mod manifest;
pub mod platform;

pub use config::{
    parse_library_list, ConfigError, ConfigFile, LoaderConfig, MatchMode, DEFAULT_LIBRARIES,
    DEFAULT_PRIMARY, DEFAULT_STAGING_PREFIX, NATIVE_LIBS_ENV,
};
pub use manifest::{
    validate_resource_name, ManifestError, ResourceManifest, DEFAULT_MANIFEST_NAME,
};
pub use platform::{library_filename, LibrarySpec, PlatformFamily, VersionRule};
