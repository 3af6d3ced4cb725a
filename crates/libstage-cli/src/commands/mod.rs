pub mod load;
pub mod plan;
pub mod stage;

use libstage_schema::LoaderConfig;
use libstage_store::{DirBundle, ResourceBundle, StoreError, TarBundle};
use std::path::Path;
use tracing::debug;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_STAGING_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

/// Defaults, then the TOML file if one was given, then the environment.
pub fn load_config(path: Option<&Path>) -> Result<LoaderConfig, String> {
    let config = match path {
        Some(path) => {
            debug!("reading loader config from {}", path.display());
            LoaderConfig::load(path)
                .map_err(|e| format!("config error: {}: {e}", path.display()))?
        }
        None => {
            debug!("no config file given, using loader defaults");
            LoaderConfig::default()
        }
    };
    config
        .with_env_overrides()
        .map_err(|e| format!("config error: {e}"))
}

/// A directory is read as-is; any other file is treated as a tar archive.
pub fn open_bundle(path: &Path) -> Result<Box<dyn ResourceBundle>, String> {
    if path.is_dir() {
        debug!("opening bundle directory {}", path.display());
        return Ok(Box::new(DirBundle::new(path)));
    }
    if !path.is_file() {
        return Err(format!("bundle not found: {}", path.display()));
    }
    debug!("opening bundle archive {}", path.display());
    let archive = TarBundle::open_archive(path).map_err(|e| describe_store_error(&e))?;
    Ok(Box::new(archive))
}

/// Prefix store errors so that `main` can map them to an exit code.
pub fn describe_store_error(err: &StoreError) -> String {
    match err {
        StoreError::Manifest(_) | StoreError::Bundle(_) => err.to_string(),
        StoreError::ManifestMissing(_) => format!("manifest error: {err}"),
        StoreError::Io(_) | StoreError::Staging { .. } => format!("staging error: {err}"),
    }
}
