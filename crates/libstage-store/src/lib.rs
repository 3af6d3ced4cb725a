//! Resource bundles and staging for libstage.
//!
//! This crate provides the storage side of native library loading: the
//! `ResourceBundle` abstraction over where bundled files come from (a
//! directory, memory, or a tar archive), the `StagingArea` temporary directory
//! that bundled files are copied into, and `resolve`, which reads the bundle's
//! resource listing and stages every entry it names.

pub mod bundle;
pub mod resolver;
pub mod staging;

pub use bundle::{DirBundle, MemoryBundle, ResourceBundle, TarBundle};
pub use resolver::{read_manifest, resolve, ResolveOptions};
pub use staging::{StagedSet, StagingArea};

use libstage_schema::ManifestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("resource listing '{0}' not found in bundle")]
    ManifestMissing(String),
    #[error("failed to stage '{name}': {source}")]
    Staging {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bundle error: {0}")]
    Bundle(String),
}

impl StoreError {
    /// Errors caused by a defective listing or by the local filesystem.
    /// These leave native support unavailable rather than failing startup.
    pub fn is_staging_failure(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Manifest(_) | Self::Staging { .. })
    }
}
