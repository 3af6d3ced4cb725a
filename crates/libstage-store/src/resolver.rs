use crate::bundle::ResourceBundle;
use crate::staging::{StagedSet, StagingArea};
use crate::StoreError;
use libstage_schema::{ResourceManifest, DEFAULT_MANIFEST_NAME, DEFAULT_STAGING_PREFIX};
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Name of the resource listing inside the bundle.
    pub manifest_name: String,
    pub staging_prefix: String,
    /// Parent for the staging directory; the system temp dir when `None`.
    pub staging_parent: Option<PathBuf>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            manifest_name: DEFAULT_MANIFEST_NAME.to_owned(),
            staging_prefix: DEFAULT_STAGING_PREFIX.to_owned(),
            staging_parent: None,
        }
    }
}

/// Read and validate the resource listing of a bundle.
pub fn read_manifest(
    bundle: &dyn ResourceBundle,
    manifest_name: &str,
) -> Result<ResourceManifest, StoreError> {
    let mut reader = bundle
        .open(manifest_name)?
        .ok_or_else(|| StoreError::ManifestMissing(manifest_name.to_owned()))?;
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(ResourceManifest::from_bytes(&bytes)?)
}

/// Stage every resource named by the bundle's listing into a fresh directory.
///
/// The listing is validated in full before anything is written, so an invalid
/// entry fails with zero files staged. Entries absent from the bundle are
/// logged and skipped. Any I/O failure while staging aborts the whole call and
/// the partially populated directory is removed.
pub fn resolve(
    bundle: &dyn ResourceBundle,
    options: &ResolveOptions,
) -> Result<StagedSet, StoreError> {
    let manifest = read_manifest(bundle, &options.manifest_name)?;
    debug!(
        "resource listing '{}' from {} has {} entries",
        options.manifest_name,
        bundle.describe(),
        manifest.len()
    );

    let area = match &options.staging_parent {
        Some(parent) => StagingArea::create_in(parent, &options.staging_prefix)?,
        None => StagingArea::create(&options.staging_prefix)?,
    };
    let mut staged = StagedSet::new(area);

    for name in manifest.iter() {
        let Some(mut reader) = bundle.open(name)? else {
            warn!("resource not found: {name}");
            staged.record_missing(name);
            continue;
        };
        staged.stage(name, &mut reader)?;
    }

    info!(
        "staged {} of {} bundled resources into {}",
        staged.len(),
        manifest.len(),
        staged.dir().display()
    );
    Ok(staged)
}
