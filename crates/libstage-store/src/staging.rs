use crate::StoreError;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Process-private scratch directory that bundled files are copied into.
///
/// Every area is a freshly created, uniquely named directory. It is removed
/// with its contents when the value is dropped; abnormal termination leaks it.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Create a new area under the system temp directory.
    pub fn create(prefix: &str) -> Result<Self, StoreError> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        Ok(Self { dir })
    }

    /// Create a new area under `parent`.
    pub fn create_in(parent: &Path, prefix: &str) -> Result<Self, StoreError> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(parent)?;
        Ok(Self { dir })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Copy `reader` verbatim into a new file called `name`.
    ///
    /// The file must not exist yet: staged names are unique within an area.
    pub fn stage(&self, name: &str, reader: &mut dyn Read) -> Result<PathBuf, StoreError> {
        let dest = self.dir.path().join(name);
        let staging_err = |source: io::Error| StoreError::Staging {
            name: name.to_owned(),
            source,
        };
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&dest)
            .map_err(staging_err)?;
        let written = io::copy(reader, &mut file).map_err(staging_err)?;
        file.flush().map_err(staging_err)?;
        debug!("staged {name} ({written} bytes) at {}", dest.display());
        Ok(dest)
    }

    /// Remove the directory now, reporting failures instead of ignoring them.
    pub fn close(self) -> Result<(), StoreError> {
        self.dir.close()?;
        Ok(())
    }
}

/// Files staged from one resource listing, keyed by their listing name.
///
/// Owns its `StagingArea`; dropping the set removes the staged files.
#[derive(Debug)]
pub struct StagedSet {
    area: StagingArea,
    files: BTreeMap<String, PathBuf>,
    missing: Vec<String>,
}

impl StagedSet {
    pub fn new(area: StagingArea) -> Self {
        Self {
            area,
            files: BTreeMap::new(),
            missing: Vec::new(),
        }
    }

    /// Copy one resource into the area and record it.
    pub fn stage(&mut self, name: &str, reader: &mut dyn Read) -> Result<&Path, StoreError> {
        let path = self.area.stage(name, reader)?;
        Ok(self.files.entry(name.to_owned()).or_insert(path).as_path())
    }

    pub(crate) fn record_missing(&mut self, name: &str) {
        self.missing.push(name.to_owned());
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        self.area.path()
    }

    /// Staged files in lexicographic order of name.
    #[inline]
    pub fn files(&self) -> &BTreeMap<String, PathBuf> {
        &self.files
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.files.get(name).map(PathBuf::as_path)
    }

    /// Listing entries that were absent from the bundle.
    #[inline]
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn close(self) -> Result<(), StoreError> {
        self.area.close()
    }
}
