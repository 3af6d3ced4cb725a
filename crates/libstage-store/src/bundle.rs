use crate::StoreError;
use libstage_schema::validate_resource_name;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

/// A read-only set of named resources shipped with an application.
///
/// Names are flat file names (no separators); callers validate them before
/// lookup.
pub trait ResourceBundle: Send + Sync {
    /// Human-readable location of the bundle, for logs.
    fn describe(&self) -> String;

    /// Open a resource by name. `Ok(None)` means the bundle has no such resource.
    fn open(&self, name: &str) -> Result<Option<Box<dyn Read + '_>>, StoreError>;

    fn contains(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.open(name)?.is_some())
    }
}

/// Resources are regular files directly inside a directory. Names outside
/// the resource charset are never joined onto the root.
#[derive(Debug, Clone)]
pub struct DirBundle {
    root: PathBuf,
}

impl DirBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceBundle for DirBundle {
    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }

    fn open(&self, name: &str) -> Result<Option<Box<dyn Read + '_>>, StoreError> {
        if !validate_resource_name(name) {
            return Ok(None);
        }
        let path = self.root.join(name);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !file.metadata()?.is_file() {
            return Ok(None);
        }
        Ok(Some(Box::new(BufReader::new(file))))
    }

    fn contains(&self, name: &str) -> Result<bool, StoreError> {
        Ok(validate_resource_name(name) && self.root.join(name).is_file())
    }
}

/// Resources held in memory, typically from `include_bytes!`.
#[derive(Debug, Clone, Default)]
pub struct MemoryBundle {
    resources: BTreeMap<String, Cow<'static, [u8]>>,
}

impl MemoryBundle {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_resource(mut self, name: &str, data: impl Into<Cow<'static, [u8]>>) -> Self {
        self.insert(name, data);
        self
    }

    pub fn insert(&mut self, name: &str, data: impl Into<Cow<'static, [u8]>>) {
        self.resources.insert(name.to_owned(), data.into());
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ResourceBundle for MemoryBundle {
    fn describe(&self) -> String {
        format!("in-memory bundle ({} resources)", self.resources.len())
    }

    fn open(&self, name: &str) -> Result<Option<Box<dyn Read + '_>>, StoreError> {
        Ok(self
            .resources
            .get(name)
            .map(|data| Box::new(Cursor::new(data.as_ref())) as Box<dyn Read + '_>))
    }

    fn contains(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.resources.contains_key(name))
    }
}

/// Resources are the top-level regular files of a tar archive.
///
/// The archive is scanned once when opened to record where each entry's data
/// starts; a lookup seeks there and streams exactly that entry.
#[derive(Debug, Clone)]
pub struct TarBundle {
    path: PathBuf,
    entries: BTreeMap<String, TarEntry>,
}

#[derive(Debug, Clone, Copy)]
struct TarEntry {
    offset: u64,
    size: u64,
}

impl TarBundle {
    pub fn open_archive(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let bundle_err = |e: io::Error| StoreError::Bundle(format!("{}: {e}", path.display()));
        let mut entries = BTreeMap::new();
        let mut archive = tar::Archive::new(File::open(&path)?);
        for entry in archive.entries().map_err(bundle_err)? {
            let entry = entry.map_err(bundle_err)?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            if let Some(name) = top_level_name(&entry.path()?) {
                // Later entries replace earlier ones, as when extracting.
                entries.insert(
                    name,
                    TarEntry {
                        offset: entry.raw_file_position(),
                        size: entry.size(),
                    },
                );
            }
        }
        Ok(Self { path, entries })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl ResourceBundle for TarBundle {
    fn describe(&self) -> String {
        format!("archive {}", self.path.display())
    }

    fn open(&self, name: &str) -> Result<Option<Box<dyn Read + '_>>, StoreError> {
        let Some(entry) = self.entries.get(name) else {
            return Ok(None);
        };
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(entry.offset))?;
        Ok(Some(Box::new(BufReader::new(file).take(entry.size))))
    }

    fn contains(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.entries.contains_key(name))
    }
}

/// `name` and `./name` are top-level; anything nested is not addressable.
fn top_level_name(path: &Path) -> Option<String> {
    let mut normal = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir));
    match (normal.next(), normal.next()) {
        (Some(Component::Normal(name)), None) => name.to_str().map(str::to_owned),
        _ => None,
    }
}
