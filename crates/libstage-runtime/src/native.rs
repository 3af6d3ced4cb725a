use crate::backend::DynamicLoader;
use crate::RuntimeError;
use libloading::Library;
use std::ffi::OsStr;
use std::path::Path;
use tracing::debug;

/// Loader backed by the platform dynamic linker (`dlopen` / `LoadLibraryW`).
///
/// Handles are kept for the lifetime of the loader so that nothing it loaded
/// is unloaded behind the caller's back. On Unix libraries are opened with
/// `RTLD_GLOBAL` so that later libraries in the load order can bind to
/// symbols exported by earlier ones.
#[derive(Debug, Default)]
pub struct NativeLoader {
    libraries: Vec<(String, Library)>,
}

impl NativeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets loaded so far, in load order.
    pub fn loaded(&self) -> impl Iterator<Item = &str> {
        self.libraries.iter().map(|(target, _)| target.as_str())
    }

    fn open(&mut self, target: &OsStr) -> Result<(), RuntimeError> {
        let shown = target.to_string_lossy().into_owned();
        let library =
            open_library(target).map_err(|e| RuntimeError::link(shown.clone(), e.to_string()))?;
        debug!("dynamic linker accepted {shown}");
        self.libraries.push((shown, library));
        Ok(())
    }
}

impl DynamicLoader for NativeLoader {
    fn name(&self) -> &'static str {
        "native"
    }

    fn load_path(&mut self, path: &Path) -> Result<(), RuntimeError> {
        if !path.is_absolute() {
            return Err(RuntimeError::link(
                path.display().to_string(),
                "path is not absolute",
            ));
        }
        self.open(path.as_os_str())
    }

    fn load_system(&mut self, name: &str) -> Result<(), RuntimeError> {
        self.open(&libloading::library_filename(name))
    }
}

/// Open a shared library, running its initialisers.
#[cfg(unix)]
#[allow(unsafe_code)]
fn open_library(target: &OsStr) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_LAZY};
    // SAFETY: loading runs the library's static initialisers. Bundled and
    // system libraries are trusted by the application that ships them.
    let library = unsafe { UnixLibrary::open(Some(target), RTLD_LAZY | RTLD_GLOBAL)? };
    Ok(Library::from(library))
}

/// Open a shared library, running its initialisers.
#[cfg(not(unix))]
#[allow(unsafe_code)]
fn open_library(target: &OsStr) -> Result<Library, libloading::Error> {
    // SAFETY: loading runs DllMain. Bundled and system libraries are trusted
    // by the application that ships them.
    unsafe { Library::new(target) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn relative_path_is_rejected_without_loading() {
        let mut loader = NativeLoader::new();
        let err = loader.load_path(Path::new("libtbb.so")).unwrap_err();
        assert!(matches!(err, RuntimeError::Link { .. }));
        assert_eq!(loader.loaded().count(), 0);
    }

    #[test]
    fn garbage_file_is_a_link_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(libloading::library_filename("notalib"));
        fs::write(&path, b"this is not a shared object").unwrap();

        let mut loader = NativeLoader::new();
        let err = loader.load_path(&path).unwrap_err();
        match err {
            RuntimeError::Link { target, message } => {
                assert!(target.contains("notalib"));
                assert!(!message.is_empty());
            }
            other => panic!("expected link error, got {other}"),
        }
        assert_eq!(loader.loaded().count(), 0);
    }

    #[test]
    fn unknown_system_library_is_a_link_error() {
        let mut loader = NativeLoader::new();
        let err = loader
            .load_system("libstage_definitely_absent_library")
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Link { .. }));
    }
}
