use crate::backend::DynamicLoader;
use crate::RuntimeError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// One call made against a [`MockLoader`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadAttempt {
    Path(PathBuf),
    System(String),
}

#[derive(Debug, Default)]
struct MockState {
    attempts: Vec<LoadAttempt>,
    system_libraries: HashSet<String>,
    failing_files: HashSet<String>,
}

/// Loader that records attempts instead of touching the dynamic linker.
///
/// Clones share state, so a test can keep one handle and hand another to the
/// engine. System lookups fail unless registered with
/// [`with_system_library`](Self::with_system_library); path loads succeed
/// unless the file name was registered with [`failing_on`](Self::failing_on).
#[derive(Debug, Clone, Default)]
pub struct MockLoader {
    state: Arc<Mutex<MockState>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_system_library(self, name: &str) -> Self {
        self.lock().system_libraries.insert(name.to_owned());
        self
    }

    #[must_use]
    pub fn failing_on(self, file_name: &str) -> Self {
        self.lock().failing_files.insert(file_name.to_owned());
        self
    }

    pub fn attempts(&self) -> Vec<LoadAttempt> {
        self.lock().attempts.clone()
    }

    /// File names of every path load attempt, in order.
    pub fn attempted_files(&self) -> Vec<String> {
        self.lock()
            .attempts
            .iter()
            .filter_map(|a| match a {
                LoadAttempt::Path(p) => p.file_name().map(|n| n.to_string_lossy().into_owned()),
                LoadAttempt::System(_) => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DynamicLoader for MockLoader {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn load_path(&mut self, path: &Path) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        state.attempts.push(LoadAttempt::Path(path.to_path_buf()));
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if state.failing_files.contains(&file_name) {
            return Err(RuntimeError::link(
                path.display().to_string(),
                format!("{file_name}: undefined symbol (mock)"),
            ));
        }
        if !path.is_absolute() {
            return Err(RuntimeError::link(
                path.display().to_string(),
                "path is not absolute",
            ));
        }
        Ok(())
    }

    fn load_system(&mut self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        state.attempts.push(LoadAttempt::System(name.to_owned()));
        if state.system_libraries.contains(name) {
            Ok(())
        } else {
            Err(RuntimeError::link(
                name,
                "no such library in the system search path (mock)",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged(name: &str) -> PathBuf {
        std::env::temp_dir().join("stage").join(name)
    }

    #[test]
    fn records_attempts_in_order() {
        let handle = MockLoader::new();
        let mut loader = handle.clone();
        let _ = loader.load_system("openvino_c");
        loader.load_path(&staged("libtbb.so")).unwrap();
        assert_eq!(
            handle.attempts(),
            vec![
                LoadAttempt::System("openvino_c".to_owned()),
                LoadAttempt::Path(staged("libtbb.so")),
            ]
        );
        assert_eq!(handle.attempted_files(), vec!["libtbb.so"]);
    }

    #[test]
    fn system_lookup_fails_unless_registered() {
        let mut loader = MockLoader::new().with_system_library("openvino_c");
        assert!(loader.load_system("openvino_c").is_ok());
        assert!(matches!(
            loader.load_system("tbb"),
            Err(RuntimeError::Link { .. })
        ));
    }

    #[test]
    fn injected_link_failure() {
        let mut loader = MockLoader::new().failing_on("libopenvino.so");
        let err = loader.load_path(&staged("libopenvino.so")).unwrap_err();
        assert!(err.to_string().contains("undefined symbol"));
        assert!(loader.load_path(&staged("libtbb.so")).is_ok());
    }

    #[test]
    fn relative_paths_are_rejected() {
        let mut loader = MockLoader::new();
        assert!(loader.load_path(Path::new("libtbb.so")).is_err());
    }
}
