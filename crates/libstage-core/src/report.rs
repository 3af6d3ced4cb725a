use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

/// What happened to one library of the load order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadStatus {
    Loaded {
        file: String,
        path: PathBuf,
    },
    /// No staged file matched any candidate filename.
    SkippedMissing { candidates: Vec<String> },
    /// A file matched but the dynamic linker rejected it.
    LoadFailed {
        file: String,
        path: PathBuf,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryOutcome {
    pub name: String,
    #[serde(flatten)]
    pub status: LoadStatus,
}

/// Per-library outcomes of a load pass, in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub outcomes: Vec<LibraryOutcome>,
}

impl LoadReport {
    pub fn push(&mut self, name: &str, status: LoadStatus) {
        self.outcomes.push(LibraryOutcome {
            name: name.to_owned(),
            status,
        });
    }

    pub fn loaded(&self) -> impl Iterator<Item = &LibraryOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, LoadStatus::Loaded { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &LibraryOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, LoadStatus::SkippedMissing { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &LibraryOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, LoadStatus::LoadFailed { .. }))
    }

    pub fn all_loaded(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o.status, LoadStatus::Loaded { .. }))
    }

    pub fn get(&self, name: &str) -> Option<&LoadStatus> {
        self.outcomes
            .iter()
            .find(|o| o.name == name)
            .map(|o| &o.status)
    }

    /// Log a warning for every library that did not load. Returns how many.
    pub fn emit_warnings(&self) -> usize {
        let mut count = 0;
        for outcome in &self.outcomes {
            match &outcome.status {
                LoadStatus::Loaded { .. } => continue,
                LoadStatus::SkippedMissing { candidates } => {
                    warn!(
                        "skipped library {}: no staged file matches {}",
                        outcome.name,
                        candidates.join(" or ")
                    );
                }
                LoadStatus::LoadFailed { file, message, .. } => {
                    warn!("failed to load library {} from {file}: {message}", outcome.name);
                }
            }
            count += 1;
        }
        count
    }
}
