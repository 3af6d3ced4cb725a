use crate::report::{LoadReport, LoadStatus};
use libstage_runtime::DynamicLoader;
use libstage_schema::{LibrarySpec, LoaderConfig, MatchMode, PlatformFamily, VersionRule};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Everything needed to turn logical names into staged files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    pub family: PlatformFamily,
    pub match_mode: MatchMode,
    pub version_rules: Vec<VersionRule>,
}

impl LoadPlan {
    /// Plan for the running host.
    pub fn from_config(config: &LoaderConfig) -> Self {
        Self {
            family: PlatformFamily::current(),
            match_mode: config.match_mode,
            version_rules: config.versioned.clone(),
        }
    }

    #[must_use]
    pub fn with_family(mut self, family: PlatformFamily) -> Self {
        self.family = family;
        self
    }

    pub fn spec(&self, name: &str) -> LibrarySpec {
        LibrarySpec::derive(name, self.family, &self.version_rules)
    }
}

/// Find the staged file for a library.
///
/// Candidates are tried in order (unversioned first). With
/// [`MatchMode::Prefix`] the lexicographically smallest staged name starting
/// with a candidate wins.
pub fn resolve_library<'a>(
    spec: &LibrarySpec,
    staged: &'a BTreeMap<String, PathBuf>,
    mode: MatchMode,
) -> Option<(&'a str, &'a Path)> {
    spec.candidates.iter().find_map(|candidate| {
        let hit = match mode {
            MatchMode::Exact => staged.get_key_value(candidate.as_str()),
            MatchMode::Prefix => staged
                .range::<str, _>((Bound::Included(candidate.as_str()), Bound::Unbounded))
                .next()
                .filter(|(name, _)| name.starts_with(candidate.as_str())),
        };
        hit.map(|(name, path)| (name.as_str(), path.as_path()))
    })
}

/// Load every library of `order` from `staged`, strictly in order.
///
/// Nothing here aborts the pass: an unresolved name or a linker rejection is
/// recorded and the next library is attempted.
pub fn load_all(
    order: &[String],
    staged: &BTreeMap<String, PathBuf>,
    plan: &LoadPlan,
    backend: &mut dyn DynamicLoader,
) -> LoadReport {
    let mut report = LoadReport::default();

    for name in order {
        let spec = plan.spec(name);
        debug!("loading library {name}, candidates: {:?}", spec.candidates);

        let Some((file, path)) = resolve_library(&spec, staged, plan.match_mode) else {
            report.push(
                name,
                LoadStatus::SkippedMissing {
                    candidates: spec.candidates,
                },
            );
            continue;
        };

        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        info!("loading library {name} from {}", path.display());
        let status = match backend.load_path(&path) {
            Ok(()) => LoadStatus::Loaded {
                file: file.to_owned(),
                path,
            },
            Err(e) => LoadStatus::LoadFailed {
                file: file.to_owned(),
                path,
                message: e.to_string(),
            },
        };
        report.push(name, status);
    }

    report
}
