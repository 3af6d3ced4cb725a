use crate::lifecycle::{validate_transition, InitPhase};
use crate::loader::{load_all, LoadPlan};
use crate::report::LoadReport;
use crate::CoreError;
use libstage_runtime::{DynamicLoader, RuntimeError};
use libstage_schema::{LoaderConfig, PlatformFamily};
use libstage_store::{resolve, ResolveOptions, ResourceBundle, StagedSet};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of one initialization attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InitOutcome {
    /// The primary library was found through the system search path.
    Primary { library: String },
    /// The bundle was staged and the load order attempted.
    Fallback {
        staging_dir: PathBuf,
        report: LoadReport,
    },
    /// Staging failed; native support is not available in this process.
    Unavailable { reason: String },
}

impl InitOutcome {
    pub fn phase(&self) -> InitPhase {
        match self {
            Self::Primary { .. } => InitPhase::PrimaryLoadAttempted,
            Self::Fallback { .. } | Self::Unavailable { .. } => InitPhase::FallbackLoadAttempted,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable { .. })
    }

    pub fn report(&self) -> Option<&LoadReport> {
        match self {
            Self::Fallback { report, .. } => Some(report),
            _ => None,
        }
    }
}

/// Native library initialization for one bundle.
///
/// Tries the primary library through the system search path first. When the
/// linker cannot find it, stages the bundle's resources and loads the
/// configured order from the staging directory. Staged files and loaded
/// libraries are kept for as long as the engine lives.
pub struct Engine {
    config: LoaderConfig,
    plan: LoadPlan,
    bundle: Box<dyn ResourceBundle>,
    backend: Box<dyn DynamicLoader>,
    staging_parent: Option<PathBuf>,
    phase: InitPhase,
    retained: Vec<StagedSet>,
}

impl Engine {
    pub fn new(
        config: LoaderConfig,
        bundle: Box<dyn ResourceBundle>,
        backend: Box<dyn DynamicLoader>,
    ) -> Self {
        let plan = LoadPlan::from_config(&config);
        Self {
            config,
            plan,
            bundle,
            backend,
            staging_parent: None,
            phase: InitPhase::Uninitialized,
            retained: Vec::new(),
        }
    }

    /// Derive filenames for `family` instead of the running host.
    #[must_use]
    pub fn with_platform(mut self, family: PlatformFamily) -> Self {
        self.plan.family = family;
        self
    }

    /// Create staging directories under `dir` instead of the system temp dir.
    #[must_use]
    pub fn with_staging_parent(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_parent = Some(dir.into());
        self
    }

    #[inline]
    pub fn bundle(&self) -> &dyn ResourceBundle {
        self.bundle.as_ref()
    }

    #[inline]
    pub fn phase(&self) -> InitPhase {
        self.phase
    }

    /// Staging directories kept alive by this engine, oldest first.
    pub fn staging_dirs(&self) -> impl Iterator<Item = &Path> {
        self.retained.iter().map(StagedSet::dir)
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            manifest_name: self.config.manifest.clone(),
            staging_prefix: self.config.staging_prefix.clone(),
            staging_parent: self.staging_parent.clone(),
        }
    }

    /// Stage the bundle without loading anything.
    pub fn stage(&self) -> Result<StagedSet, CoreError> {
        Ok(resolve(self.bundle.as_ref(), &self.resolve_options())?)
    }

    /// Load the configured order from an already staged set.
    pub fn load_staged(&mut self, staged: &StagedSet) -> LoadReport {
        let report = load_all(
            &self.config.libraries,
            staged.files(),
            &self.plan,
            self.backend.as_mut(),
        );
        let warnings = report.emit_warnings();
        info!(
            "loaded {} of {} native libraries ({warnings} not loaded)",
            report.loaded().count(),
            report.outcomes.len()
        );
        report
    }

    /// Run one initialization attempt.
    ///
    /// Every call is independent: a fallback stages into a new directory.
    /// Staging failures degrade to [`InitOutcome::Unavailable`]; only errors
    /// that point at a broken bundle or environment are returned.
    pub fn initialize(&mut self) -> Result<InitOutcome, CoreError> {
        self.phase = InitPhase::Uninitialized;
        self.advance(InitPhase::PrimaryLoadAttempted)?;

        let primary = self.config.primary.clone();
        debug!("loading primary library {primary} from the system search path");
        match self.backend.load_system(&primary) {
            Ok(()) => {
                info!("primary library {primary} loaded from the system search path");
                return Ok(InitOutcome::Primary { library: primary });
            }
            Err(e @ RuntimeError::Link { .. }) => {
                debug!("primary load failed, using bundled libraries: {e}");
            }
            Err(e) => {
                warn!("failed to load native libraries: {e}");
                return Err(CoreError::UnexpectedInitialization(e.to_string()));
            }
        }

        self.advance(InitPhase::FallbackLoadAttempted)?;
        self.fallback().inspect_err(|e| {
            warn!("failed to load bundled native libraries: {e}");
        })
    }

    fn fallback(&mut self) -> Result<InitOutcome, CoreError> {
        let staged = match resolve(self.bundle.as_ref(), &self.resolve_options()) {
            Ok(staged) => staged,
            Err(e) if e.is_staging_failure() => {
                warn!(
                    "native libraries unavailable, staging from {} failed: {e}",
                    self.bundle.describe()
                );
                return Ok(InitOutcome::Unavailable {
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(CoreError::UnexpectedInitialization(e.to_string())),
        };

        let report = self.load_staged(&staged);
        let staging_dir = staged.dir().to_path_buf();
        self.retained.push(staged);
        Ok(InitOutcome::Fallback {
            staging_dir,
            report,
        })
    }

    fn advance(&mut self, to: InitPhase) -> Result<(), CoreError> {
        validate_transition(self.phase, to)?;
        self.phase = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::LoadStatus;
    use libstage_runtime::{LoadAttempt, MockLoader};
    use libstage_store::MemoryBundle;

    fn unix_bundle() -> MemoryBundle {
        MemoryBundle::new()
            .with_resource(
                "resources_list.txt",
                &b"libtbb.so.2\nlibtbbmalloc.so.2\nlibopenvino.so\nlibopenvino_c.so\nplugins.xml\n"[..],
            )
            .with_resource("libtbb.so.2", &b"tbb"[..])
            .with_resource("libtbbmalloc.so.2", &b"tbbmalloc"[..])
            .with_resource("libopenvino.so", &b"openvino"[..])
            .with_resource("libopenvino_c.so", &b"openvino_c"[..])
            .with_resource("plugins.xml", &b"<ie/>"[..])
    }

    fn engine(bundle: MemoryBundle, backend: &MockLoader, parent: &Path) -> Engine {
        Engine::new(
            LoaderConfig::default(),
            Box::new(bundle),
            Box::new(backend.clone()),
        )
        .with_platform(PlatformFamily::Unix)
        .with_staging_parent(parent)
    }

    #[test]
    fn primary_success_skips_staging() {
        let parent = tempfile::tempdir().unwrap();
        let backend = MockLoader::new().with_system_library("openvino_c");
        let mut engine = engine(unix_bundle(), &backend, parent.path());

        let outcome = engine.initialize().unwrap();
        assert_eq!(
            outcome,
            InitOutcome::Primary {
                library: "openvino_c".to_owned()
            }
        );
        assert_eq!(engine.phase(), InitPhase::PrimaryLoadAttempted);
        assert_eq!(backend.attempts().len(), 1);
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn fallback_loads_bundle_in_order() {
        let parent = tempfile::tempdir().unwrap();
        let backend = MockLoader::new();
        let mut engine = engine(unix_bundle(), &backend, parent.path());

        let outcome = engine.initialize().unwrap();
        assert_eq!(engine.phase(), InitPhase::FallbackLoadAttempted);
        assert_eq!(outcome.phase(), InitPhase::FallbackLoadAttempted);
        let report = outcome.report().unwrap();
        assert!(report.all_loaded());

        let attempts = backend.attempts();
        assert_eq!(attempts[0], LoadAttempt::System("openvino_c".to_owned()));
        assert_eq!(
            backend.attempted_files(),
            vec![
                "libtbb.so.2",
                "libtbbmalloc.so.2",
                "libopenvino.so",
                "libopenvino_c.so"
            ]
        );
    }

    #[test]
    fn staged_files_survive_while_engine_lives() {
        let parent = tempfile::tempdir().unwrap();
        let backend = MockLoader::new();
        let mut engine = engine(unix_bundle(), &backend, parent.path());

        let InitOutcome::Fallback { staging_dir, .. } = engine.initialize().unwrap() else {
            panic!("expected fallback");
        };
        assert_eq!(
            std::fs::read(staging_dir.join("plugins.xml")).unwrap(),
            b"<ie/>"
        );
        assert_eq!(engine.staging_dirs().count(), 1);
        drop(engine);
        assert!(!staging_dir.exists());
    }

    #[test]
    fn invalid_listing_degrades_to_unavailable() {
        let parent = tempfile::tempdir().unwrap();
        let backend = MockLoader::new();
        let bundle = MemoryBundle::new()
            .with_resource("resources_list.txt", &b"libtbb.so\nbad name.so\n"[..])
            .with_resource("libtbb.so", &b"tbb"[..]);
        let mut engine = engine(bundle, &backend, parent.path());

        let outcome = engine.initialize().unwrap();
        assert!(matches!(
            outcome,
            InitOutcome::Unavailable { ref reason } if reason.contains("bad name.so")
        ));
        assert!(!outcome.is_available());
        assert!(backend.attempted_files().is_empty());
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn duplicate_listing_entry_degrades_to_unavailable() {
        let parent = tempfile::tempdir().unwrap();
        let backend = MockLoader::new();
        let bundle = MemoryBundle::new()
            .with_resource("resources_list.txt", &b"libtbb.so\nlibtbb.so\n"[..])
            .with_resource("libtbb.so", &b"tbb"[..]);
        let mut engine = engine(bundle, &backend, parent.path());

        let outcome = engine.initialize().unwrap();
        assert!(matches!(
            outcome,
            InitOutcome::Unavailable { ref reason }
                if reason.contains("failed to stage 'libtbb.so'")
        ));
        assert_eq!(engine.phase(), InitPhase::FallbackLoadAttempted);
        assert!(backend.attempted_files().is_empty());
        assert_eq!(engine.staging_dirs().count(), 0);
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn stage_copies_bundle_without_loading() {
        let parent = tempfile::tempdir().unwrap();
        let backend = MockLoader::new();
        let engine = engine(unix_bundle(), &backend, parent.path());

        let staged = engine.stage().unwrap();
        assert!(staged.dir().starts_with(parent.path()));
        assert_eq!(staged.len(), 5);
        assert_eq!(std::fs::read(staged.get("libtbb.so.2").unwrap()).unwrap(), b"tbb");
        assert!(backend.attempts().is_empty());
        assert_eq!(engine.phase(), InitPhase::Uninitialized);
        assert!(engine.bundle().describe().starts_with("in-memory"));
    }

    #[test]
    fn missing_listing_is_unexpected() {
        let parent = tempfile::tempdir().unwrap();
        let backend = MockLoader::new();
        let bundle = MemoryBundle::new().with_resource("libtbb.so", &b"tbb"[..]);
        let mut engine = engine(bundle, &backend, parent.path());

        let err = engine.initialize().unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnexpectedInitialization(ref m) if m.contains("resources_list.txt")
        ));
    }

    #[test]
    fn missing_and_failing_libraries_are_reported() {
        let parent = tempfile::tempdir().unwrap();
        let backend = MockLoader::new().failing_on("libopenvino.so");
        let bundle = MemoryBundle::new()
            .with_resource(
                "resources_list.txt",
                &b"libtbb.so.2\nlibopenvino.so\nlibopenvino_c.so\n"[..],
            )
            .with_resource("libtbb.so.2", &b"tbb"[..])
            .with_resource("libopenvino.so", &b"ov"[..])
            .with_resource("libopenvino_c.so", &b"ovc"[..]);
        let mut engine = engine(bundle, &backend, parent.path());

        let outcome = engine.initialize().unwrap();
        let report = outcome.report().unwrap();
        assert!(matches!(report.get("tbb"), Some(LoadStatus::Loaded { .. })));
        assert!(matches!(
            report.get("tbbmalloc"),
            Some(LoadStatus::SkippedMissing { .. })
        ));
        assert!(matches!(
            report.get("openvino"),
            Some(LoadStatus::LoadFailed { .. })
        ));
        assert!(matches!(
            report.get("openvino_c"),
            Some(LoadStatus::Loaded { .. })
        ));
    }

    #[test]
    fn repeated_initialize_uses_fresh_staging() {
        let parent = tempfile::tempdir().unwrap();
        let backend = MockLoader::new();
        let mut engine = engine(unix_bundle(), &backend, parent.path());

        let dirs: Vec<PathBuf> = (0..2)
            .map(|_| match engine.initialize().unwrap() {
                InitOutcome::Fallback { staging_dir, .. } => staging_dir,
                other => panic!("expected fallback, got {other:?}"),
            })
            .collect();
        assert_ne!(dirs[0], dirs[1]);
        assert!(dirs.iter().all(|d| d.is_dir()));
        assert_eq!(engine.staging_dirs().count(), 2);
    }

    #[test]
    fn windows_bundle_uses_dll_names() {
        let parent = tempfile::tempdir().unwrap();
        let backend = MockLoader::new();
        let bundle = MemoryBundle::new()
            .with_resource("resources_list.txt", &b"tbb.dll\nopenvino.dll\n"[..])
            .with_resource("tbb.dll", &b"tbb"[..])
            .with_resource("openvino.dll", &b"ov"[..]);
        let mut engine =
            engine(bundle, &backend, parent.path()).with_platform(PlatformFamily::Windows);

        let outcome = engine.initialize().unwrap();
        assert_eq!(backend.attempted_files(), vec!["tbb.dll", "openvino.dll"]);
        assert_eq!(outcome.report().unwrap().skipped().count(), 2);
    }

    #[test]
    fn outcome_serializes_with_tags() {
        let outcome = InitOutcome::Unavailable {
            reason: "disk full".to_owned(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "unavailable");
        assert_eq!(json["reason"], "disk full");
    }
}
