use super::{json_pretty, open_bundle, EXIT_MANIFEST_ERROR, EXIT_STAGING_ERROR, EXIT_SUCCESS};
use libstage_core::{Engine, InitOutcome, LoadStatus};
use libstage_runtime::select_backend;
use libstage_schema::LoaderConfig;
use std::path::{Path, PathBuf};

/// Exit codes follow `stage`: an unusable listing is a manifest error (2),
/// a filesystem failure while staging is a staging error (3).
pub fn run(
    config: &LoaderConfig,
    bundle_path: &Path,
    backend: &str,
    parent: Option<PathBuf>,
    json: bool,
) -> Result<u8, String> {
    let bundle = open_bundle(bundle_path)?;
    let backend = select_backend(backend).map_err(|e| e.to_string())?;
    let mut engine = Engine::new(config.clone(), bundle, backend);
    if let Some(parent) = parent {
        engine = engine.with_staging_parent(parent);
    }

    let outcome = match engine.initialize() {
        Ok(outcome) => outcome,
        // A bundle without a listing is reported the same way `stage` does.
        Err(e) if matches!(engine.bundle().contains(&config.manifest), Ok(false)) => {
            return Err(format!("manifest error: {e}"));
        }
        Err(e) => return Err(e.to_string()),
    };
    if json {
        println!("{}", json_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    Ok(exit_code(&outcome))
}

fn exit_code(outcome: &InitOutcome) -> u8 {
    match outcome {
        InitOutcome::Primary { .. } | InitOutcome::Fallback { .. } => EXIT_SUCCESS,
        InitOutcome::Unavailable { reason } if reason.starts_with("manifest error:") => {
            EXIT_MANIFEST_ERROR
        }
        InitOutcome::Unavailable { .. } => EXIT_STAGING_ERROR,
    }
}

fn print_outcome(outcome: &InitOutcome) {
    match outcome {
        InitOutcome::Primary { library } => {
            println!("loaded {library} from the system search path");
        }
        InitOutcome::Fallback {
            staging_dir,
            report,
        } => {
            println!("staged into {}", staging_dir.display());
            for entry in &report.outcomes {
                match &entry.status {
                    LoadStatus::Loaded { file, .. } => {
                        println!("  {:<12} loaded  {file}", entry.name);
                    }
                    LoadStatus::SkippedMissing { candidates } => {
                        println!(
                            "  {:<12} missing (tried {})",
                            entry.name,
                            candidates.join(", ")
                        );
                    }
                    LoadStatus::LoadFailed { file, message, .. } => {
                        println!("  {:<12} failed  {file}: {message}", entry.name);
                    }
                }
            }
            println!(
                "{} of {} libraries loaded",
                report.loaded().count(),
                report.outcomes.len()
            );
        }
        InitOutcome::Unavailable { reason } => {
            println!("native libraries unavailable: {reason}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_outcomes_map_like_stage_errors() {
        let manifest = InitOutcome::Unavailable {
            reason: "manifest error: line 1: invalid resource name 'bad name.so'".to_owned(),
        };
        assert_eq!(exit_code(&manifest), EXIT_MANIFEST_ERROR);

        let staging = InitOutcome::Unavailable {
            reason: "failed to stage 'libtbb.so': disk full".to_owned(),
        };
        assert_eq!(exit_code(&staging), EXIT_STAGING_ERROR);

        let primary = InitOutcome::Primary {
            library: "openvino".to_owned(),
        };
        assert_eq!(exit_code(&primary), EXIT_SUCCESS);
    }
}
