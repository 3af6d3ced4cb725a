use super::{describe_store_error, json_pretty, open_bundle, EXIT_SUCCESS};
use libstage_core::{CoreError, Engine};
use libstage_runtime::NativeLoader;
use libstage_schema::LoaderConfig;
use std::path::{Path, PathBuf};

/// Stage a bundle and print where each resource landed. Nothing is loaded,
/// and the staging directory is removed when the command exits.
pub fn run(
    config: &LoaderConfig,
    bundle_path: &Path,
    parent: Option<PathBuf>,
    json: bool,
) -> Result<u8, String> {
    let bundle = open_bundle(bundle_path)?;
    let mut engine = Engine::new(config.clone(), bundle, Box::new(NativeLoader::new()));
    if let Some(parent) = parent {
        engine = engine.with_staging_parent(parent);
    }
    let staged = engine.stage().map_err(|e| match e {
        CoreError::Store(e) => describe_store_error(&e),
        other => other.to_string(),
    })?;

    if json {
        let payload = serde_json::json!({
            "bundle": engine.bundle().describe(),
            "staging_dir": staged.dir(),
            "staged": staged.files(),
            "missing": staged.missing(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("staged into {}", staged.dir().display());
        for (name, path) in staged.files() {
            println!("  {name} -> {}", path.display());
        }
        for name in staged.missing() {
            println!("  {name} (absent from bundle)");
        }
    }

    staged
        .close()
        .map_err(|e| format!("failed to remove staging directory: {e}"))?;
    Ok(EXIT_SUCCESS)
}
