use super::{describe_store_error, json_pretty, open_bundle, EXIT_SUCCESS};
use libstage_core::{resolve_library, LoadPlan};
use libstage_schema::{LoaderConfig, PlatformFamily};
use libstage_store::read_manifest;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Show what a load would do without writing or loading anything.
pub fn run(
    config: &LoaderConfig,
    bundle_path: &Path,
    platform: Option<PlatformFamily>,
    json: bool,
) -> Result<u8, String> {
    let bundle = open_bundle(bundle_path)?;
    let manifest = read_manifest(bundle.as_ref(), &config.manifest)
        .map_err(|e| describe_store_error(&e))?;

    let mut plan = LoadPlan::from_config(config);
    if let Some(family) = platform {
        plan = plan.with_family(family);
    }

    // Only names that exist in the bundle can end up staged.
    let mut available = BTreeMap::new();
    let mut absent = Vec::new();
    for name in manifest.iter() {
        if bundle.contains(name).map_err(|e| describe_store_error(&e))? {
            available.insert(name.to_owned(), PathBuf::from(name));
        } else {
            absent.push(name.to_owned());
        }
    }

    let libraries: Vec<_> = config
        .libraries
        .iter()
        .map(|name| {
            let spec = plan.spec(name);
            let matched = resolve_library(&spec, &available, plan.match_mode)
                .map(|(file, _)| file.to_owned());
            (spec, matched)
        })
        .collect();

    if json {
        let payload = serde_json::json!({
            "bundle": bundle.describe(),
            "platform": plan.family,
            "match_mode": plan.match_mode,
            "resources": manifest.entries(),
            "absent": absent,
            "libraries": libraries
                .iter()
                .map(|(spec, matched)| serde_json::json!({
                    "name": spec.name,
                    "candidates": spec.candidates,
                    "matched": matched,
                }))
                .collect::<Vec<_>>(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("bundle:     {}", bundle.describe());
        println!("platform:   {}", plan.family);
        println!("match mode: {}", plan.match_mode);
        println!("resources:  {}", manifest.len());
        for name in manifest.iter() {
            if available.contains_key(name) {
                println!("  {name}");
            } else {
                println!("  {name} (absent from bundle)");
            }
        }
        println!("load order:");
        for (spec, matched) in &libraries {
            match matched {
                Some(file) => println!("  {:<12} -> {file}", spec.name),
                None => println!(
                    "  {:<12} -> not found (tried {})",
                    spec.name,
                    spec.candidates.join(", ")
                ),
            }
        }
    }
    Ok(EXIT_SUCCESS)
}
