use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::RunManifest;

pub fn run(args: StatusArgs) -> Result<()> {
    info!(results_dir = %args.results_dir.display(), "status requested");

    if !args.results_dir.is_dir() {
        warn!(path = %args.results_dir.display(), "results directory missing");
        return Ok(());
    }

    let manifests = list_manifests(&args.results_dir)?;
    if manifests.is_empty() {
        warn!(path = %args.results_dir.display(), "no run manifests found");
        return Ok(());
    }

    let latest = &manifests[manifests.len() - 1];
    let raw = fs::read(latest).with_context(|| format!("failed to read {}", latest.display()))?;
    let manifest: RunManifest =
        serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", latest.display()))?;

    info!(
        run_id = %manifest.run_id,
        status = %manifest.status,
        started_at = %manifest.started_at,
        updated_at = %manifest.updated_at,
        config_sha256 = %manifest.config_sha256,
        active_prompts = manifest.active_prompts.len(),
        models_total = manifest.counts.models_total,
        models_failed = manifest.counts.models_failed,
        datasets_attempted = manifest.counts.datasets_attempted,
        datasets_failed = manifest.counts.datasets_failed,
        prompts_attempted = manifest.counts.prompts_attempted,
        prompts_failed = manifest.counts.prompts_failed,
        images_attempted = manifest.counts.images_attempted,
        images_scored = manifest.counts.images_scored,
        images_failed = manifest.counts.images_failed,
        csv_rows_written = manifest.counts.csv_rows_written,
        csv_files = manifest.csv_files.len(),
        warnings = manifest.warnings.len(),
        "loaded latest run manifest"
    );

    for warning in &manifest.warnings {
        warn!(run_id = %manifest.run_id, "{warning}");
    }

    if manifests.len() > 1 {
        info!(
            total_runs = manifests.len(),
            "older run manifests present in results directory"
        );
    }

    Ok(())
}

fn list_manifests(results_dir: &std::path::Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(results_dir)
        .with_context(|| format!("failed to read {}", results_dir.display()))?;

    let mut manifests: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            name.starts_with("run_") && name.ends_with(".json")
        })
        .collect();
    manifests.sort();
    Ok(manifests)
}
