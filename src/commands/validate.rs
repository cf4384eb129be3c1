use std::fs;

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::ValidateArgs;
use crate::config::{AdapterSpec, BenchConfig};
use crate::registry::PromptRegistry;
use crate::util::{now_utc_string, write_json_pretty};

#[derive(Debug, Clone, Serialize)]
struct CheckResult {
    name: String,
    result: String,
    detail: String,
}

#[derive(Debug, Clone, Serialize)]
struct CheckSummary {
    total: usize,
    passed: usize,
    failed: usize,
}

#[derive(Debug, Serialize)]
struct ValidationReport {
    manifest_version: u32,
    generated_at: String,
    config_path: String,
    status: String,
    summary: CheckSummary,
    checks: Vec<CheckResult>,
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let config = BenchConfig::load(&args.config)?;
    let mut checks = Vec::new();

    checks.push(prompt_catalog_check(&config));

    for model in &config.models {
        checks.push(model_adapter_check(model.key.as_str(), &model.adapter));
    }
    if config.models.is_empty() {
        checks.push(failed("models", "model catalog is empty"));
    }

    for dataset in &config.datasets {
        checks.push(dataset_check(dataset));
    }
    if config.datasets.is_empty() {
        checks.push(failed("datasets", "dataset catalog is empty"));
    }

    for check in &checks {
        if check.result == "passed" {
            info!(check = %check.name, detail = %check.detail, "check passed");
        } else {
            warn!(check = %check.name, detail = %check.detail, "check failed");
        }
    }

    let summary = CheckSummary {
        total: checks.len(),
        passed: checks.iter().filter(|c| c.result == "passed").count(),
        failed: checks.iter().filter(|c| c.result == "failed").count(),
    };
    let status = if summary.failed > 0 {
        "failed"
    } else {
        "passed"
    };

    if let Some(report_path) = &args.report_path {
        let report = ValidationReport {
            manifest_version: 1,
            generated_at: now_utc_string(),
            config_path: args.config.display().to_string(),
            status: status.to_string(),
            summary: summary.clone(),
            checks: checks.clone(),
        };
        write_json_pretty(report_path, &report)?;
        info!(path = %report_path.display(), "wrote validation report");
    }

    info!(
        total = summary.total,
        passed = summary.passed,
        failed = summary.failed,
        "validation completed"
    );

    if summary.failed > 0 {
        bail!("configuration validation failed: {} checks failed", summary.failed);
    }
    Ok(())
}

fn prompt_catalog_check(config: &BenchConfig) -> CheckResult {
    match PromptRegistry::from_entries(config.prompt_entries()) {
        Ok(registry) => passed(
            "prompt_catalog",
            &format!("{} active prompt instances", registry.list_active().len()),
        ),
        Err(err) => failed("prompt_catalog", &format!("{err:#}")),
    }
}

fn model_adapter_check(model_key: &str, adapter: &AdapterSpec) -> CheckResult {
    let name = format!("model_{model_key}");
    match adapter {
        AdapterSpec::Command { program, .. } => {
            if program.trim().is_empty() {
                failed(&name, "command adapter declares an empty program")
            } else {
                passed(&name, &format!("command adapter via '{program}'"))
            }
        }
        AdapterSpec::Replay { path } => {
            if path.exists() {
                passed(&name, &format!("replay fixture at {}", path.display()))
            } else {
                failed(
                    &name,
                    &format!("replay fixture missing: {}", path.display()),
                )
            }
        }
    }
}

fn dataset_check(dataset: &crate::config::DatasetDescriptor) -> CheckResult {
    let name = format!("dataset_{}", dataset.key);
    if !dataset.path.is_dir() {
        return failed(
            &name,
            &format!("dataset path unreadable: {}", dataset.path.display()),
        );
    }

    let image_count = fs::read_dir(&dataset.path)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| {
                    let lower = entry.file_name().to_string_lossy().to_ascii_lowercase();
                    lower.ends_with(".png") || lower.ends_with(".jpg") || lower.ends_with(".jpeg")
                })
                .count()
        })
        .unwrap_or(0);

    if image_count == 0 {
        failed(&name, "dataset directory contains no images")
    } else {
        passed(&name, &format!("{image_count} images"))
    }
}

fn passed(name: &str, detail: &str) -> CheckResult {
    CheckResult {
        name: name.to_string(),
        result: "passed".to_string(),
        detail: detail.to_string(),
    }
}

fn failed(name: &str, detail: &str) -> CheckResult {
    CheckResult {
        name: name.to_string(),
        result: "failed".to_string(),
        detail: detail.to_string(),
    }
}
