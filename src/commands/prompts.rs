use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::warn;

use crate::catalog;
use crate::cli::{MethodFilter, PromptsArgs};
use crate::config::BenchConfig;
use crate::registry::{ExtractionKind, PromptDefinition, PromptRegistry};

#[derive(Debug, Serialize)]
struct PromptListing {
    key: String,
    prompt_id: String,
    version_id: String,
    extraction_method: String,
    chain: bool,
    text: String,
}

pub fn run(args: PromptsArgs) -> Result<()> {
    let entries = if args.config.exists() {
        BenchConfig::load(&args.config)?.prompt_entries()
    } else {
        warn!(path = %args.config.display(), "config not found; listing built-in prompt catalog");
        catalog::builtin_prompts()
    };

    let registry = PromptRegistry::from_entries(entries)?;
    let active = match args.method.map(filter_kind) {
        Some(kind) => registry.filter_by_extraction_method(kind),
        None => registry.list_active(),
    };

    let listings: Vec<PromptListing> = active
        .into_iter()
        .map(|(key, definition)| listing(&registry, key, definition))
        .collect();

    let mut output = io::BufWriter::new(io::stdout().lock());

    if args.json {
        serde_json::to_writer_pretty(&mut output, &listings)
            .context("failed to serialize prompt listing")?;
        writeln!(output)?;
    } else {
        writeln!(output, "Active prompts: {}", listings.len())?;
        for item in &listings {
            let chain_marker = if item.chain { " [chain]" } else { "" };
            writeln!(
                output,
                "{}\t{}{}\n\t{}",
                item.key,
                item.extraction_method,
                chain_marker,
                preview(&item.text)
            )?;
        }
    }

    output.flush()?;
    Ok(())
}

fn listing(registry: &PromptRegistry, key: String, definition: &PromptDefinition) -> PromptListing {
    PromptListing {
        key,
        prompt_id: definition.prompt_id.clone(),
        version_id: definition.version_id.clone(),
        extraction_method: definition.method.kind().as_str().to_string(),
        chain: registry.chain(&definition.prompt_id).is_some(),
        text: definition.text.clone(),
    }
}

fn filter_kind(filter: MethodFilter) -> ExtractionKind {
    match filter {
        MethodFilter::DirectOutput => ExtractionKind::DirectOutput,
        MethodFilter::DirectOutputWithRegex => ExtractionKind::DirectOutputWithRegex,
        MethodFilter::SoftmaxBased => ExtractionKind::SoftmaxBased,
        MethodFilter::CcotDirectGuided => ExtractionKind::CcotDirectGuided,
    }
}

fn preview(text: &str) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() > 96 {
        let truncated: String = flattened.chars().take(96).collect();
        format!("{truncated}...")
    } else {
        flattened
    }
}
