use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::adapter::{ModelAdapter, RawPrediction, build_adapter};
use crate::cli::RunArgs;
use crate::config::{BenchConfig, DatasetDescriptor, ModelDescriptor};
use crate::error::RegistryError;
use crate::extract::{self, Extractor, SceneGraphScorer, UnspecifiedScorer};
use crate::model::{
    DatasetResults, ImageScore, ModelResults, PromptResults, RunCounts, RunManifest, RunPaths,
};
use crate::registry::{ExtractionMethod, PromptDefinition, PromptRegistry};
use crate::util::{
    csv_field, ensure_directory, now_utc_string, sanitize_file_stem, sha256_file,
    utc_compact_string, write_json_pretty,
};

const MANIFEST_VERSION: u32 = 1;
const PROGRESS_INTERVAL: usize = 10;
const CSV_HEADER: &str = "model_name,dataset,prompt,image_id,predicted_score";

pub fn run(args: RunArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    ensure_directory(&args.results_dir)?;
    let manifest_path = args
        .manifest_path
        .clone()
        .unwrap_or_else(|| {
            args.results_dir
                .join(format!("run_{}.json", utc_compact_string(started_ts)))
        });

    info!(run_id = %run_id, config = %args.config.display(), "starting benchmark run");

    let config = BenchConfig::load(&args.config)?;
    let config_sha256 = sha256_file(&args.config)?;
    let registry = PromptRegistry::from_entries(config.prompt_entries())?;

    let active_prompts: Vec<String> = registry
        .list_active()
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    info!(active_prompts = active_prompts.len(), "resolved active prompt instances");

    let models = select_models(&config, &args.models)?;
    let datasets = select_datasets(&config, &args.datasets)?;

    let mut ctx = RunContext::new(&registry)?;
    ctx.counts.models_total = models.len();

    let mut results = Vec::with_capacity(models.len());
    let mut csv_files = Vec::new();

    for model in &models {
        info!(model = %model.key, name = %model.model_name, "processing model");

        let model_results = match build_adapter(model) {
            Ok(mut adapter) => {
                let dataset_results = ctx.run_model(adapter.as_mut(), &datasets);
                ModelResults {
                    model_key: model.key.clone(),
                    model_name: model.model_name.clone(),
                    error: None,
                    datasets: dataset_results,
                }
            }
            Err(err) => {
                warn!(model = %model.key, error = %err, "model failed; continuing with next model");
                ctx.counts.models_failed += 1;
                ctx.warnings.push(format!("model {}: {err:#}", model.key));
                ModelResults {
                    model_key: model.key.clone(),
                    model_name: model.model_name.clone(),
                    error: Some(format!("{err:#}")),
                    datasets: Vec::new(),
                }
            }
        };

        if model_results.error.is_none() {
            let csv_path = write_model_csv(
                &args.results_dir,
                &model_results,
                &utc_compact_string(started_ts),
                &mut ctx.counts,
            )?;
            info!(path = %csv_path.display(), "results saved");
            csv_files.push(csv_path.display().to_string());
        }

        results.push(model_results);
    }

    let manifest = RunManifest {
        manifest_version: MANIFEST_VERSION,
        run_id: run_id.clone(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_run_command(&args),
        config_sha256,
        active_prompts,
        paths: RunPaths {
            config_path: args.config.display().to_string(),
            results_dir: args.results_dir.display().to_string(),
            manifest_path: manifest_path.display().to_string(),
        },
        counts: ctx.counts.clone(),
        csv_files,
        warnings: ctx.warnings.clone(),
        results,
    };

    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        path = %manifest_path.display(),
        models = manifest.counts.models_total,
        images_scored = manifest.counts.images_scored,
        images_failed = manifest.counts.images_failed,
        warnings = manifest.warnings.len(),
        "benchmark run completed"
    );

    Ok(())
}

struct RunContext<'a> {
    registry: &'a PromptRegistry,
    extractor: Extractor,
    scorer: Box<dyn SceneGraphScorer>,
    counts: RunCounts,
    warnings: Vec<String>,
}

impl<'a> RunContext<'a> {
    fn new(registry: &'a PromptRegistry) -> Result<Self> {
        Ok(Self {
            registry,
            extractor: Extractor::new()?,
            scorer: Box::new(UnspecifiedScorer),
            counts: RunCounts::default(),
            warnings: Vec::new(),
        })
    }

    fn run_model(
        &mut self,
        adapter: &mut dyn ModelAdapter,
        datasets: &[&DatasetDescriptor],
    ) -> Vec<DatasetResults> {
        datasets
            .iter()
            .map(|dataset| self.run_dataset(adapter, dataset))
            .collect()
    }

    fn run_dataset(
        &mut self,
        adapter: &mut dyn ModelAdapter,
        dataset: &DatasetDescriptor,
    ) -> DatasetResults {
        info!(dataset = %dataset.key, path = %dataset.path.display(), "processing dataset");
        self.counts.datasets_attempted += 1;

        let samples = match list_samples(dataset) {
            Ok(samples) => samples,
            Err(err) => {
                warn!(dataset = %dataset.key, error = %err, "dataset failed; continuing with next dataset");
                self.counts.datasets_failed += 1;
                self.warnings.push(format!("dataset {}: {err:#}", dataset.key));
                return DatasetResults {
                    dataset_key: dataset.key.clone(),
                    error: Some(format!("{err:#}")),
                    prompts: Vec::new(),
                };
            }
        };
        info!(dataset = %dataset.key, samples = samples.len(), "loaded samples");

        let registry = self.registry;
        let prompts = registry
            .list_active()
            .into_iter()
            .map(|(key, definition)| self.run_prompt(adapter, &key, definition, dataset, &samples))
            .collect();

        DatasetResults {
            dataset_key: dataset.key.clone(),
            error: None,
            prompts,
        }
    }

    fn run_prompt(
        &mut self,
        adapter: &mut dyn ModelAdapter,
        prompt_key: &str,
        definition: &PromptDefinition,
        dataset: &DatasetDescriptor,
        samples: &[String],
    ) -> PromptResults {
        info!(prompt = prompt_key, "applying prompt");
        self.counts.prompts_attempted += 1;

        let chain_steps = match self.resolve_chain_steps(definition) {
            Ok(steps) => steps,
            Err(err) => {
                warn!(prompt = prompt_key, error = %err, "prompt failed; continuing with next prompt");
                self.counts.prompts_failed += 1;
                self.counts.images_attempted += samples.len();
                self.counts.images_failed += samples.len();
                self.warnings
                    .push(format!("prompt {}/{}: {err:#}", dataset.key, prompt_key));
                return PromptResults {
                    prompt_key: prompt_key.to_string(),
                    error: Some(format!("{err:#}")),
                    scores: samples
                        .iter()
                        .map(|image_id| ImageScore {
                            image_id: image_id.clone(),
                            score: None,
                        })
                        .collect(),
                };
            }
        };

        let mut scores = Vec::with_capacity(samples.len());
        for (index, image_id) in samples.iter().enumerate() {
            let image_path = dataset.path.join(image_id);
            self.counts.images_attempted += 1;

            let score = match self.score_image(adapter, definition, chain_steps.as_deref(), &image_path)
            {
                Ok(score) => score,
                Err(err) => {
                    warn!(image = %image_id, error = %err, "sample failed; recording null");
                    self.warnings
                        .push(format!("{}/{}/{}: {err:#}", dataset.key, prompt_key, image_id));
                    None
                }
            };

            match score {
                Some(_) => self.counts.images_scored += 1,
                None => self.counts.images_failed += 1,
            }
            scores.push(ImageScore {
                image_id: image_id.clone(),
                score,
            });

            if (index + 1) % PROGRESS_INTERVAL == 0 {
                info!(
                    prompt = prompt_key,
                    processed = index + 1,
                    total = samples.len(),
                    "progress"
                );
            }
        }

        PromptResults {
            prompt_key: prompt_key.to_string(),
            error: None,
            scores,
        }
    }

    fn resolve_chain_steps(
        &self,
        definition: &PromptDefinition,
    ) -> Result<Option<Vec<&'a PromptDefinition>>, RegistryError> {
        let registry: &'a PromptRegistry = self.registry;
        match registry.chain(&definition.prompt_id) {
            Some(chain) => chain
                .order
                .iter()
                .map(|step| registry.get(&definition.prompt_id, step))
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            None => Ok(None),
        }
    }

    fn score_image(
        &self,
        adapter: &mut dyn ModelAdapter,
        definition: &PromptDefinition,
        chain_steps: Option<&[&PromptDefinition]>,
        image_path: &Path,
    ) -> Result<Option<f64>> {
        if let Some(steps) = chain_steps {
            return self.run_chain(adapter, steps, image_path);
        }

        let raw = adapter.generate(&definition.text, image_path)?;
        self.extract_score(&*adapter, definition, &raw)
    }

    fn run_chain(
        &self,
        adapter: &mut dyn ModelAdapter,
        steps: &[&PromptDefinition],
        image_path: &Path,
    ) -> Result<Option<f64>> {
        let mut outputs: Vec<(&PromptDefinition, String)> = Vec::with_capacity(steps.len());
        let mut last: Option<(&PromptDefinition, RawPrediction)> = None;

        for step in steps {
            let mut formatted = step.text.clone();
            if let Some(tag) = &step.input_type {
                if let Some((_, prev_text)) = outputs
                    .iter()
                    .rev()
                    .find(|(earlier, _)| earlier.output_type.as_deref() == Some(tag.as_str()))
                {
                    formatted = formatted.replace(&format!("{{{tag}}}"), prev_text);
                }
            }

            let raw = adapter.generate(&formatted, image_path)?;
            outputs.push((step, raw.text.clone()));
            last = Some((step, raw));
        }

        let (final_step, final_raw) = last.context("chain prompt produced no steps")?;
        self.extract_score(&*adapter, final_step, &final_raw)
    }

    fn extract_score(
        &self,
        adapter: &dyn ModelAdapter,
        definition: &PromptDefinition,
        raw: &RawPrediction,
    ) -> Result<Option<f64>> {
        match &definition.method {
            ExtractionMethod::DirectOutput => Ok(self.extractor.first_number(&raw.text)),
            ExtractionMethod::DirectOutputWithRegex { .. } => {
                let re = definition
                    .score_regex
                    .as_ref()
                    .context("regex prompt without compiled pattern")?;
                if let Some(description_re) = &definition.description_regex {
                    if let Some(description) = extract::description_capture(description_re, &raw.text)
                    {
                        debug!(
                            prompt = %definition.instance_key(),
                            description = %description,
                            "captured quality description"
                        );
                    }
                }
                Ok(extract::regex_capture(re, &raw.text))
            }
            ExtractionMethod::SoftmaxBased { token_pair } => {
                let score =
                    adapter.score_from_signal(&raw.signal, (&token_pair.0, &token_pair.1))?;
                Ok(Some(score))
            }
            ExtractionMethod::CcotDirectGuided => Ok(extract::parse_scene_graph(&raw.text)
                .and_then(|graph| self.scorer.score(&graph))),
        }
    }
}

fn select_models<'c>(
    config: &'c BenchConfig,
    filters: &[String],
) -> Result<Vec<&'c ModelDescriptor>> {
    if filters.is_empty() {
        return Ok(config.models.iter().collect());
    }
    filters
        .iter()
        .map(|key| {
            config
                .model(key)
                .ok_or_else(|| anyhow::Error::new(RegistryError::ModelNotFound(key.clone())))
        })
        .collect()
}

fn select_datasets<'c>(
    config: &'c BenchConfig,
    filters: &[String],
) -> Result<Vec<&'c DatasetDescriptor>> {
    if filters.is_empty() {
        return Ok(config.datasets.iter().collect());
    }
    filters
        .iter()
        .map(|key| {
            config
                .dataset(key)
                .ok_or_else(|| anyhow::Error::new(RegistryError::DatasetNotFound(key.clone())))
        })
        .collect()
}

fn list_samples(dataset: &DatasetDescriptor) -> Result<Vec<String>> {
    let entries = fs::read_dir(&dataset.path).with_context(|| {
        format!(
            "failed to read dataset directory: {}",
            dataset.path.display()
        )
    })?;

    let mut samples = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| {
            format!(
                "failed to list dataset directory: {}",
                dataset.path.display()
            )
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if has_image_extension(&name) {
            samples.push(name);
        }
    }

    samples.sort();
    if dataset.sample_size > 0 && samples.len() > dataset.sample_size {
        samples.truncate(dataset.sample_size);
    }

    Ok(samples)
}

fn has_image_extension(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".png") || lower.ends_with(".jpg") || lower.ends_with(".jpeg")
}

fn write_model_csv(
    results_dir: &Path,
    model_results: &ModelResults,
    run_ts: &str,
    counts: &mut RunCounts,
) -> Result<PathBuf> {
    let filename = format!(
        "{}_results_{}.csv",
        sanitize_file_stem(&model_results.model_name),
        run_ts
    );
    let csv_path = results_dir.join(filename);

    let file = File::create(&csv_path)
        .with_context(|| format!("failed to create results file: {}", csv_path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{CSV_HEADER}")?;

    for dataset in &model_results.datasets {
        for prompt in &dataset.prompts {
            for entry in &prompt.scores {
                let score_cell = entry.score.map(|v| v.to_string()).unwrap_or_default();
                writeln!(
                    writer,
                    "{},{},{},{},{}",
                    csv_field(&model_results.model_name),
                    csv_field(&dataset.dataset_key),
                    csv_field(&prompt.prompt_key),
                    csv_field(&entry.image_id),
                    score_cell
                )?;
                counts.csv_rows_written += 1;
            }
        }
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush results file: {}", csv_path.display()))?;

    Ok(csv_path)
}

fn render_run_command(args: &RunArgs) -> String {
    let mut parts = vec![
        "iqabench run".to_string(),
        format!("--config {}", args.config.display()),
        format!("--results-dir {}", args.results_dir.display()),
    ];
    for model in &args.models {
        parts.push(format!("--model {model}"));
    }
    for dataset in &args.datasets {
        parts.push(format!("--dataset {dataset}"));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests;
