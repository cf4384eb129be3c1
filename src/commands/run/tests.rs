use std::collections::BTreeMap;
use std::path::PathBuf;

use super::*;
use crate::adapter::AuxSignal;
use crate::config::{PromptEntryConfig, PromptVersionConfig};

struct ScriptedAdapter {
    responses: BTreeMap<String, String>,
    default_response: String,
    fail_on: Option<String>,
    logits: Option<BTreeMap<String, f64>>,
    prompts_seen: Vec<String>,
}

impl ScriptedAdapter {
    fn returning(default_response: &str) -> Self {
        Self {
            responses: BTreeMap::new(),
            default_response: default_response.to_string(),
            fail_on: None,
            logits: None,
            prompts_seen: Vec::new(),
        }
    }
}

impl ModelAdapter for ScriptedAdapter {
    fn generate(
        &mut self,
        prompt: &str,
        image_path: &Path,
    ) -> std::result::Result<RawPrediction, crate::error::AdapterError> {
        self.prompts_seen.push(prompt.to_string());

        let image_id = image_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        if self.fail_on.as_deref() == Some(image_id.as_str()) {
            return Err(crate::error::AdapterError::Invocation(format!(
                "scripted failure for {image_id}"
            )));
        }

        let text = self
            .responses
            .get(&image_id)
            .cloned()
            .unwrap_or_else(|| self.default_response.clone());
        let signal = match &self.logits {
            Some(logits) => AuxSignal::TokenLogits(logits.clone()),
            None => AuxSignal::None,
        };

        Ok(RawPrediction { text, signal })
    }

    fn score_from_signal(
        &self,
        signal: &AuxSignal,
        token_pair: (&str, &str),
    ) -> std::result::Result<f64, crate::error::AdapterError> {
        let AuxSignal::TokenLogits(logits) = signal else {
            return Err(crate::error::AdapterError::SignalUnavailable(
                "scripted adapter has no logits".to_string(),
            ));
        };
        let favorable = logits.get(token_pair.0).copied().unwrap_or_default();
        let unfavorable = logits.get(token_pair.1).copied().unwrap_or_default();
        Ok(favorable / (favorable + unfavorable))
    }
}

fn version(version_id: &str, text: &str, method: &str) -> PromptVersionConfig {
    PromptVersionConfig {
        version: version_id.to_string(),
        text: text.to_string(),
        extraction_method: method.to_string(),
        regex_pattern: None,
        description_pattern: None,
        token_pair: None,
        requires_json: false,
        input_type: None,
        output_type: None,
        active: true,
    }
}

fn entry(id: &str, versions: Vec<PromptVersionConfig>) -> PromptEntryConfig {
    PromptEntryConfig {
        id: id.to_string(),
        description: None,
        prompt_type: None,
        chain_order: Vec::new(),
        versions,
    }
}

fn dataset(key: &str, path: PathBuf) -> DatasetDescriptor {
    DatasetDescriptor {
        key: key.to_string(),
        path,
        sample_size: 0,
    }
}

fn temp_dataset_dir(label: &str, files: &[&str]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("iqabench-{}-{}", label, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    for file in files {
        fs::write(dir.join(file), b"").unwrap();
    }
    dir
}

#[test]
fn every_sample_yields_exactly_one_entry_and_failures_stay_isolated() {
    let registry = PromptRegistry::from_entries(vec![entry(
        "p1",
        vec![version("v1", "Rate the quality of the image.", "direct_output")],
    )])
    .unwrap();
    let mut ctx = RunContext::new(&registry).unwrap();

    let mut adapter = ScriptedAdapter::returning("The score is 4 out of 5.");
    adapter.fail_on = Some("img_042.png".to_string());

    let samples: Vec<String> = (0..50).map(|i| format!("img_{i:03}.png")).collect();
    let binding = registry.list_active();
    let (key, definition) = &binding[0];

    let results = ctx.run_prompt(
        &mut adapter,
        key,
        definition,
        &dataset("d1", PathBuf::from("/data/d1")),
        &samples,
    );

    assert!(results.error.is_none());
    assert_eq!(results.scores.len(), 50);

    let failed: Vec<&ImageScore> = results
        .scores
        .iter()
        .filter(|entry| entry.score.is_none())
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].image_id, "img_042.png");

    assert!(results
        .scores
        .iter()
        .filter(|entry| entry.image_id != "img_042.png")
        .all(|entry| entry.score == Some(4.0)));

    assert_eq!(ctx.counts.images_attempted, 50);
    assert_eq!(ctx.counts.images_scored, 49);
    assert_eq!(ctx.counts.images_failed, 1);
}

#[test]
fn declared_regex_takes_precedence_over_first_number() {
    let mut regex_version = version("v1", "Respond as Score: [a score].", "direct_output");
    regex_version.regex_pattern = Some(r"Score:\s*(\d+)".to_string());

    let registry = PromptRegistry::from_entries(vec![entry("p2", vec![regex_version])]).unwrap();
    let mut ctx = RunContext::new(&registry).unwrap();

    let mut adapter = ScriptedAdapter::returning("I would rate this 9. Score: 87");

    let binding = registry.list_active();
    let (key, definition) = &binding[0];
    let results = ctx.run_prompt(
        &mut adapter,
        key,
        definition,
        &dataset("d1", PathBuf::from("/data/d1")),
        &["img_001.png".to_string()],
    );

    assert_eq!(results.scores[0].score, Some(87.0));
}

#[test]
fn regex_miss_is_failure_not_a_fallback_to_another_strategy() {
    let mut regex_version = version("v1", "Respond as Score: [a score].", "direct_output");
    regex_version.regex_pattern = Some(r"Score:\s*(\d+)".to_string());

    let registry = PromptRegistry::from_entries(vec![entry("p2", vec![regex_version])]).unwrap();
    let mut ctx = RunContext::new(&registry).unwrap();
    let mut adapter = ScriptedAdapter::returning("I would rate this image a 4.");

    let binding = registry.list_active();
    let (key, definition) = &binding[0];
    let results = ctx.run_prompt(
        &mut adapter,
        key,
        definition,
        &dataset("d1", PathBuf::from("/data/d1")),
        &["img_001.png".to_string()],
    );

    assert_eq!(results.scores[0].score, None);
}

#[test]
fn chain_substitutes_previous_step_output_verbatim() {
    let mut first = version("v1", "Generate a scene graph. Scene Graph:", "ccot_direct_guided");
    first.output_type = Some("scene_graph".to_string());
    let mut second = version(
        "v2",
        "Use the following scene graph as context:\n\n{scene_graph}\n\nAnswer with a digit.",
        "ccot_direct_guided",
    );
    second.input_type = Some("scene_graph".to_string());

    let mut chain_entry = entry("p3", vec![first, second]);
    chain_entry.prompt_type = Some("chain".to_string());
    chain_entry.chain_order = vec!["v1".to_string(), "v2".to_string()];

    let registry = PromptRegistry::from_entries(vec![chain_entry]).unwrap();
    let mut ctx = RunContext::new(&registry).unwrap();

    let scene_graph = r#"{"objects": [{"name": "dog", "attributes": ["blurry"]}]}"#;
    let mut adapter = ScriptedAdapter::returning(scene_graph);

    let binding = registry.list_active();
    let (key, definition) = &binding[0];
    assert_eq!(key, "p3_v1");

    let results = ctx.run_prompt(
        &mut adapter,
        key,
        definition,
        &dataset("d1", PathBuf::from("/data/d1")),
        &["img_001.png".to_string()],
    );

    assert_eq!(adapter.prompts_seen.len(), 2);
    assert!(adapter.prompts_seen[0].contains("Scene Graph:"));
    assert!(adapter.prompts_seen[1].contains(scene_graph));
    assert!(!adapter.prompts_seen[1].contains("{scene_graph}"));

    assert_eq!(results.scores[0].score, Some(0.0));
}

#[test]
fn dataset_failure_never_aborts_the_model_loop() {
    let registry = PromptRegistry::from_entries(vec![entry(
        "p1",
        vec![version("v1", "Rate the quality of the image.", "direct_output")],
    )])
    .unwrap();
    let mut ctx = RunContext::new(&registry).unwrap();
    let mut adapter = ScriptedAdapter::returning("Score 3");

    let good_dir = temp_dataset_dir("good-dataset", &["a.png", "b.png"]);
    let missing = dataset("broken", PathBuf::from("/nonexistent/iqabench-dataset"));
    let good = dataset("good", good_dir.clone());

    let results = ctx.run_model(&mut adapter, &[&missing, &good]);

    assert_eq!(results.len(), 2);
    assert!(results[0].error.is_some());
    assert!(results[0].prompts.is_empty());

    assert!(results[1].error.is_none());
    assert_eq!(results[1].prompts.len(), 1);
    assert_eq!(results[1].prompts[0].scores.len(), 2);

    assert_eq!(ctx.counts.datasets_attempted, 2);
    assert_eq!(ctx.counts.datasets_failed, 1);

    let _ = fs::remove_dir_all(good_dir);
}

#[test]
fn softmax_prompt_without_signal_records_null_per_image() {
    let mut softmax_version = version("v1", "Rate the quality of the image.", "softmax_based");
    softmax_version.token_pair = Some(("good".to_string(), "poor".to_string()));

    let registry = PromptRegistry::from_entries(vec![entry("p1", vec![softmax_version])]).unwrap();
    let mut ctx = RunContext::new(&registry).unwrap();

    let mut adapter = ScriptedAdapter::returning("The quality is good.");

    let binding = registry.list_active();
    let (key, definition) = &binding[0];
    let results = ctx.run_prompt(
        &mut adapter,
        key,
        definition,
        &dataset("d1", PathBuf::from("/data/d1")),
        &["a.png".to_string(), "b.png".to_string()],
    );

    assert!(results.error.is_none());
    assert_eq!(results.scores.len(), 2);
    assert!(results.scores.iter().all(|entry| entry.score.is_none()));
}

#[test]
fn softmax_prompt_with_logits_forwards_the_adapter_score() {
    let mut softmax_version = version("v1", "Rate the quality of the image.", "softmax_based");
    softmax_version.token_pair = Some(("good".to_string(), "poor".to_string()));

    let registry = PromptRegistry::from_entries(vec![entry("p1", vec![softmax_version])]).unwrap();
    let mut ctx = RunContext::new(&registry).unwrap();

    let mut adapter = ScriptedAdapter::returning("irrelevant text");
    adapter.logits = Some(BTreeMap::from([
        ("good".to_string(), 3.0),
        ("poor".to_string(), 1.0),
    ]));

    let binding = registry.list_active();
    let (key, definition) = &binding[0];
    let results = ctx.run_prompt(
        &mut adapter,
        key,
        definition,
        &dataset("d1", PathBuf::from("/data/d1")),
        &["a.png".to_string()],
    );

    assert_eq!(results.scores[0].score, Some(0.75));
}

#[test]
fn ccot_without_json_records_null_not_a_crash() {
    let registry = PromptRegistry::from_entries(vec![entry(
        "p3",
        vec![version("v1", "Scene Graph:", "ccot_direct_guided")],
    )])
    .unwrap();
    let mut ctx = RunContext::new(&registry).unwrap();
    let mut adapter = ScriptedAdapter::returning("I cannot produce a scene graph for this image.");

    let binding = registry.list_active();
    let (key, definition) = &binding[0];
    let results = ctx.run_prompt(
        &mut adapter,
        key,
        definition,
        &dataset("d1", PathBuf::from("/data/d1")),
        &["a.png".to_string()],
    );

    assert!(results.error.is_none());
    assert_eq!(results.scores[0].score, None);
}

#[test]
fn list_samples_sorts_filters_and_truncates() {
    let dir = temp_dataset_dir(
        "listing",
        &["b.png", "a.jpg", "c.jpeg", "notes.txt", "d.PNG"],
    );

    let mut descriptor = dataset("d1", dir.clone());
    let all = list_samples(&descriptor).unwrap();
    assert_eq!(all, vec!["a.jpg", "b.png", "c.jpeg", "d.PNG"]);

    descriptor.sample_size = 2;
    let truncated = list_samples(&descriptor).unwrap();
    assert_eq!(truncated, vec!["a.jpg", "b.png"]);

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn csv_rows_cover_every_attempted_image_with_empty_cells_for_null() {
    let model_results = ModelResults {
        model_key: "model2".to_string(),
        model_name: "llava-v1.6-vicuna-7b".to_string(),
        error: None,
        datasets: vec![DatasetResults {
            dataset_key: "kadid10k".to_string(),
            error: None,
            prompts: vec![
                PromptResults {
                    prompt_key: "prompt1_v1".to_string(),
                    error: None,
                    scores: vec![
                        ImageScore {
                            image_id: "a.png".to_string(),
                            score: Some(4.0),
                        },
                        ImageScore {
                            image_id: "b.png".to_string(),
                            score: None,
                        },
                    ],
                },
                PromptResults {
                    prompt_key: "prompt2_v1".to_string(),
                    error: None,
                    scores: vec![
                        ImageScore {
                            image_id: "a.png".to_string(),
                            score: Some(87.0),
                        },
                        ImageScore {
                            image_id: "b.png".to_string(),
                            score: Some(63.0),
                        },
                    ],
                },
            ],
        }],
    };

    let dir = temp_dataset_dir("csv-sink", &[]);
    let mut counts = RunCounts::default();
    let csv_path = write_model_csv(&dir, &model_results, "20250101T000000Z", &mut counts).unwrap();

    let contents = fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();

    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(lines.len(), 5);
    assert_eq!(counts.csv_rows_written, 4);
    assert_eq!(
        lines[1],
        "llava-v1.6-vicuna-7b,kadid10k,prompt1_v1,a.png,4"
    );
    assert_eq!(lines[2], "llava-v1.6-vicuna-7b,kadid10k,prompt1_v1,b.png,");

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn unknown_model_filter_is_a_construction_time_failure() {
    let config: BenchConfig = serde_json::from_str("{}").unwrap();
    let err = select_models(&config, &["model9".to_string()]).unwrap_err();
    assert!(err.to_string().contains("model9"));
}
