use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageScore {
    pub image_id: String,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResults {
    pub prompt_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub scores: Vec<ImageScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetResults {
    pub dataset_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub prompts: Vec<PromptResults>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResults {
    pub model_key: String,
    pub model_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub datasets: Vec<DatasetResults>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunCounts {
    pub models_total: usize,
    pub models_failed: usize,
    pub datasets_attempted: usize,
    pub datasets_failed: usize,
    pub prompts_attempted: usize,
    pub prompts_failed: usize,
    pub images_attempted: usize,
    pub images_scored: usize,
    pub images_failed: usize,
    pub csv_rows_written: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPaths {
    pub config_path: String,
    pub results_dir: String,
    pub manifest_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub config_sha256: String,
    pub active_prompts: Vec<String>,
    pub paths: RunPaths,
    pub counts: RunCounts,
    pub csv_files: Vec<String>,
    pub warnings: Vec<String>,
    pub results: Vec<ModelResults>,
}
