use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::catalog;

#[derive(Debug, Clone, Deserialize)]
pub struct BenchConfig {
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,

    #[serde(default)]
    pub datasets: Vec<DatasetDescriptor>,

    #[serde(default)]
    pub prompts: Option<Vec<PromptEntryConfig>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub key: String,
    pub model_name: String,
    pub size: String,

    #[serde(default)]
    pub visual_encoder: Option<String>,

    #[serde(default)]
    pub text_encoder: Option<String>,

    pub model_path: String,

    pub adapter: AdapterSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdapterSpec {
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },

    Replay { path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub key: String,
    pub path: PathBuf,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptEntryConfig {
    pub id: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default, rename = "type")]
    pub prompt_type: Option<String>,

    #[serde(default)]
    pub chain_order: Vec<String>,

    pub versions: Vec<PromptVersionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptVersionConfig {
    pub version: String,
    pub text: String,
    pub extraction_method: String,

    #[serde(default)]
    pub regex_pattern: Option<String>,

    #[serde(default)]
    pub description_pattern: Option<String>,

    #[serde(default)]
    pub token_pair: Option<(String, String)>,

    #[serde(default)]
    pub requires_json: bool,

    #[serde(default)]
    pub input_type: Option<String>,

    #[serde(default)]
    pub output_type: Option<String>,

    #[serde(default)]
    pub active: bool,
}

impl BenchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let config: BenchConfig = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    pub fn prompt_entries(&self) -> Vec<PromptEntryConfig> {
        match &self.prompts {
            Some(entries) => entries.clone(),
            None => catalog::builtin_prompts(),
        }
    }

    pub fn model(&self, key: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.key == key)
    }

    pub fn dataset(&self, key: &str) -> Option<&DatasetDescriptor> {
        self.datasets.iter().find(|d| d.key == key)
    }
}
