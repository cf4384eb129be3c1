use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::config::{AdapterSpec, ModelDescriptor};
use crate::error::AdapterError;

#[derive(Debug, Clone)]
pub enum AuxSignal {
    None,
    TokenLogits(BTreeMap<String, f64>),
}

#[derive(Debug, Clone)]
pub struct RawPrediction {
    pub text: String,
    pub signal: AuxSignal,
}

pub trait ModelAdapter {
    fn generate(&mut self, prompt: &str, image_path: &Path)
    -> Result<RawPrediction, AdapterError>;

    fn score_from_signal(
        &self,
        signal: &AuxSignal,
        token_pair: (&str, &str),
    ) -> Result<f64, AdapterError>;
}

pub fn build_adapter(descriptor: &ModelDescriptor) -> Result<Box<dyn ModelAdapter>> {
    match &descriptor.adapter {
        AdapterSpec::Command { program, args } => Ok(Box::new(CommandAdapter {
            program: program.clone(),
            args: args.clone(),
            model_path: descriptor.model_path.clone(),
        })),
        AdapterSpec::Replay { path } => {
            let adapter = ReplayAdapter::load(path).with_context(|| {
                format!(
                    "failed to load replay fixture for model '{}'",
                    descriptor.key
                )
            })?;
            Ok(Box::new(adapter))
        }
    }
}

pub struct CommandAdapter {
    program: String,
    args: Vec<String>,
    model_path: String,
}

impl CommandAdapter {
    fn render_args(&self, prompt: &str, image_path: &Path) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{prompt}", prompt)
                    .replace("{image}", &image_path.display().to_string())
                    .replace("{model_path}", &self.model_path)
            })
            .collect()
    }
}

impl ModelAdapter for CommandAdapter {
    fn generate(
        &mut self,
        prompt: &str,
        image_path: &Path,
    ) -> Result<RawPrediction, AdapterError> {
        if !image_path.exists() {
            return Err(AdapterError::ImageUnreadable(image_path.to_path_buf()));
        }

        let args = self.render_args(prompt, image_path);
        debug!(program = %self.program, image = %image_path.display(), "invoking inference command");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|err| AdapterError::Invocation(format!("{}: {err}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdapterError::Invocation(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(RawPrediction {
            text: String::from_utf8_lossy(&output.stdout).into_owned(),
            signal: AuxSignal::None,
        })
    }

    fn score_from_signal(
        &self,
        _signal: &AuxSignal,
        _token_pair: (&str, &str),
    ) -> Result<f64, AdapterError> {
        Err(AdapterError::SignalUnavailable(
            "command adapter is text-only".to_string(),
        ))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ReplayEntry {
    #[serde(default)]
    text: String,

    #[serde(default)]
    token_logits: Option<BTreeMap<String, f64>>,
}

pub struct ReplayAdapter {
    entries: BTreeMap<String, ReplayEntry>,
}

impl ReplayAdapter {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path)
            .with_context(|| format!("failed to read replay fixture: {}", path.display()))?;
        let entries: BTreeMap<String, ReplayEntry> = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse replay fixture: {}", path.display()))?;
        Ok(Self { entries })
    }
}

impl ModelAdapter for ReplayAdapter {
    fn generate(
        &mut self,
        _prompt: &str,
        image_path: &Path,
    ) -> Result<RawPrediction, AdapterError> {
        let image_id = image_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let entry = self
            .entries
            .get(&image_id)
            .ok_or_else(|| AdapterError::MissingFixture(image_id.clone()))?;

        let signal = match &entry.token_logits {
            Some(logits) => AuxSignal::TokenLogits(logits.clone()),
            None => AuxSignal::None,
        };

        Ok(RawPrediction {
            text: entry.text.clone(),
            signal,
        })
    }

    fn score_from_signal(
        &self,
        signal: &AuxSignal,
        token_pair: (&str, &str),
    ) -> Result<f64, AdapterError> {
        let AuxSignal::TokenLogits(logits) = signal else {
            return Err(AdapterError::SignalUnavailable(
                "replay entry carries no token logits".to_string(),
            ));
        };

        let (favorable, unfavorable) = token_pair;
        let favorable_logit = *logits.get(favorable).ok_or_else(|| {
            AdapterError::SignalUnavailable(format!("token '{favorable}' missing from logits"))
        })?;
        let unfavorable_logit = *logits.get(unfavorable).ok_or_else(|| {
            AdapterError::SignalUnavailable(format!("token '{unfavorable}' missing from logits"))
        })?;

        Ok(pairwise_softmax(favorable_logit, unfavorable_logit))
    }
}

fn pairwise_softmax(favorable: f64, unfavorable: f64) -> f64 {
    let favorable = favorable / 100.0;
    let unfavorable = unfavorable / 100.0;
    let max = favorable.max(unfavorable);
    let favorable = (favorable - max).exp();
    let unfavorable = (unfavorable - max).exp();
    favorable / (favorable + unfavorable)
}
