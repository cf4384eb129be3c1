use anyhow::{Context, Result, bail};
use regex::Regex;

use crate::config::{PromptEntryConfig, PromptVersionConfig};
use crate::error::RegistryError;

#[derive(Debug, Clone)]
pub enum ExtractionMethod {
    DirectOutput,
    DirectOutputWithRegex {
        regex_pattern: String,
        description_pattern: Option<String>,
    },
    SoftmaxBased {
        token_pair: (String, String),
    },
    CcotDirectGuided,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionKind {
    DirectOutput,
    DirectOutputWithRegex,
    SoftmaxBased,
    CcotDirectGuided,
}

impl ExtractionMethod {
    pub fn kind(&self) -> ExtractionKind {
        match self {
            Self::DirectOutput => ExtractionKind::DirectOutput,
            Self::DirectOutputWithRegex { .. } => ExtractionKind::DirectOutputWithRegex,
            Self::SoftmaxBased { .. } => ExtractionKind::SoftmaxBased,
            Self::CcotDirectGuided => ExtractionKind::CcotDirectGuided,
        }
    }
}

impl ExtractionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectOutput => "direct_output",
            Self::DirectOutputWithRegex => "direct_output_with_regex",
            Self::SoftmaxBased => "softmax_based",
            Self::CcotDirectGuided => "ccot_direct_guided",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptDefinition {
    pub prompt_id: String,
    pub version_id: String,
    pub text: String,
    pub method: ExtractionMethod,
    pub active: bool,
    pub requires_json: bool,
    pub input_type: Option<String>,
    pub output_type: Option<String>,
    pub score_regex: Option<Regex>,
    pub description_regex: Option<Regex>,
}

impl PromptDefinition {
    pub fn instance_key(&self) -> String {
        format!("{}_{}", self.prompt_id, self.version_id)
    }
}

#[derive(Debug, Clone)]
pub struct ChainSpec {
    pub order: Vec<String>,
}

#[derive(Debug)]
struct RegistryEntry {
    prompt_id: String,
    chain: Option<ChainSpec>,
    versions: Vec<PromptDefinition>,
}

#[derive(Debug)]
pub struct PromptRegistry {
    entries: Vec<RegistryEntry>,
}

impl PromptRegistry {
    pub fn from_entries(entries: Vec<PromptEntryConfig>) -> Result<Self> {
        let mut resolved = Vec::with_capacity(entries.len());

        for entry in entries {
            let mut versions = Vec::with_capacity(entry.versions.len());
            for version in &entry.versions {
                versions.push(resolve_version(&entry.id, version)?);
            }

            if versions.is_empty() {
                bail!("prompt '{}' declares no versions", entry.id);
            }

            let is_chain =
                entry.prompt_type.as_deref() == Some("chain") || !entry.chain_order.is_empty();
            let chain = if is_chain {
                if entry.chain_order.is_empty() {
                    bail!("chain prompt '{}' declares an empty chain_order", entry.id);
                }
                for step in &entry.chain_order {
                    if !versions.iter().any(|v| &v.version_id == step) {
                        bail!(
                            "chain prompt '{}' references unknown version '{}' in chain_order",
                            entry.id,
                            step
                        );
                    }
                }
                Some(ChainSpec {
                    order: entry.chain_order.clone(),
                })
            } else {
                None
            };

            resolved.push(RegistryEntry {
                prompt_id: entry.id.clone(),
                chain,
                versions,
            });
        }

        Ok(Self { entries: resolved })
    }

    pub fn list_active(&self) -> Vec<(String, &PromptDefinition)> {
        self.entries
            .iter()
            .flat_map(|entry| entry.versions.iter())
            .filter(|definition| definition.active)
            .map(|definition| (definition.instance_key(), definition))
            .collect()
    }

    pub fn get(
        &self,
        prompt_id: &str,
        version_id: &str,
    ) -> Result<&PromptDefinition, RegistryError> {
        self.entries
            .iter()
            .find(|entry| entry.prompt_id == prompt_id)
            .and_then(|entry| {
                entry
                    .versions
                    .iter()
                    .find(|definition| definition.version_id == version_id)
            })
            .ok_or_else(|| RegistryError::PromptNotFound {
                prompt_id: prompt_id.to_string(),
                version_id: version_id.to_string(),
            })
    }

    pub fn filter_by_extraction_method(
        &self,
        kind: ExtractionKind,
    ) -> Vec<(String, &PromptDefinition)> {
        self.list_active()
            .into_iter()
            .filter(|(_, definition)| definition.method.kind() == kind)
            .collect()
    }

    pub fn chain(&self, prompt_id: &str) -> Option<&ChainSpec> {
        self.entries
            .iter()
            .find(|entry| entry.prompt_id == prompt_id)
            .and_then(|entry| entry.chain.as_ref())
    }
}

fn resolve_version(prompt_id: &str, version: &PromptVersionConfig) -> Result<PromptDefinition> {
    let method = match version.extraction_method.as_str() {
        "direct_output" => match &version.regex_pattern {
            Some(pattern) => ExtractionMethod::DirectOutputWithRegex {
                regex_pattern: pattern.clone(),
                description_pattern: version.description_pattern.clone(),
            },
            None => ExtractionMethod::DirectOutput,
        },
        "direct_output_with_regex" => {
            let pattern = version.regex_pattern.clone().with_context(|| {
                format!(
                    "prompt '{}' version '{}' uses regex extraction without a regex_pattern",
                    prompt_id, version.version
                )
            })?;
            ExtractionMethod::DirectOutputWithRegex {
                regex_pattern: pattern,
                description_pattern: version.description_pattern.clone(),
            }
        }
        "softmax_based" => {
            let token_pair = version.token_pair.clone().with_context(|| {
                format!(
                    "prompt '{}' version '{}' uses softmax extraction without a token_pair",
                    prompt_id, version.version
                )
            })?;
            ExtractionMethod::SoftmaxBased { token_pair }
        }
        "ccot_direct_guided" => ExtractionMethod::CcotDirectGuided,
        other => bail!(
            "prompt '{}' version '{}' declares unknown extraction method '{}'",
            prompt_id,
            version.version,
            other
        ),
    };

    let score_regex = match &method {
        ExtractionMethod::DirectOutputWithRegex { regex_pattern, .. } => {
            Some(Regex::new(regex_pattern).with_context(|| {
                format!(
                    "prompt '{}' version '{}' has an invalid regex_pattern",
                    prompt_id, version.version
                )
            })?)
        }
        _ => None,
    };
    let description_regex = match &method {
        ExtractionMethod::DirectOutputWithRegex {
            description_pattern: Some(pattern),
            ..
        } => Some(Regex::new(pattern).with_context(|| {
            format!(
                "prompt '{}' version '{}' has an invalid description_pattern",
                prompt_id, version.version
            )
        })?),
        _ => None,
    };

    Ok(PromptDefinition {
        prompt_id: prompt_id.to_string(),
        version_id: version.version.clone(),
        text: version.text.clone(),
        method,
        active: version.active,
        requires_json: version.requires_json,
        input_type: version.input_type.clone(),
        output_type: version.output_type.clone(),
        score_regex,
        description_regex,
    })
}
