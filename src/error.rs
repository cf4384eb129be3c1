use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("prompt '{prompt_id}' version '{version_id}' not found in the prompt catalog")]
    PromptNotFound {
        prompt_id: String,
        version_id: String,
    },

    #[error("model '{0}' not found in the model catalog")]
    ModelNotFound(String),

    #[error("dataset '{0}' not found in the dataset catalog")]
    DatasetNotFound(String),
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("inference invocation failed: {0}")]
    Invocation(String),

    #[error("image not readable: {0}")]
    ImageUnreadable(PathBuf),

    #[error("no recorded response for image '{0}' in replay fixture")]
    MissingFixture(String),

    #[error("adapter exposes no auxiliary signal: {0}")]
    SignalUnavailable(String),
}
