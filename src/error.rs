use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CloudError>;

/// Everything that can stop a word cloud from being produced.
#[derive(Debug, Error)]
pub enum CloudError {
    /// A model, mask or font asset is missing or cannot be decoded.
    #[error("resource unavailable: {resource}: {reason}")]
    ResourceUnavailable { resource: String, reason: String },

    /// Not enough text to draw anything meaningful. Callers usually retry
    /// with a different keyword or a larger batch.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("pipeline cancelled before stage '{0}'")]
    Cancelled(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl CloudError {
    pub fn unavailable(resource: impl Into<String>, reason: impl ToString) -> Self {
        CloudError::ResourceUnavailable {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// Informational failures are shown to the user; everything else aborts.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, CloudError::InsufficientData(_) | CloudError::Cancelled(_))
    }
}
