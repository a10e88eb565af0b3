use std::path::PathBuf;

use thiserror::Error;

use crate::source::SourceKind;

/// Errors raised by the classifier and its bundled model.
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// The bundled model asset is missing or corrupt. Fatal: raised at construction.
    #[error("failed to load model from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    /// A single inference call failed. The engine keeps serving later requests.
    #[error("inference failed: {0}")]
    Inference(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ClassifierError {
    pub(crate) fn model_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ClassifierError::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised while fetching a summary from the encyclopedia.
#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("encyclopedia request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("no encyclopedia entry found for {label:?}")]
    NotFound { label: String },

    #[error("encyclopedia response is not valid JSON: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

/// Errors raised by an image source when picking a photo.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Sorry, {0} source type is not available.")]
    Unavailable(SourceKind),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode picked image: {0}")]
    Decode(#[from] image::ImageError),
}
