//! Flower recognition pipeline.
//!
//! A picked photo is classified by an on-device model running on a background
//! worker, the best label is looked up in an online encyclopedia, and the
//! resulting title, summary and thumbnail are published as a [`DisplayState`].
//! [`PipelineController`] owns the whole sequence and drops completions from
//! superseded picks.

mod engine;
mod enrichment;
mod error;
mod model;
mod pipeline;
mod probe;
mod source;
mod thumbnail;

pub use engine::{ClassifierEngine, ClassifierEngineResponse, ClassifierEngineResult, EngineState};
pub use enrichment::{
    DEFAULT_ENDPOINT, DEFAULT_THUMBNAIL_SIZE, Enricher, EnrichmentClient, EnrichmentConfig,
    EnrichmentRecord, parse_summary,
};
pub use error::{ClassifierError, EnrichmentError, SourceError};
pub use model::{Classification, ClassificationResult, ClassifierModel};
pub use pipeline::{
    DisplayState, Outcome, PLACEHOLDER_SUMMARY, PipelineConfig, PipelineController,
    PipelineEvent, PipelineState, title_case,
};
pub use probe::{ColorHistogramModel, ProbeError};
pub use source::{FileImageSource, ImageSourceAdapter, SourceKind};
pub use thumbnail::{HttpThumbnailLoader, ThumbnailLoader};
