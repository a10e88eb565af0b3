//! Bundled flower model: a linear probe over per-channel colour histograms.

use std::path::Path;

use image::RgbImage;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    error::ClassifierError,
    model::{Classification, ClassificationResult, ClassifierModel},
};

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("image has no pixels")]
    EmptyImage,
}

/// On-disk layout of the model asset.
#[derive(Debug, Deserialize)]
struct ProbeAsset {
    name: String,
    bins: u32,
    labels: Vec<String>,
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

/// Pretrained colour-histogram classifier loaded from a JSON asset.
#[derive(Debug)]
pub struct ColorHistogramModel {
    name: String,
    bins: usize,
    labels: Vec<String>,
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

impl ColorHistogramModel {
    /// Loads and validates the model asset at `path`.
    ///
    /// Any problem with the asset is a [`ClassifierError::ModelLoad`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|e| ClassifierError::model_load(path, e))?;
        let asset: ProbeAsset =
            serde_json::from_slice(&raw).map_err(|e| ClassifierError::model_load(path, e))?;
        let model =
            Self::from_asset(asset).map_err(|reason| ClassifierError::model_load(path, reason))?;
        log::debug!(
            "Loaded model {} with {} labels from {}",
            model.name,
            model.labels.len(),
            path.display()
        );
        Ok(model)
    }

    /// Parses a model asset already held in memory.
    pub fn from_json(json: &str) -> Result<Self, ClassifierError> {
        let asset: ProbeAsset =
            serde_json::from_str(json).map_err(|e| ClassifierError::model_load("<memory>", e))?;
        Self::from_asset(asset).map_err(|reason| ClassifierError::model_load("<memory>", reason))
    }

    fn from_asset(asset: ProbeAsset) -> Result<Self, String> {
        let bins = asset.bins as usize;
        if bins == 0 {
            return Err("bins must be positive".to_string());
        }
        if asset.labels.is_empty() {
            return Err("model has no labels".to_string());
        }
        if asset.weights.len() != asset.labels.len() {
            return Err(format!(
                "expected {} weight rows, found {}",
                asset.labels.len(),
                asset.weights.len()
            ));
        }
        if asset.bias.len() != asset.labels.len() {
            return Err(format!(
                "expected {} bias terms, found {}",
                asset.labels.len(),
                asset.bias.len()
            ));
        }
        let features = 3 * bins;
        if let Some((row, weights)) = asset
            .weights
            .iter()
            .enumerate()
            .find(|(_, w)| w.len() != features)
        {
            return Err(format!(
                "weight row {row} has {} columns, expected {features}",
                weights.len()
            ));
        }

        Ok(Self {
            name: asset.name,
            bins,
            labels: asset.labels,
            weights: asset.weights,
            bias: asset.bias,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Normalized R, G and B histograms, concatenated.
    fn features(&self, image: &RgbImage) -> Result<Vec<f32>, ProbeError> {
        let pixels = (image.width() as usize) * (image.height() as usize);
        if pixels == 0 {
            return Err(ProbeError::EmptyImage);
        }

        let mut histogram = vec![0u32; 3 * self.bins];
        for pixel in image.pixels() {
            for (channel, value) in pixel.0.iter().enumerate() {
                let bin = (*value as usize * self.bins) / 256;
                histogram[channel * self.bins + bin] += 1;
            }
        }

        Ok(histogram
            .into_iter()
            .map(|count| count as f32 / pixels as f32)
            .collect())
    }
}

impl ClassifierModel for ColorHistogramModel {
    type Error = ProbeError;

    fn classify(&mut self, image: &RgbImage) -> Result<ClassificationResult, Self::Error> {
        let features = self.features(image)?;

        let logits: Vec<f32> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, bias)| row.iter().zip(&features).map(|(w, f)| w * f).sum::<f32>() + bias)
            .collect();

        let scores = softmax(&logits);
        Ok(ClassificationResult::ranked(
            self.labels
                .iter()
                .zip(scores)
                .map(|(label, confidence)| Classification::new(label.clone(), confidence))
                .collect(),
        ))
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
