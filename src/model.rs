use image::RgbImage;

/// A single (label, confidence) pair produced by a classifier.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Ranked output of one classification, highest confidence first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassificationResult {
    entries: Vec<Classification>,
}

impl ClassificationResult {
    /// Builds a result from unordered entries, sorting them by descending confidence.
    pub fn ranked(mut entries: Vec<Classification>) -> Self {
        entries.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Self { entries }
    }

    /// Wraps entries as supplied, trusting the caller's ordering.
    pub fn from_entries(entries: Vec<Classification>) -> Self {
        Self { entries }
    }

    /// The highest-confidence entry.
    ///
    /// Scans the whole list rather than taking the first element, so a model that
    /// hands back an unsorted list still yields its best guess. Ties keep the
    /// earliest entry.
    pub fn top(&self) -> Option<&Classification> {
        self.entries.iter().reduce(|best, candidate| {
            if candidate.confidence > best.confidence {
                candidate
            } else {
                best
            }
        })
    }

    pub fn entries(&self) -> &[Classification] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Trait for implementing image classifiers that can be used with the
/// [`ClassifierEngine`](crate::ClassifierEngine).
///
/// Implementations wrap a pretrained model. Loading the model belongs in the
/// implementation's constructor so a missing asset fails before the engine starts.
pub trait ClassifierModel {
    /// The error type that can be returned during inference.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Classifies the image and returns every known label with its confidence.
    fn classify(&mut self, image: &RgbImage) -> Result<ClassificationResult, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranked_sorts_descending() {
        let result = ClassificationResult::ranked(vec![
            Classification::new("daisy", 0.1),
            Classification::new("rose", 0.7),
            Classification::new("tulip", 0.2),
        ]);
        let labels: Vec<_> = result.entries().iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["rose", "tulip", "daisy"]);
    }

    #[test]
    fn top_ignores_supplied_order() {
        let result = ClassificationResult::from_entries(vec![
            Classification::new("daisy", 0.1),
            Classification::new("sunflower", 0.6),
            Classification::new("tulip", 0.3),
        ]);
        assert_eq!(result.top().map(|c| c.label.as_str()), Some("sunflower"));
    }

    #[test]
    fn top_of_empty_is_none() {
        assert!(ClassificationResult::default().top().is_none());
    }

    #[test]
    fn low_confidence_top_is_still_returned() {
        let result = ClassificationResult::from_entries(vec![
            Classification::new("iris", 0.26),
            Classification::new("lily", 0.25),
            Classification::new("lotus", 0.25),
            Classification::new("orchid", 0.24),
        ]);
        assert_eq!(result.top().map(|c| c.label.as_str()), Some("iris"));
    }
}
