//! Classification → enrichment → display orchestration.

use std::{sync::Arc, time::Duration};

use image::RgbImage;
use tokio::sync::mpsc;

use crate::{
    engine::ClassifierEngine,
    enrichment::{Enricher, EnrichmentRecord},
    error::{ClassifierError, EnrichmentError, SourceError},
    model::{ClassificationResult, ClassifierModel},
    source::{ImageSourceAdapter, SourceKind},
    thumbnail::ThumbnailLoader,
};

pub const PLACEHOLDER_SUMMARY: &str = "Sorry, no information could be found for this flower.";

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Summary shown when enrichment fails.
    pub placeholder_summary: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            placeholder_summary: PLACEHOLDER_SUMMARY.to_string(),
        }
    }
}

/// How a run ended up on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Complete,
    ClassificationFailed,
    EnrichmentFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    AwaitingClassification,
    AwaitingEnrichment,
    Displaying(Outcome),
}

/// Everything the view renders.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub title: Option<String>,
    pub summary: String,
    pub thumbnail_url: Option<String>,
    pub busy: bool,
}

/// A completion delivered back to the controller's owning task.
#[derive(Debug)]
pub enum PipelineEvent {
    Classified {
        id: u64,
        /// Time spent in the model.
        duration: Duration,
        result: Result<ClassificationResult, ClassifierError>,
    },
    Enriched {
        id: u64,
        result: Result<EnrichmentRecord, EnrichmentError>,
    },
}

impl PipelineEvent {
    pub fn id(&self) -> u64 {
        match self {
            PipelineEvent::Classified { id, .. } | PipelineEvent::Enriched { id, .. } => *id,
        }
    }
}

/// Drives a picked image through classification and enrichment.
///
/// The controller is owned by a single task. Inference happens on the engine's
/// worker thread and enrichment on a spawned Tokio task; their completions come
/// back through [`next_event`](Self::next_event) and are applied by
/// [`handle_event`](Self::handle_event). Every run carries a sequence id, and a
/// completion whose id is not the latest is dropped, so a slow earlier pick can
/// never overwrite a newer one.
///
/// Dropping the controller joins the classifier worker, blocking the current
/// thread until every queued image has been classified. Inside a Tokio task,
/// drop it from `spawn_blocking` (or let the queue drain with
/// [`settle`](Self::settle) first) to keep the executor thread free.
pub struct PipelineController<E, L> {
    engine: ClassifierEngine,
    enricher: Arc<E>,
    loader: L,
    config: PipelineConfig,
    enrich_tx: mpsc::UnboundedSender<(u64, Result<EnrichmentRecord, EnrichmentError>)>,
    enrich_rx: mpsc::UnboundedReceiver<(u64, Result<EnrichmentRecord, EnrichmentError>)>,
    sequence: u64,
    state: PipelineState,
    display: DisplayState,
}

impl<E: Enricher, L: ThumbnailLoader> PipelineController<E, L> {
    /// Builds a controller around an already-loaded model.
    ///
    /// Model loading is the model's constructor's job, so a missing asset fails
    /// before this is reached.
    pub fn new<M>(model: M, enricher: E, loader: L, config: PipelineConfig) -> Self
    where
        M: ClassifierModel + Send + 'static,
    {
        let (enrich_tx, enrich_rx) = mpsc::unbounded_channel();
        Self {
            engine: ClassifierEngine::new(model),
            enricher: Arc::new(enricher),
            loader,
            config,
            enrich_tx,
            enrich_rx,
            sequence: 0,
            state: PipelineState::Idle,
            display: DisplayState::default(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Sequence id of the most recent pick.
    pub fn current_id(&self) -> u64 {
        self.sequence
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Starts a new run for the image, superseding any run still in flight.
    pub fn submit(&mut self, image: RgbImage) -> u64 {
        self.sequence += 1;
        let id = self.sequence;

        self.state = PipelineState::AwaitingClassification;
        self.display.busy = true;
        self.display.summary.clear();
        self.display.thumbnail_url = None;

        log::debug!("Submitting image #{id} ({}x{})", image.width(), image.height());
        self.engine.schedule(id, image);
        id
    }

    /// Picks an image from the source and submits it.
    ///
    /// An unavailable source or a cancelled pick leaves the display untouched and
    /// returns `Ok(None)`.
    pub fn pick_and_submit<S>(
        &mut self,
        source: &mut S,
        kind: SourceKind,
    ) -> Result<Option<u64>, SourceError>
    where
        S: ImageSourceAdapter + ?Sized,
    {
        if !source.is_available(kind) {
            log::warn!("{}", SourceError::Unavailable(kind));
            return Ok(None);
        }
        match source.pick(kind)? {
            Some(image) => Ok(Some(self.submit(image))),
            None => {
                log::debug!("Pick from {kind} cancelled");
                Ok(None)
            }
        }
    }

    /// Waits for the next completion from either stage.
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        tokio::select! {
            Some(response) = self.engine.recv_response() => Some(PipelineEvent::Classified {
                id: response.id,
                duration: response.duration,
                result: response.result,
            }),
            Some((id, result)) = self.enrich_rx.recv() => {
                Some(PipelineEvent::Enriched { id, result })
            }
            else => None,
        }
    }

    /// Applies a completion to the display, unless it belongs to a superseded run.
    pub fn handle_event(&mut self, event: PipelineEvent) {
        if event.id() != self.sequence {
            log::debug!(
                "Discarding stale completion #{} (current #{})",
                event.id(),
                self.sequence
            );
            return;
        }

        match event {
            PipelineEvent::Classified {
                id,
                duration,
                result,
            } => self.on_classified(id, duration, result),
            PipelineEvent::Enriched { id, result } => self.on_enriched(id, result),
        }
    }

    /// Processes completions until the latest run is on screen.
    pub async fn settle(&mut self) {
        while matches!(
            self.state,
            PipelineState::AwaitingClassification | PipelineState::AwaitingEnrichment
        ) {
            match self.next_event().await {
                Some(event) => self.handle_event(event),
                None => {
                    log::error!("Pipeline channels closed while awaiting run #{}", self.sequence);
                    break;
                }
            }
        }
    }

    fn on_classified(
        &mut self,
        id: u64,
        duration: Duration,
        result: Result<ClassificationResult, ClassifierError>,
    ) {
        if self.state != PipelineState::AwaitingClassification {
            log::warn!("Unexpected classification for run #{id} in state {:?}", self.state);
            return;
        }

        let top = match &result {
            Ok(ranked) => ranked.top(),
            Err(e) => {
                log::warn!("Classification #{id} failed after {duration:?}: {e}");
                None
            }
        };
        let Some(top) = top else {
            if result.is_ok() {
                log::warn!("Classification #{id} returned no labels");
            }
            self.display.title = None;
            self.display.summary.clear();
            self.display.busy = false;
            self.state = PipelineState::Displaying(Outcome::ClassificationFailed);
            return;
        };

        log::info!(
            "Image #{id} classified as {:?} ({:.1}%) in {:?}",
            top.label,
            top.confidence * 100.0,
            duration
        );
        self.display.title = Some(title_case(&top.label));
        self.state = PipelineState::AwaitingEnrichment;

        let label = top.label.clone();
        let enricher = self.enricher.clone();
        let tx = self.enrich_tx.clone();
        tokio::spawn(async move {
            let result = enricher.fetch_summary(&label).await;
            let _ = tx.send((id, result));
        });
    }

    fn on_enriched(&mut self, id: u64, result: Result<EnrichmentRecord, EnrichmentError>) {
        if self.state != PipelineState::AwaitingEnrichment {
            log::warn!("Unexpected enrichment for run #{id} in state {:?}", self.state);
            return;
        }

        match result {
            Ok(record) => {
                if let Some(url) = &record.thumbnail_url {
                    self.loader.load(url);
                }
                self.display.summary = record.summary_text;
                self.display.thumbnail_url = record.thumbnail_url;
                self.state = PipelineState::Displaying(Outcome::Complete);
            }
            Err(e) => {
                log::warn!("Enrichment #{id} failed: {e}");
                self.display.summary = self.config.placeholder_summary.clone();
                self.display.thumbnail_url = None;
                self.state = PipelineState::Displaying(Outcome::EnrichmentFailed);
            }
        }
        self.display.busy = false;
    }
}

/// Capitalizes the first letter of every whitespace-separated word, leaving the
/// rest of each word and the separators untouched.
pub fn title_case(label: &str) -> String {
    let mut title = String::with_capacity(label.len());
    let mut at_word_start = true;
    for c in label.chars() {
        if at_word_start && !c.is_whitespace() {
            title.extend(c.to_uppercase());
        } else {
            title.push(c);
        }
        at_word_start = c.is_whitespace();
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_case_capitalizes_each_word() {
        assert_eq!(title_case("pink primrose"), "Pink Primrose");
        assert_eq!(title_case("bird of paradise"), "Bird Of Paradise");
    }

    #[test]
    fn title_case_leaves_the_rest_unchanged() {
        assert_eq!(title_case("sweet pEA"), "Sweet PEA");
        assert_eq!(title_case("  globe-flower\tthistle"), "  Globe-flower\tThistle");
        assert_eq!(title_case(""), "");
        assert_eq!(title_case("ßtrange"), "SStrange");
    }

    #[test]
    fn event_ids() {
        let event = PipelineEvent::Enriched {
            id: 3,
            result: Err(EnrichmentError::NotFound {
                label: "rose".to_string(),
            }),
        };
        assert_eq!(event.id(), 3);
    }
}
