use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    panic::{self, AssertUnwindSafe},
    thread::JoinHandle,
    time::{Duration, Instant},
};

use image::RgbImage;
use tokio::sync::mpsc as async_mpsc;

use crate::{
    error::ClassifierError,
    model::{ClassificationResult, ClassifierModel},
};

/// Represents the current state of the classifier engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Waiting for the next image.
    Idle,
    /// Running inference on an image.
    Processing,
}

/// Internal request wrapper used by the engine to track classification requests.
struct ClassifyRequest {
    id: u64,
    image: RgbImage,
}

/// Completion of one classification request, with timing data.
#[derive(Debug)]
pub struct ClassifierEngineResponse {
    /// Identifier supplied with the request.
    pub id: u64,
    /// Total time taken for inference.
    pub duration: Duration,
    /// Ranked labels, or the inference error.
    pub result: Result<ClassificationResult, ClassifierError>,
}

/// Result type returned when polling for classification results.
#[derive(Debug)]
pub enum ClassifierEngineResult {
    /// A request completed (successfully or not).
    Success(ClassifierEngineResponse),
    /// No result available yet, with current engine state.
    Empty(EngineState),
    /// The worker thread is gone.
    Error(String),
}

/// Runs a [`ClassifierModel`] on a dedicated worker thread.
///
/// Requests are queued and processed in order. Each completion is delivered on a
/// channel the owner drains with [`recv_response`](Self::recv_response) or
/// [`try_poll_response`](Self::try_poll_response), so the owning task never
/// blocks on inference. A failed inference is reported for that request only;
/// the worker keeps serving.
pub struct ClassifierEngine {
    processing: Arc<AtomicBool>,
    req_tx: Option<mpsc::Sender<ClassifyRequest>>,
    rep_rx: async_mpsc::UnboundedReceiver<ClassifierEngineResponse>,
    inference_handle: Option<JoinHandle<()>>,
}

impl ClassifierEngine {
    /// Creates a new engine, moving the model onto a background thread.
    pub fn new<M>(mut model: M) -> Self
    where
        M: ClassifierModel + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<ClassifyRequest>();
        let (rep_tx, rep_rx) = async_mpsc::unbounded_channel::<ClassifierEngineResponse>();
        let processing = Arc::new(AtomicBool::new(false));

        let inference_handle = std::thread::spawn({
            let processing = processing.clone();
            move || {
                while let Ok(req) = req_rx.recv() {
                    log::debug!("Classifying image #{}", req.id);

                    processing.store(true, Ordering::SeqCst);
                    let start_time = Instant::now();

                    // a panicking model binding must still answer, or the owner waits forever
                    let result = match panic::catch_unwind(AssertUnwindSafe(|| {
                        model.classify(&req.image)
                    })) {
                        Ok(result) => result.map_err(|e| ClassifierError::Inference(Box::new(e))),
                        Err(payload) => {
                            log::error!("Classifier panicked on image #{}", req.id);
                            Err(ClassifierError::Inference(
                                format!("model panicked: {}", panic_message(payload.as_ref()))
                                    .into(),
                            ))
                        }
                    };

                    let duration = start_time.elapsed();
                    log::debug!("Classification #{} completed in {:?}", req.id, duration);

                    processing.store(false, Ordering::SeqCst);

                    if rep_tx
                        .send(ClassifierEngineResponse {
                            id: req.id,
                            duration,
                            result,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
            }
        });

        Self {
            processing,
            req_tx: Some(req_tx),
            rep_rx,
            inference_handle: Some(inference_handle),
        }
    }

    /// Returns the current state of the engine.
    pub fn state(&self) -> EngineState {
        if self.processing.load(Ordering::SeqCst) {
            EngineState::Processing
        } else {
            EngineState::Idle
        }
    }

    /// Queues an image for classification under the given identifier.
    pub fn schedule(&self, id: u64, image: RgbImage) {
        if let Some(tx) = &self.req_tx {
            if tx.send(ClassifyRequest { id, image }).is_err() {
                log::error!("Classifier worker is gone, dropping image #{id}");
            }
        }
    }

    /// Waits for the next completed request.
    ///
    /// Returns `None` once the worker has shut down and every response is drained.
    pub async fn recv_response(&mut self) -> Option<ClassifierEngineResponse> {
        self.rep_rx.recv().await
    }

    /// Attempts to retrieve a completed request without blocking.
    pub fn try_poll_response(&mut self) -> ClassifierEngineResult {
        match self.rep_rx.try_recv() {
            Ok(response) => ClassifierEngineResult::Success(response),
            Err(async_mpsc::error::TryRecvError::Empty) => {
                ClassifierEngineResult::Empty(self.state())
            }
            Err(async_mpsc::error::TryRecvError::Disconnected) => {
                log::error!("Classifier response channel disconnected");
                ClassifierEngineResult::Error(
                    "Classifier response channel disconnected".to_string(),
                )
            }
        }
    }

    /// Stops the engine, letting queued requests finish before the worker exits.
    pub fn stop(&mut self) {
        self.req_tx.take();
        if let Some(handle) = self.inference_handle.take() {
            let _ = handle.join();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause")
}

/// Joins the worker, so dropping blocks until queued requests have run.
impl Drop for ClassifierEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Classification;
    use std::fmt;

    #[derive(Debug)]
    struct Blank;

    impl fmt::Display for Blank {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("blank image")
        }
    }

    impl std::error::Error for Blank {}

    /// Labels an image by its width; zero-width images fail.
    struct WidthModel;

    impl ClassifierModel for WidthModel {
        type Error = Blank;

        fn classify(&mut self, image: &RgbImage) -> Result<ClassificationResult, Self::Error> {
            if image.width() == 0 {
                return Err(Blank);
            }
            Ok(ClassificationResult::ranked(vec![Classification::new(
                format!("w{}", image.width()),
                1.0,
            )]))
        }
    }

    #[tokio::test]
    async fn responses_keep_request_ids_and_order() {
        let mut engine = ClassifierEngine::new(WidthModel);
        engine.schedule(7, RgbImage::new(3, 1));
        engine.schedule(8, RgbImage::new(5, 1));

        let first = engine.recv_response().await.unwrap();
        let second = engine.recv_response().await.unwrap();

        assert_eq!(first.id, 7);
        assert_eq!(first.result.unwrap().top().unwrap().label, "w3");
        assert_eq!(second.id, 8);
        assert_eq!(second.result.unwrap().top().unwrap().label, "w5");
    }

    #[tokio::test]
    async fn inference_error_does_not_stop_the_worker() {
        let mut engine = ClassifierEngine::new(WidthModel);
        engine.schedule(1, RgbImage::new(0, 0));
        engine.schedule(2, RgbImage::new(4, 4));

        let failed = engine.recv_response().await.unwrap();
        assert!(matches!(failed.result, Err(ClassifierError::Inference(_))));

        let ok = engine.recv_response().await.unwrap();
        assert_eq!(ok.id, 2);
        assert!(ok.result.is_ok());
    }

    /// Panics on square images.
    struct FragileModel;

    impl ClassifierModel for FragileModel {
        type Error = Blank;

        fn classify(&mut self, image: &RgbImage) -> Result<ClassificationResult, Self::Error> {
            assert_ne!(image.width(), image.height(), "square input");
            Ok(ClassificationResult::default())
        }
    }

    #[tokio::test]
    async fn panicking_model_reports_an_inference_error() {
        let mut engine = ClassifierEngine::new(FragileModel);
        engine.schedule(1, RgbImage::new(2, 2));
        engine.schedule(2, RgbImage::new(3, 1));

        let crashed = engine.recv_response().await.unwrap();
        assert_eq!(crashed.id, 1);
        match crashed.result {
            Err(ClassifierError::Inference(e)) => assert!(e.to_string().contains("square input")),
            other => panic!("expected an inference error, got {other:?}"),
        }

        let next = engine.recv_response().await.unwrap();
        assert_eq!(next.id, 2);
        assert!(next.result.is_ok());
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn poll_reports_empty_then_disconnected_after_stop() {
        let mut engine = ClassifierEngine::new(WidthModel);
        assert!(matches!(
            engine.try_poll_response(),
            ClassifierEngineResult::Empty(EngineState::Idle)
        ));

        engine.schedule(1, RgbImage::new(2, 2));
        engine.stop();

        assert!(matches!(
            engine.try_poll_response(),
            ClassifierEngineResult::Success(ClassifierEngineResponse { id: 1, .. })
        ));
        assert!(matches!(
            engine.try_poll_response(),
            ClassifierEngineResult::Error(_)
        ));
    }
}
