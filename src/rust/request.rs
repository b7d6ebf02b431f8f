//! Asynchronous boundary between an interactive caller and the engine.
//!
//! `predict` is synchronous and may take a while on small devices, so UI
//! code should not call it on its rendering thread. [`PredictionRequest`]
//! runs it on tokio's blocking pool and exposes the progress as a closed
//! [`PredictionState`]:
//!
//! ```no_run
//! # async fn demo(engine: std::sync::Arc<verdict::ClassificationEngine>) {
//! use verdict::{PredictionRequest, PredictionState};
//!
//! let mut request = PredictionRequest::new();
//! request.submit(&engine, "I love this product!");
//! // render a spinner while `request.state()` is `Loading`
//! match request.settle().await {
//!     PredictionState::Success(result) => println!("{} {:.2}", result.label(), result.score()),
//!     PredictionState::Error(failure) => eprintln!("{}", failure.message),
//!     PredictionState::Idle | PredictionState::Loading => {}
//! }
//! # }
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::assets::AssetSource;
use crate::engine::{validate_text, ClassificationEngine, ClassificationResult, EngineError, ErrorKind};

/// Why a prediction request did not produce a result.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<EngineError> for PredictionFailure {
    fn from(err: EngineError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Where a single prediction request stands.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PredictionState {
    /// Nothing submitted yet, or the last request was cancelled
    #[default]
    Idle,
    /// A request is running
    Loading,
    Success(ClassificationResult),
    Error(PredictionFailure),
}

impl PredictionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn result(&self) -> Option<&ClassificationResult> {
        match self {
            Self::Success(result) => Some(result),
            _ => None,
        }
    }
}

impl From<Result<ClassificationResult, EngineError>> for PredictionState {
    fn from(outcome: Result<ClassificationResult, EngineError>) -> Self {
        match outcome {
            Ok(result) => Self::Success(result),
            Err(e) => Self::Error(e.into()),
        }
    }
}

/// Tracks the latest prediction a caller asked for.
///
/// Submitting again supersedes (and aborts) the request in flight, so the
/// state always reflects the most recent input.
#[derive(Debug, Default)]
pub struct PredictionRequest {
    state: PredictionState,
    pending: Option<JoinHandle<Result<ClassificationResult, EngineError>>>,
}

impl PredictionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PredictionState {
        &self.state
    }

    /// Starts classifying `text` in the background.
    ///
    /// Blank text is rejected locally, without reaching the engine. Must be
    /// called from within a tokio runtime.
    pub fn submit(&mut self, engine: &Arc<ClassificationEngine>, text: &str) {
        self.abort_pending();
        if let Err(e) = validate_text(text) {
            self.state = PredictionState::Error(e.into());
            return;
        }

        let engine = Arc::clone(engine);
        let text = text.to_string();
        self.pending = Some(tokio::task::spawn_blocking(move || engine.predict(&text)));
        self.state = PredictionState::Loading;
    }

    /// Waits for the request in flight, if any, and returns the final state.
    pub async fn settle(&mut self) -> &PredictionState {
        if let Some(handle) = self.pending.take() {
            self.state = match handle.await {
                Ok(outcome) => outcome.into(),
                Err(e) if e.is_cancelled() => PredictionState::Idle,
                Err(e) => PredictionState::Error(PredictionFailure {
                    kind: ErrorKind::Inference,
                    message: format!("Prediction task failed: {}", e),
                }),
            };
        }
        &self.state
    }

    /// Drops the request in flight and returns to `Idle`.
    pub fn cancel(&mut self) {
        self.abort_pending();
        self.state = PredictionState::Idle;
    }

    fn abort_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for PredictionRequest {
    fn drop(&mut self) {
        self.abort_pending();
    }
}

/// Runs [`ClassificationEngine::initialize`] on tokio's blocking pool.
///
/// Predictions submitted meanwhile fail with `NotReady` until it completes.
pub fn initialize_in_background<A>(
    engine: Arc<ClassificationEngine>,
    assets: A,
) -> JoinHandle<Result<(), EngineError>>
where
    A: AssetSource + 'static,
{
    tokio::task::spawn_blocking(move || engine.initialize(&assets))
}
