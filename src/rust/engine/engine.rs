use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use log::{debug, error, info, warn};
use ndarray::Array1;

use super::backend::{InferenceModel, ModelBackend, OnnxBackend};
use super::encoding::TextEncoder;
use super::error::EngineError;
use super::utils::{argmax, is_probability_vector, softmax};
use crate::assets::{sha256_hex, AssetSource};
use crate::manifest::{ModelManifest, OutputKind, DEFAULT_MANIFEST_NAME};

/// Lifecycle state of a [`ClassificationEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// No load has been attempted yet
    Uninitialized,
    /// A model is loaded and predictions are served
    Ready,
    /// The last load attempt failed; `initialize` may be called again
    Failed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Score of a single class within a result.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// The outcome of classifying one piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    label: String,
    score: f32,
    class_index: usize,
    scores: Vec<LabelScore>,
    truncated: bool,
}

impl ClassificationResult {
    /// The winning label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Normalized score of the winning label, in `[0, 1]`
    pub fn score(&self) -> f32 {
        self.score
    }

    /// Position of the winning label in the model's label list
    pub fn class_index(&self) -> usize {
        self.class_index
    }

    /// Scores of every label, in the model's label order
    pub fn scores(&self) -> &[LabelScore] {
        &self.scores
    }

    /// Whether the input was cut to the model's sequence length
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

/// Information about the loaded model
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInfo {
    pub labels: Vec<String>,
    pub max_sequence_length: usize,
    pub backend: String,
    pub model_asset: String,
    pub model_sha256: String,
    pub source: String,
}

struct LoadedModel {
    manifest: ModelManifest,
    encoder: TextEncoder,
    model: Box<dyn InferenceModel>,
    info: EngineInfo,
}

impl LoadedModel {
    fn classify(&self, text: &str) -> Result<ClassificationResult, EngineError> {
        let encoded = self.encoder.encode(text)?;
        if encoded.truncated {
            debug!("Input truncated to {} tokens", encoded.token_count);
        }
        let raw = self.model.run(&encoded)?;
        self.decode(raw, encoded.truncated)
    }

    /// Arg-max decoding of one raw output vector.
    fn decode(&self, raw: Vec<f32>, truncated: bool) -> Result<ClassificationResult, EngineError> {
        let labels = &self.manifest.labels;
        if raw.len() != labels.len() {
            return Err(EngineError::Inference(format!(
                "Model returned {} scores for {} labels",
                raw.len(),
                labels.len()
            )));
        }
        if raw.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::Inference("Model returned non-finite scores".into()));
        }

        let values = Array1::from(raw);
        let probabilities = match self.manifest.output_kind {
            OutputKind::Logits => softmax(&values),
            OutputKind::Probabilities if is_probability_vector(&values) => values,
            OutputKind::Probabilities => {
                return Err(EngineError::Inference("Model returned scores outside [0, 1]".into()));
            }
        };

        let class_index = argmax(&probabilities)
            .ok_or_else(|| EngineError::Inference("Model returned no scores".into()))?;
        let scores = labels
            .iter()
            .zip(probabilities.iter())
            .map(|(label, &score)| LabelScore {
                label: label.clone(),
                score: score.clamp(0.0, 1.0),
            })
            .collect::<Vec<_>>();

        Ok(ClassificationResult {
            label: labels[class_index].clone(),
            score: scores[class_index].score,
            class_index,
            scores,
            truncated,
        })
    }
}

enum Slot {
    Uninitialized,
    Ready(Arc<LoadedModel>),
    Failed(EngineError),
}

/// A thread-safe text classification engine owning one loaded model.
///
/// Construct it once at the application's composition root and share it with
/// `Arc`. `initialize` loads the model; `predict` serves requests from any
/// thread once the engine is ready.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use verdict::{AssetDir, ClassificationEngine};
///
/// let engine = ClassificationEngine::new();
/// engine.initialize(&AssetDir::new("assets/sentiment"))?;
///
/// let result = engine.predict("I love this product!")?;
/// println!("{} ({:.2})", result.label(), result.score());
/// # Ok(())
/// # }
/// ```
pub struct ClassificationEngine {
    manifest_name: String,
    backend: Arc<dyn ModelBackend>,
    slot: RwLock<Slot>,
    init_lock: Mutex<()>,
    // Bumped after every completed load attempt.
    attempts: AtomicU64,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<ClassificationEngine>();
    }
};

impl fmt::Debug for ClassificationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassificationEngine")
            .field("manifest_name", &self.manifest_name)
            .field("backend", &self.backend.name())
            .field("state", &self.state())
            .finish()
    }
}

impl Default for ClassificationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassificationEngine {
    /// An uninitialized engine using ONNX Runtime and `manifest.json`
    pub fn new() -> Self {
        Self::from_parts(DEFAULT_MANIFEST_NAME.to_string(), Arc::new(OnnxBackend::default()))
    }

    /// Creates a new EngineBuilder for fluent construction
    pub fn builder() -> super::builder::EngineBuilder {
        super::builder::EngineBuilder::new()
    }

    pub(crate) fn from_parts(manifest_name: String, backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            manifest_name,
            backend,
            slot: RwLock::new(Slot::Uninitialized),
            init_lock: Mutex::new(()),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> EngineState {
        match &*self.read_slot() {
            Slot::Uninitialized => EngineState::Uninitialized,
            Slot::Ready(_) => EngineState::Ready,
            Slot::Failed(_) => EngineState::Failed,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    /// The error that moved the engine to `Failed`, if it is failed
    pub fn failure(&self) -> Option<EngineError> {
        match &*self.read_slot() {
            Slot::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }

    /// Returns information about the loaded model, if any
    pub fn info(&self) -> Option<EngineInfo> {
        self.loaded().ok().map(|loaded| loaded.info.clone())
    }

    pub fn labels(&self) -> Option<Vec<String>> {
        self.loaded().ok().map(|loaded| loaded.manifest.labels.clone())
    }

    /// Loads the packaged model from `assets`.
    ///
    /// - A no-op when the engine is already `Ready`.
    /// - Concurrent callers are serialized: one load runs, the others wait
    ///   for it and return its outcome.
    /// - On a `Failed` engine this makes a fresh attempt.
    ///
    /// # Errors
    /// - `ModelLoad` if an asset is missing, corrupt, or rejected by the
    ///   backend; the engine moves to `Failed`
    pub fn initialize(&self, assets: &dyn AssetSource) -> Result<(), EngineError> {
        if self.is_ready() {
            debug!("Engine already initialized");
            return Ok(());
        }

        let observed = self.attempts.load(Ordering::Acquire);
        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.attempts.load(Ordering::Acquire) != observed {
            debug!("Another caller completed initialization while waiting");
            return self.last_outcome();
        }
        if self.is_ready() {
            return Ok(());
        }

        info!("Initializing engine from {}", assets.describe());
        let outcome = match self.load(assets) {
            Ok(loaded) => {
                info!(
                    "Engine ready: {} labels, max {} tokens, backend '{}'",
                    loaded.info.labels.len(),
                    loaded.info.max_sequence_length,
                    loaded.info.backend
                );
                *self.write_slot() = Slot::Ready(Arc::new(loaded));
                Ok(())
            }
            Err(e) => {
                error!("Engine initialization failed: {}", e);
                *self.write_slot() = Slot::Failed(e.clone());
                Err(e)
            }
        };
        self.attempts.fetch_add(1, Ordering::Release);
        outcome
    }

    /// Classifies `text`.
    ///
    /// # Errors
    /// - `InvalidInput` if the text is empty or whitespace only
    /// - `NotReady` if the engine is `Uninitialized` or `Failed`
    /// - `Inference` if encoding, execution, or decoding fails for this request
    pub fn predict(&self, text: &str) -> Result<ClassificationResult, EngineError> {
        validate_text(text)?;
        let loaded = self.loaded()?;
        loaded.classify(text)
    }

    /// Counts the tokens `text` encodes to, before truncation.
    pub fn count_tokens(&self, text: &str) -> Result<usize, EngineError> {
        self.loaded()?.encoder.count_tokens(text)
    }

    fn loaded(&self) -> Result<Arc<LoadedModel>, EngineError> {
        match &*self.read_slot() {
            Slot::Ready(loaded) => Ok(Arc::clone(loaded)),
            Slot::Uninitialized => Err(EngineError::NotReady(EngineState::Uninitialized)),
            Slot::Failed(_) => Err(EngineError::NotReady(EngineState::Failed)),
        }
    }

    fn last_outcome(&self) -> Result<(), EngineError> {
        match &*self.read_slot() {
            Slot::Ready(_) => Ok(()),
            Slot::Failed(e) => Err(e.clone()),
            Slot::Uninitialized => Err(EngineError::ModelLoad("Initialization did not complete".into())),
        }
    }

    fn load(&self, assets: &dyn AssetSource) -> Result<LoadedModel, EngineError> {
        let manifest_bytes = read_asset(assets, &self.manifest_name)?;
        let manifest = ModelManifest::from_slice(&manifest_bytes)?;
        info!(
            "Manifest '{}' loaded: model '{}', {} labels",
            self.manifest_name,
            manifest.model,
            manifest.num_classes()
        );

        let tokenizer_bytes = read_asset(assets, &manifest.tokenizer)?;
        let encoder = TextEncoder::from_bytes(&tokenizer_bytes, &manifest)?;
        info!("Tokenizer loaded successfully");

        let model_bytes = read_asset(assets, &manifest.model)?;
        let digest = sha256_hex(&model_bytes);
        match &manifest.sha256 {
            Some(expected) if !digest.eq_ignore_ascii_case(expected) => {
                return Err(EngineError::ModelLoad(format!(
                    "Hash mismatch for model asset '{}': expected {}, got {}",
                    manifest.model, expected, digest
                )));
            }
            Some(_) => info!("Model digest verified"),
            None => warn!("Manifest has no sha256 for '{}'; skipping verification", manifest.model),
        }

        let model = self
            .backend
            .load(&model_bytes, &manifest)
            .map_err(EngineError::into_load_error)?;

        let info = EngineInfo {
            labels: manifest.labels.clone(),
            max_sequence_length: manifest.max_sequence_length,
            backend: self.backend.name().to_string(),
            model_asset: manifest.model.clone(),
            model_sha256: digest,
            source: assets.describe(),
        };
        Ok(LoadedModel {
            manifest,
            encoder,
            model,
            info,
        })
    }

    fn read_slot(&self) -> std::sync::RwLockReadGuard<'_, Slot> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slot(&self) -> std::sync::RwLockWriteGuard<'_, Slot> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Rejects text that is empty after trimming whitespace.
pub fn validate_text(text: &str) -> Result<(), EngineError> {
    if text.trim().is_empty() {
        return Err(EngineError::InvalidInput("Input text cannot be blank".into()));
    }
    Ok(())
}

fn read_asset(assets: &dyn AssetSource, name: &str) -> Result<Vec<u8>, EngineError> {
    assets.open(name).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => {
            EngineError::ModelLoad(format!("Asset '{}' not found in {}", name, assets.describe()))
        }
        _ => EngineError::ModelLoad(format!("Failed to read asset '{}': {}", name, e)),
    })
}
