#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use verdict::{
    ClassificationEngine, EncodedInput, EngineError, InferenceModel, MemoryAssets, ModelBackend,
    ModelManifest,
};

pub const LABELS: [&str; 2] = ["negative", "positive"];
pub const MAX_SEQUENCE_LENGTH: usize = 16;

pub const TOKENIZER_JSON: &str = r#"{
    "version": "1.0",
    "truncation": null,
    "padding": null,
    "added_tokens": [],
    "normalizer": null,
    "pre_tokenizer": { "type": "Whitespace" },
    "post_processor": null,
    "decoder": null,
    "model": {
        "type": "WordLevel",
        "vocab": {
            "[PAD]": 0, "[UNK]": 1,
            "i": 2, "this": 3, "product": 4, "movie": 5, "!": 6,
            "love": 7, "great": 8, "excellent": 9, "good": 10,
            "hate": 11, "terrible": 12, "awful": 13, "bad": 14
        },
        "unk_token": "[UNK]"
    }
}"#;

/// Per-token class weights, keyed by token id.
pub const LEXICON_JSON: &str = r#"{
    "bias": [0.0, 0.0],
    "weights": {
        "7": [0.0, 2.0], "8": [0.0, 1.5], "9": [0.0, 2.5], "10": [0.0, 1.0],
        "11": [2.0, 0.0], "12": [2.5, 0.0], "13": [2.5, 0.0], "14": [1.0, 0.0]
    }
}"#;

/// Same vocabulary as [`TOKENIZER_JSON`], wrapped in `[CLS] ... [SEP]`.
pub const BERT_TOKENIZER_JSON: &str = r#"{
    "version": "1.0",
    "truncation": null,
    "padding": null,
    "added_tokens": [],
    "normalizer": null,
    "pre_tokenizer": { "type": "Whitespace" },
    "post_processor": { "type": "BertProcessing", "sep": ["[SEP]", 16], "cls": ["[CLS]", 15] },
    "decoder": null,
    "model": {
        "type": "WordLevel",
        "vocab": {
            "[PAD]": 0, "[UNK]": 1,
            "i": 2, "this": 3, "product": 4, "movie": 5, "!": 6,
            "love": 7, "great": 8, "excellent": 9, "good": 10,
            "hate": 11, "terrible": 12, "awful": 13, "bad": 14,
            "[CLS]": 15, "[SEP]": 16
        },
        "unk_token": "[UNK]"
    }
}"#;

pub const CLS_ID: i64 = 15;
pub const SEP_ID: i64 = 16;

pub fn manifest_json(sha256: Option<&str>) -> String {
    let digest = sha256
        .map(|d| format!(r#", "sha256": "{}""#, d))
        .unwrap_or_default();
    format!(
        r#"{{
            "model": "lexicon.json",
            "tokenizer": "tokenizer.json",
            "labels": ["negative", "positive"],
            "max_sequence_length": {},
            "lowercase": true,
            "add_special_tokens": false{}
        }}"#,
        MAX_SEQUENCE_LENGTH, digest
    )
}

pub fn fixture_assets() -> MemoryAssets {
    MemoryAssets::new()
        .with_asset("manifest.json", manifest_json(None).into_bytes())
        .with_asset("tokenizer.json", TOKENIZER_JSON.as_bytes())
        .with_asset("lexicon.json", LEXICON_JSON.as_bytes())
}

/// Fixture assets relying on the manifest defaults, special tokens included.
pub fn special_token_assets() -> MemoryAssets {
    let manifest = format!(
        r#"{{
            "model": "lexicon.json",
            "tokenizer": "tokenizer.json",
            "labels": ["negative", "positive"],
            "max_sequence_length": {},
            "lowercase": true
        }}"#,
        MAX_SEQUENCE_LENGTH
    );
    MemoryAssets::new()
        .with_asset("manifest.json", manifest.into_bytes())
        .with_asset("tokenizer.json", BERT_TOKENIZER_JSON.as_bytes())
        .with_asset("lexicon.json", LEXICON_JSON.as_bytes())
}

#[derive(Deserialize)]
struct Lexicon {
    bias: Vec<f32>,
    weights: HashMap<String, Vec<f32>>,
}

/// Linear bag-of-tokens model: logits = bias + sum of the weights of each real token.
struct LexiconModel {
    bias: Vec<f32>,
    weights: HashMap<i64, Vec<f32>>,
    last_input: Arc<Mutex<Option<EncodedInput>>>,
}

impl InferenceModel for LexiconModel {
    fn run(&self, input: &EncodedInput) -> Result<Vec<f32>, EngineError> {
        assert_eq!(input.sequence_length(), MAX_SEQUENCE_LENGTH);
        *self.last_input.lock().unwrap() = Some(input.clone());
        let mut logits = self.bias.clone();
        for id in input.tokens() {
            if let Some(weights) = self.weights.get(id) {
                for (logit, weight) in logits.iter_mut().zip(weights) {
                    *logit += weight;
                }
            }
        }
        Ok(logits)
    }
}

/// Test side of a gated load: observe that `load` has started, then let it finish.
pub struct LoadGate {
    started: Receiver<()>,
    release: Sender<()>,
}

impl LoadGate {
    /// Blocks until the backend is inside `load`.
    pub fn wait_until_loading(&self) {
        self.started
            .recv_timeout(GATE_TIMEOUT)
            .expect("backend load should start");
    }

    /// Lets the pending `load` run to completion.
    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

struct BackendGate {
    started: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

// Upper bound on how long a gated load waits, so an unexpected second load fails fast.
const GATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Test backend loading [`LEXICON_JSON`]-style models, counting load attempts.
#[derive(Default)]
pub struct LexiconBackend {
    loads: AtomicUsize,
    gate: Option<BackendGate>,
    last_input: Arc<Mutex<Option<EncodedInput>>>,
}

impl LexiconBackend {
    /// A backend whose `load` blocks until the returned gate is released.
    pub fn gated() -> (Self, LoadGate) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let backend = Self {
            gate: Some(BackendGate {
                started: Mutex::new(started_tx),
                release: Mutex::new(release_rx),
            }),
            ..Self::default()
        };
        let gate = LoadGate {
            started: started_rx,
            release: release_tx,
        };
        (backend, gate)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// The input most recently fed to a model this backend loaded.
    pub fn last_input(&self) -> Option<EncodedInput> {
        self.last_input.lock().unwrap().clone()
    }
}

impl ModelBackend for LexiconBackend {
    fn name(&self) -> &str {
        "lexicon"
    }

    fn load(&self, model_bytes: &[u8], manifest: &ModelManifest) -> Result<Box<dyn InferenceModel>, EngineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _ = gate.started.lock().unwrap().send(());
            let _ = gate.release.lock().unwrap().recv_timeout(GATE_TIMEOUT);
        }

        let lexicon: Lexicon = serde_json::from_slice(model_bytes)
            .map_err(|e| EngineError::ModelLoad(format!("Malformed lexicon: {}", e)))?;
        if lexicon.bias.len() != manifest.num_classes() {
            return Err(EngineError::ModelLoad(format!(
                "Lexicon has {} classes, manifest has {}",
                lexicon.bias.len(),
                manifest.num_classes()
            )));
        }
        let weights = lexicon
            .weights
            .into_iter()
            .map(|(id, w)| {
                id.parse::<i64>()
                    .map(|id| (id, w))
                    .map_err(|_| EngineError::ModelLoad(format!("Invalid token id '{}'", id)))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(Box::new(LexiconModel {
            bias: lexicon.bias,
            weights,
            last_input: Arc::clone(&self.last_input),
        }))
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn fixture_engine(backend: Arc<LexiconBackend>) -> ClassificationEngine {
    ClassificationEngine::builder()
        .with_backend(backend)
        .build()
        .expect("fixture engine should build")
}

pub fn ready_engine() -> ClassificationEngine {
    init_logger();
    let engine = fixture_engine(Arc::new(LexiconBackend::default()));
    engine
        .initialize(&fixture_assets())
        .expect("fixture assets should load");
    engine
}
