use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

/// Asset name the engine looks up when no other manifest name is configured.
pub const DEFAULT_MANIFEST_NAME: &str = "manifest.json";

const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 128;
const MAX_SUPPORTED_SEQUENCE_LENGTH: usize = 8192;

/// How the model's output vector should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Raw class scores; softmax is applied before decoding.
    #[default]
    Logits,
    /// Already-normalized class probabilities in [0, 1].
    Probabilities,
}

/// Names of the graph inputs fed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputNames {
    pub input_ids: String,
    pub attention_mask: Option<String>,
    pub token_type_ids: Option<String>,
}

impl Default for InputNames {
    fn default() -> Self {
        Self {
            input_ids: "input_ids".to_string(),
            attention_mask: Some("attention_mask".to_string()),
            token_type_ids: None,
        }
    }
}

/// The input/output contract of a bundled classification model.
///
/// A manifest is a small JSON document packaged next to the model:
///
/// ```json
/// {
///   "model": "sentiment.onnx",
///   "tokenizer": "tokenizer.json",
///   "labels": ["negative", "positive"],
///   "max_sequence_length": 128,
///   "lowercase": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    /// Asset name of the model graph
    pub model: String,
    /// Asset name of the serialized tokenizer
    pub tokenizer: String,
    /// Class labels, in the order of the model's output vector
    pub labels: Vec<String>,
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,
    #[serde(default)]
    pub pad_token_id: u32,
    #[serde(default)]
    pub lowercase: bool,
    #[serde(default = "default_true")]
    pub add_special_tokens: bool,
    #[serde(default)]
    pub inputs: InputNames,
    /// Output tensor name; the graph's first output when absent
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub output_kind: OutputKind,
    /// Lowercase hex SHA-256 of the model asset
    #[serde(default)]
    pub sha256: Option<String>,
}

fn default_max_sequence_length() -> usize {
    DEFAULT_MAX_SEQUENCE_LENGTH
}

fn default_true() -> bool {
    true
}

impl ModelManifest {
    /// Parses and validates a manifest from raw JSON bytes.
    ///
    /// # Errors
    /// - `ModelLoad` if the JSON is malformed or any field fails validation
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EngineError> {
        let manifest: Self = serde_json::from_slice(bytes)
            .map_err(|e| EngineError::ModelLoad(format!("Malformed manifest: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Checks the manifest rules:
    /// - model and tokenizer asset names must not be empty
    /// - at least one label, none blank, no duplicates
    /// - sequence length in `1..=8192`
    /// - input tensor names must not be empty
    /// - the digest, when present, must be 64 hex characters
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.model.trim().is_empty() {
            return Err(EngineError::ModelLoad("Manifest model asset name cannot be empty".into()));
        }
        if self.tokenizer.trim().is_empty() {
            return Err(EngineError::ModelLoad("Manifest tokenizer asset name cannot be empty".into()));
        }
        if self.labels.is_empty() {
            return Err(EngineError::ModelLoad("Manifest must declare at least one label".into()));
        }
        if let Some(pos) = self.labels.iter().position(|l| l.trim().is_empty()) {
            return Err(EngineError::ModelLoad(format!("Label {} cannot be empty", pos + 1)));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.labels.iter().find(|l| !seen.insert(l.as_str())) {
            return Err(EngineError::ModelLoad(format!("Duplicate label '{}'", dup)));
        }
        if self.max_sequence_length == 0 || self.max_sequence_length > MAX_SUPPORTED_SEQUENCE_LENGTH {
            return Err(EngineError::ModelLoad(format!(
                "max_sequence_length must be between 1 and {}, got {}",
                MAX_SUPPORTED_SEQUENCE_LENGTH, self.max_sequence_length
            )));
        }
        let names = std::iter::once(Some(&self.inputs.input_ids))
            .chain([self.inputs.attention_mask.as_ref(), self.inputs.token_type_ids.as_ref()]);
        if names.flatten().any(|n| n.is_empty()) {
            return Err(EngineError::ModelLoad("Input tensor names cannot be empty".into()));
        }
        if let Some(digest) = &self.sha256 {
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(EngineError::ModelLoad(format!("Invalid sha256 digest '{}'", digest)));
            }
        }
        Ok(())
    }

    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }
}
