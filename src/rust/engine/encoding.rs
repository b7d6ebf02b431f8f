use tokenizers::{Encoding, PostProcessor, Tokenizer, TruncationDirection};

use super::error::EngineError;
use crate::manifest::ModelManifest;

/// A fixed-length model input produced from one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedInput {
    /// Token ids, exactly `max_sequence_length` long
    pub input_ids: Vec<i64>,
    /// 1 for real tokens, 0 for padding
    pub attention_mask: Vec<i64>,
    /// Number of real (non-padding) tokens
    pub token_count: usize,
    /// Whether tokens were dropped to fit the sequence length
    pub truncated: bool,
}

impl EncodedInput {
    pub fn sequence_length(&self) -> usize {
        self.input_ids.len()
    }

    /// Real token ids, without padding
    pub fn tokens(&self) -> &[i64] {
        &self.input_ids[..self.token_count]
    }
}

/// Turns raw text into model input with a fixed, reproducible policy.
///
/// 1. Trim surrounding whitespace; lower-case when the manifest asks for it
/// 2. Tokenize without the padding or truncation configured in `tokenizer.json`
/// 3. Keep the first N content tokens, where N leaves room for the special
///    tokens the post-processor adds; special tokens are always preserved
/// 4. Right-pad with `pad_token_id` up to `max_sequence_length`
#[derive(Debug)]
pub(crate) struct TextEncoder {
    tokenizer: Tokenizer,
    max_sequence_length: usize,
    pad_token_id: u32,
    lowercase: bool,
    add_special_tokens: bool,
    // Content tokens that fit next to the special tokens.
    content_budget: usize,
}

impl TextEncoder {
    pub(crate) fn new(mut tokenizer: Tokenizer, manifest: &ModelManifest) -> Result<Self, EngineError> {
        tokenizer.with_padding(None);
        // Clearing truncation never fails.
        let _ = tokenizer.with_truncation(None);

        let special_tokens = if manifest.add_special_tokens {
            tokenizer.get_post_processor().map_or(0, |p| p.added_tokens(false))
        } else {
            0
        };
        if special_tokens >= manifest.max_sequence_length {
            return Err(EngineError::ModelLoad(format!(
                "max_sequence_length {} leaves no room for content next to {} special tokens",
                manifest.max_sequence_length, special_tokens
            )));
        }

        Ok(Self {
            tokenizer,
            max_sequence_length: manifest.max_sequence_length,
            pad_token_id: manifest.pad_token_id,
            lowercase: manifest.lowercase,
            add_special_tokens: manifest.add_special_tokens,
            content_budget: manifest.max_sequence_length - special_tokens,
        })
    }

    /// Loads a serialized tokenizer (`tokenizer.json`) from raw bytes.
    pub(crate) fn from_bytes(bytes: &[u8], manifest: &ModelManifest) -> Result<Self, EngineError> {
        let tokenizer = Tokenizer::from_bytes(bytes)
            .map_err(|e| EngineError::ModelLoad(format!("Failed to load tokenizer: {}", e)))?;
        Self::new(tokenizer, manifest)
    }

    fn normalize<'a>(&self, text: &'a str) -> std::borrow::Cow<'a, str> {
        let trimmed = text.trim();
        if self.lowercase {
            trimmed.to_lowercase().into()
        } else {
            trimmed.into()
        }
    }

    fn tokenize(&self, text: &str, add_special_tokens: bool) -> Result<Encoding, EngineError> {
        let normalized = self.normalize(text);
        self.tokenizer
            .encode(normalized.as_ref(), add_special_tokens)
            .map_err(|e| EngineError::Inference(format!("Failed to tokenize input: {}", e)))
    }

    /// Counts the tokens of `text`, special tokens included, without truncating it.
    ///
    /// Useful for checking whether an input will be cut off.
    pub(crate) fn count_tokens(&self, text: &str) -> Result<usize, EngineError> {
        self.tokenize(text, self.add_special_tokens).map(|encoding| encoding.len())
    }

    /// Encodes text into a fixed-length input.
    ///
    /// # Errors
    /// - `Inference` if the tokenizer fails or produces no tokens
    pub(crate) fn encode(&self, text: &str) -> Result<EncodedInput, EngineError> {
        let mut content = self.tokenize(text, false)?;
        if content.is_empty() {
            return Err(EngineError::Inference("Input produced no tokens".into()));
        }

        let truncated = content.len() > self.content_budget;
        content.truncate(self.content_budget, 0, TruncationDirection::Right);
        let encoding = self
            .tokenizer
            .post_process(content, None, self.add_special_tokens)
            .map_err(|e| EngineError::Inference(format!("Failed to add special tokens: {}", e)))?;

        let token_count = encoding.len();
        let mut input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
        input_ids.resize(self.max_sequence_length, i64::from(self.pad_token_id));

        let mut attention_mask = vec![1i64; token_count];
        attention_mask.resize(self.max_sequence_length, 0);

        Ok(EncodedInput {
            input_ids,
            attention_mask,
            token_count,
            truncated,
        })
    }
}
