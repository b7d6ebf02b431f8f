use std::fmt;

use super::engine::EngineState;

/// Represents the different types of errors that can occur in the classification engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// A model asset is missing, corrupt, or incompatible with the runtime.
    /// Raised only from `initialize`; the engine moves to `Failed`.
    #[error("Model load error: {0}")]
    ModelLoad(String),
    /// The input text is blank. The engine state is unchanged.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// `predict` was called before a successful `initialize`.
    #[error("Engine not ready (state: {0})")]
    NotReady(EngineState),
    /// The model failed while executing a single request.
    #[error("Inference error: {0}")]
    Inference(String),
    /// The engine was configured with invalid parameters.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// The kind of an [`EngineError`], without its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ModelLoad,
    InvalidInput,
    NotReady,
    Inference,
    Config,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ModelLoad(_) => ErrorKind::ModelLoad,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotReady(_) => ErrorKind::NotReady,
            Self::Inference(_) => ErrorKind::Inference,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Re-labels any error raised while loading as a `ModelLoad` error.
    pub(crate) fn into_load_error(self) -> Self {
        match self {
            Self::ModelLoad(_) => self,
            other => Self::ModelLoad(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ModelLoad => "model load",
            Self::InvalidInput => "invalid input",
            Self::NotReady => "not ready",
            Self::Inference => "inference",
            Self::Config => "configuration",
        };
        f.write_str(name)
    }
}
