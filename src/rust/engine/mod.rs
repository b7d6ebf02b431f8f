mod backend;
pub mod builder;
mod encoding;
#[allow(clippy::module_inception)]
mod engine;
mod error;
mod utils;

pub use backend::{InferenceModel, ModelBackend, OnnxBackend, OnnxModel};
pub use builder::EngineBuilder;
pub use encoding::EncodedInput;
pub use engine::{
    validate_text, ClassificationEngine, ClassificationResult, EngineInfo, EngineState, LabelScore,
};
pub use error::{EngineError, ErrorKind};
