//! A thread-safe, on-device text classification engine.
//!
//! The engine loads a bundled model (an ONNX graph, a tokenizer, and a JSON
//! manifest describing its labels and input contract) from packaged assets,
//! then serves synchronous `predict` calls from any number of threads.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use verdict::{AssetDir, ClassificationEngine};
//!
//! let engine = ClassificationEngine::new();
//! engine.initialize(&AssetDir::new("assets/sentiment"))?;
//!
//! let result = engine.predict("I love this product!")?;
//! println!("Predicted class: {} ({:.1}%)", result.label(), result.score() * 100.0);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! The engine is shared across threads using `Arc`. Initialization may run on
//! a background thread while other threads already hold the engine:
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use verdict::{AssetDir, ClassificationEngine};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let engine = Arc::new(ClassificationEngine::new());
//! engine.initialize(&AssetDir::default_location())?;
//!
//! let mut handles = vec![];
//! for text in ["great", "terrible", "fine"] {
//!     let engine = Arc::clone(&engine);
//!     handles.push(thread::spawn(move || engine.predict(text)));
//! }
//!
//! for handle in handles {
//!     println!("{:?}", handle.join().unwrap()?.label());
//! }
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod engine;
pub mod manifest;
pub mod request;
mod runtime;

pub use assets::{AssetDir, AssetSource, MemoryAssets};
pub use engine::{
    ClassificationEngine, ClassificationResult, EncodedInput, EngineBuilder, EngineError, EngineInfo,
    EngineState, ErrorKind, InferenceModel, LabelScore, ModelBackend, OnnxBackend,
};
pub use manifest::{ModelManifest, OutputKind};
pub use request::{initialize_in_background, PredictionFailure, PredictionRequest, PredictionState};
pub use runtime::{create_session_builder, RuntimeConfig};
pub use ort::session::builder::GraphOptimizationLevel;

pub fn init_logger() {
    env_logger::init();
}
