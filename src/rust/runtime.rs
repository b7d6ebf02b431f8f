use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use std::sync::OnceLock;

use crate::engine::EngineError;

static ENVIRONMENT: OnceLock<Result<(), String>> = OnceLock::new();

/// Settings for ONNX Runtime sessions created by the engine.
#[derive(Debug)]
pub struct RuntimeConfig {
    pub inter_threads: usize,
    pub intra_threads: usize,
    pub optimization_level: GraphOptimizationLevel,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            inter_threads: 0, // Let ONNX Runtime decide
            intra_threads: 0, // Let ONNX Runtime decide
            optimization_level: GraphOptimizationLevel::Level3,
        }
    }
}

impl Clone for RuntimeConfig {
    fn clone(&self) -> Self {
        Self {
            inter_threads: self.inter_threads,
            intra_threads: self.intra_threads,
            optimization_level: copy_level(&self.optimization_level),
        }
    }
}

impl RuntimeConfig {
    /// Single-threaded sessions, the usual choice on small devices
    pub fn single_threaded() -> Self {
        Self {
            inter_threads: 1,
            intra_threads: 1,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        const MAX_THREADS: usize = 256;
        if self.inter_threads > MAX_THREADS || self.intra_threads > MAX_THREADS {
            return Err(EngineError::Config(format!(
                "Thread counts must not exceed {} (inter: {}, intra: {})",
                MAX_THREADS, self.inter_threads, self.intra_threads
            )));
        }
        Ok(())
    }
}

// `GraphOptimizationLevel` is not `Clone`.
fn copy_level(level: &GraphOptimizationLevel) -> GraphOptimizationLevel {
    match level {
        GraphOptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
        GraphOptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
        GraphOptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
        GraphOptimizationLevel::Disable => GraphOptimizationLevel::Disable,
    }
}

/// Commits the process-wide ONNX Runtime environment once; later calls see the first outcome.
pub fn ensure_initialized() -> Result<(), EngineError> {
    ENVIRONMENT
        .get_or_init(|| {
            log::info!("Initializing ONNX Runtime environment");
            ort::init()
                .with_name("verdict")
                .commit()
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .clone()
        .map_err(|e| EngineError::ModelLoad(format!("Failed to initialize ONNX Runtime: {}", e)))
}

pub fn create_session_builder(config: &RuntimeConfig) -> Result<SessionBuilder, EngineError> {
    ensure_initialized()?;
    let builder_error = |e: ort::Error| EngineError::ModelLoad(format!("Failed to configure session: {}", e));
    let mut builder = Session::builder().map_err(builder_error)?;

    // Configure threading
    if config.inter_threads > 0 {
        builder = builder.with_inter_threads(config.inter_threads).map_err(builder_error)?;
    }
    if config.intra_threads > 0 {
        builder = builder.with_intra_threads(config.intra_threads).map_err(builder_error)?;
    }

    builder = builder
        .with_optimization_level(copy_level(&config.optimization_level))
        .map_err(builder_error)?;

    Ok(builder)
}
