use std::sync::Arc;

use log::info;

use super::backend::{ModelBackend, OnnxBackend};
use super::engine::ClassificationEngine;
use super::error::EngineError;
use crate::manifest::DEFAULT_MANIFEST_NAME;
use crate::runtime::RuntimeConfig;

/// A builder for constructing a [`ClassificationEngine`] with a fluent interface.
///
/// The engine is returned uninitialized; nothing is loaded until
/// [`ClassificationEngine::initialize`] is called.
pub struct EngineBuilder {
    manifest_name: String,
    runtime_config: RuntimeConfig,
    backend: Option<Arc<dyn ModelBackend>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// Creates a new EngineBuilder instance with default configuration
    ///
    /// # Example
    /// ```
    /// use verdict::EngineBuilder;
    ///
    /// let builder = EngineBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self {
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            runtime_config: RuntimeConfig::default(),
            backend: None,
        }
    }

    /// Sets the asset name of the model manifest (default `manifest.json`)
    pub fn with_manifest(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    /// Sets the runtime configuration for ONNX model execution
    ///
    /// Ignored when a custom backend is set with [`EngineBuilder::with_backend`].
    ///
    /// # Example
    /// ```
    /// use verdict::{EngineBuilder, RuntimeConfig};
    ///
    /// let builder = EngineBuilder::new()
    ///     .with_runtime_config(RuntimeConfig::single_threaded());
    /// ```
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Replaces the ONNX backend with another model backend
    pub fn with_backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Builds an uninitialized engine
    ///
    /// # Errors
    /// - `Config` if the manifest name is empty
    /// - `Config` if the runtime configuration is out of range
    pub fn build(self) -> Result<ClassificationEngine, EngineError> {
        if self.manifest_name.trim().is_empty() {
            return Err(EngineError::Config("Manifest name cannot be empty".into()));
        }

        let backend = match self.backend {
            Some(backend) => backend,
            None => {
                self.runtime_config.validate()?;
                Arc::new(OnnxBackend::new(self.runtime_config)) as Arc<dyn ModelBackend>
            }
        };
        info!(
            "Engine configured with backend '{}' and manifest '{}'",
            backend.name(),
            self.manifest_name
        );

        Ok(ClassificationEngine::from_parts(self.manifest_name, backend))
    }
}
