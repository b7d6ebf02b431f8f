use std::collections::HashMap;

use ndarray::Array2;
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{Tensor, ValueType};

use super::encoding::EncodedInput;
use super::error::EngineError;
use crate::manifest::{InputNames, ModelManifest};
use crate::runtime::{create_session_builder, RuntimeConfig};

/// A loaded, read-only model that maps one encoded input to class scores.
///
/// Implementations must tolerate concurrent `run` calls; a backend whose
/// runtime is not reentrant serializes internally.
pub trait InferenceModel: Send + Sync {
    /// Runs the model and returns one raw value per class, in label order.
    fn run(&self, input: &EncodedInput) -> Result<Vec<f32>, EngineError>;
}

/// Turns the bytes of a packaged model asset into an [`InferenceModel`].
pub trait ModelBackend: Send + Sync {
    /// Short backend name, reported in engine info and logs
    fn name(&self) -> &str;

    /// Builds a model from the raw asset.
    ///
    /// # Errors
    /// - `ModelLoad` if the bytes are not a model this backend understands, or
    ///   the model does not match the manifest's tensor contract
    fn load(&self, model_bytes: &[u8], manifest: &ModelManifest) -> Result<Box<dyn InferenceModel>, EngineError>;
}

/// Backend running ONNX graphs through ONNX Runtime.
#[derive(Debug, Clone, Default)]
pub struct OnnxBackend {
    runtime_config: RuntimeConfig,
}

impl OnnxBackend {
    pub fn new(runtime_config: RuntimeConfig) -> Self {
        Self { runtime_config }
    }

    pub fn runtime_config(&self) -> &RuntimeConfig {
        &self.runtime_config
    }
}

impl ModelBackend for OnnxBackend {
    fn name(&self) -> &str {
        "onnx"
    }

    fn load(&self, model_bytes: &[u8], manifest: &ModelManifest) -> Result<Box<dyn InferenceModel>, EngineError> {
        let session = create_session_builder(&self.runtime_config)?
            .commit_from_memory(model_bytes)
            .map_err(|e| EngineError::ModelLoad(format!("Failed to load ONNX model: {}", e)))?;

        let output_name = OnnxModel::validate_model(&session, manifest)?;
        log::info!("Model structure validated successfully (output '{}')", output_name);

        Ok(Box::new(OnnxModel {
            session,
            inputs: manifest.inputs.clone(),
            output_name,
        }))
    }
}

/// An ONNX Runtime session together with the tensor names it is fed through.
///
/// Sessions accept concurrent `run` calls, so no lock is taken here.
#[derive(Debug)]
pub struct OnnxModel {
    session: Session,
    inputs: InputNames,
    output_name: String,
}

impl OnnxModel {
    /// Checks the graph against the manifest's tensor contract and returns
    /// the output tensor to read.
    fn validate_model(session: &Session, manifest: &ModelManifest) -> Result<String, EngineError> {
        let graph_inputs: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
        check_inputs(&graph_inputs, &manifest.inputs)?;

        let output = match &manifest.output {
            Some(name) => session
                .outputs
                .iter()
                .find(|o| &o.name == name)
                .ok_or_else(|| EngineError::ModelLoad(format!("Model has no output named '{}'", name)))?,
            None => session
                .outputs
                .first()
                .ok_or_else(|| EngineError::ModelLoad("Model must have at least 1 output for class scores".into()))?,
        };
        check_output(&output.name, tensor_info(&output.output_type), manifest.num_classes())?;
        Ok(output.name.clone())
    }

    fn tensor(values: &[i64], what: &str) -> Result<Tensor<i64>, EngineError> {
        let array = Array2::from_shape_vec((1, values.len()), values.to_vec())
            .map_err(|e| EngineError::Inference(format!("Failed to create {} array: {}", what, e)))?;
        Tensor::from_array(array)
            .map_err(|e| EngineError::Inference(format!("Failed to create {} tensor: {}", what, e)))
    }
}

fn tensor_info(value_type: &ValueType) -> Option<(TensorElementType, &[i64])> {
    match value_type {
        ValueType::Tensor { ty, dimensions, .. } => Some((*ty, dimensions.as_slice())),
        _ => None,
    }
}

/// Every input the manifest names must exist, and every graph input must be fed.
fn check_inputs(graph_inputs: &[&str], names: &InputNames) -> Result<(), EngineError> {
    let fed: Vec<&str> = std::iter::once(Some(names.input_ids.as_str()))
        .chain([names.attention_mask.as_deref(), names.token_type_ids.as_deref()])
        .flatten()
        .collect();

    if let Some(missing) = fed.iter().copied().find(|name| !graph_inputs.contains(name)) {
        return Err(EngineError::ModelLoad(format!(
            "Model has no input named '{}' (inputs: {:?})",
            missing, graph_inputs
        )));
    }
    if let Some(unfed) = graph_inputs.iter().copied().find(|name| !fed.contains(name)) {
        return Err(EngineError::ModelLoad(format!(
            "Model input '{}' is not named in the manifest (fed: {:?})",
            unfed, fed
        )));
    }
    Ok(())
}

/// The class-score output must be an `f32` tensor with one value per label.
fn check_output(
    name: &str,
    tensor: Option<(TensorElementType, &[i64])>,
    num_classes: usize,
) -> Result<(), EngineError> {
    let (ty, dimensions) = tensor
        .ok_or_else(|| EngineError::ModelLoad(format!("Model output '{}' is not a tensor", name)))?;
    if ty != TensorElementType::Float32 {
        return Err(EngineError::ModelLoad(format!(
            "Model output '{}' has element type {:?}, expected f32",
            name, ty
        )));
    }
    match dimensions.last() {
        Some(&last) if last >= 0 && last as usize != num_classes => Err(EngineError::ModelLoad(format!(
            "Model output '{}' has {} classes, manifest has {} labels",
            name, last, num_classes
        ))),
        _ => Ok(()),
    }
}

impl InferenceModel for OnnxModel {
    /// # Model Input Format
    /// - input ids: `[batch_size=1, max_sequence_length]`
    /// - attention mask (optional): 1 for real tokens, 0 for padding
    /// - token type ids (optional): all 0
    ///
    /// # Model Output Format
    /// - `[1, num_classes]` or `[num_classes]`, `f32`
    fn run(&self, input: &EncodedInput) -> Result<Vec<f32>, EngineError> {
        let mut input_tensors = HashMap::new();
        input_tensors.insert(self.inputs.input_ids.as_str(), Self::tensor(&input.input_ids, "input")?);
        if let Some(name) = &self.inputs.attention_mask {
            input_tensors.insert(name.as_str(), Self::tensor(&input.attention_mask, "mask")?);
        }
        if let Some(name) = &self.inputs.token_type_ids {
            let zeros = vec![0i64; input.sequence_length()];
            input_tensors.insert(name.as_str(), Self::tensor(&zeros, "token type")?);
        }

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| EngineError::Inference(format!("Failed to run model: {}", e)))?;
        let output_tensor = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| EngineError::Inference(format!("Failed to extract output tensor: {}", e)))?;

        Ok(output_tensor.iter().copied().collect())
    }
}
