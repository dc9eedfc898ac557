//! ONNX Runtime session handling
//!
//! Thin wrapper around an `ort` session: loads a model from a local file,
//! introspects input/output names, and runs single-input f32 inference.

use anyhow::{Context, Result};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Violations of the tensor contracts the pipeline relies on.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model declares no inputs")]
    MissingInput,
    #[error("model produced no outputs")]
    MissingOutput,
    #[error("unexpected output shape: expected {expected}, got {actual:?}")]
    UnexpectedShape { expected: &'static str, actual: Vec<i64> },
}

/// A loaded ONNX model session
pub struct OnnxSession {
    session: Session,
    input_name: String,
    output_names: Vec<String>,
}

impl OnnxSession {
    /// Load an ONNX model from a local file. Loading is one-time; callers
    /// hold the session for the lifetime of the pipeline.
    pub fn load(model_path: &Path) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ONNX model {:?}", model_path))?;

        let input_name = session
            .inputs
            .first()
            .ok_or(ModelError::MissingInput)?
            .name
            .clone();
        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();

        info!(
            "Loaded model {:?} (input: {}, outputs: {:?})",
            model_path, input_name, output_names
        );

        Ok(Self {
            session,
            input_name,
            output_names,
        })
    }

    /// Run inference on a single NCHW f32 tensor and return the first
    /// output's shape and data.
    pub fn run_f32(&mut self, input: &Array4<f32>) -> Result<(Vec<i64>, Vec<f32>)> {
        let shape = input.shape().to_vec();
        let data = input
            .as_standard_layout()
            .as_slice()
            .context("input tensor is not contiguous")?
            .to_vec();
        let input_value = Value::from_array((shape.as_slice(), data))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .context("inference call failed")?;

        let (_, first) = outputs.iter().next().ok_or(ModelError::MissingOutput)?;
        let (out_shape, out_data) = first
            .try_extract_tensor::<f32>()
            .context("failed to extract f32 output tensor")?;

        // Copy out before the outputs map drops
        let out_shape: Vec<i64> = out_shape.iter().map(|&d| d).collect();
        Ok((out_shape, out_data.to_vec()))
    }
}
