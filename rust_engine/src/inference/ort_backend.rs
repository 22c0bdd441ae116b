//! ONNX Runtime 后端

use once_cell::sync::Lazy;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::{InferenceBackend, ModelSignature, SessionOptions};
use crate::{ClothError, Result};

/// 进程内的 ONNX Runtime 环境，只提交一次
static ORT_ENVIRONMENT: Lazy<std::result::Result<(), String>> = Lazy::new(|| {
    match ort::init().with_name("cloth_engine").commit() {
        Ok(_) => Ok(()),
        Err(e) => Err(format!("Failed to initialize ONNX Runtime: {}", e)),
    }
});

/// ONNX Runtime 会话，Drop 时释放
pub struct OrtSession {
    session: Session,
}

fn optimization_level(level: u8) -> GraphOptimizationLevel {
    match level {
        0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}

fn backend_error(context: &str, e: impl std::fmt::Display) -> ClothError {
    ClothError::Backend(format!("{}: {}", context, e))
}

impl OrtSession {
    fn read_signature(session: &Session) -> Result<ModelSignature> {
        let first_input = session
            .inputs
            .first()
            .ok_or_else(|| ClothError::InvalidModel("model has no inputs".to_string()))?;
        let first_output = session
            .outputs
            .first()
            .ok_or_else(|| ClothError::InvalidModel("model has no outputs".to_string()))?;

        let input_shape = first_input
            .input_type
            .tensor_shape()
            .map(|shape| shape.to_vec())
            .ok_or_else(|| {
                ClothError::InvalidModel(format!("input '{}' is not a tensor", first_input.name))
            })?;

        Ok(ModelSignature {
            input_name: first_input.name.clone(),
            output_name: first_output.name.clone(),
            input_shape,
            input_names: session.inputs.iter().map(|i| i.name.clone()).collect(),
            output_names: session.outputs.iter().map(|o| o.name.clone()).collect(),
        })
    }
}

impl InferenceBackend for OrtSession {
    fn load(bytes: &[u8], options: &SessionOptions) -> Result<(Self, ModelSignature)> {
        if bytes.is_empty() {
            return Err(ClothError::InvalidModel("model bytes are empty".to_string()));
        }
        ORT_ENVIRONMENT
            .as_ref()
            .map_err(|e| ClothError::Backend(e.clone()))?;

        let session = Session::builder()
            .map_err(|e| backend_error("Failed to create session builder", e))?
            .with_optimization_level(optimization_level(options.optimization_level))
            .map_err(|e| backend_error("Failed to set optimization level", e))?
            .with_intra_threads(options.intra_op_threads.max(1))
            .map_err(|e| backend_error("Failed to set intra-op threads", e))?
            .commit_from_memory(bytes)
            .map_err(|e| ClothError::InvalidModel(format!("Failed to load model: {}", e)))?;

        let signature = Self::read_signature(&session)?;
        Ok((Self { session }, signature))
    }

    fn run(&mut self, input_name: &str, dims: &[i64], input: &[f32], output_name: &str) -> Result<Vec<f32>> {
        // 直接引用调用方的缓冲区，不拷贝
        let tensor = TensorRef::from_array_view((dims.to_vec(), input))
            .map_err(|e| backend_error("Failed to create input tensor", e))?;

        let outputs = self
            .session
            .run(ort::inputs![input_name => tensor])
            .map_err(|e| backend_error("Session run failed", e))?;

        let value = outputs
            .get(output_name)
            .ok_or_else(|| ClothError::Backend(format!("output '{}' not produced", output_name)))?;
        let (_, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| backend_error("Failed to extract output tensor", e))?;

        Ok(data.to_vec())
    }
}
