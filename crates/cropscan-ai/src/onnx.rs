//! ONNX Runtime backend.
//!
//! Loads a single-input, single-output image classifier (`model.onnx`) and
//! reports its first input and first output as [`TensorSpec`]s.

use std::path::Path;

use cropscan_core::{ElementType, TensorSpec};
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{Tensor, ValueType};
use tracing::info;

use crate::decode::ModelOutput;
use crate::error::LoadError;
use crate::model::InferenceModel;
use crate::preprocess::{NormalizedTensor, TensorData};

/// Image classifier running on ONNX Runtime.
pub struct OnnxModel {
    session: Session,
    input: TensorSpec,
    output: TensorSpec,
}

impl OnnxModel {
    /// Load a model file. Missing files and graphs without a tensor
    /// input/output are reported as [`LoadError`].
    pub fn load(model_path: &Path) -> Result<Self, LoadError> {
        if !model_path.exists() {
            return Err(LoadError::ModelNotFound(model_path.to_path_buf()));
        }

        let session = open_session(model_path).map_err(|e| LoadError::Model(format!("{e:#}")))?;

        let input = session
            .inputs()
            .first()
            .and_then(|i| tensor_spec(i.dtype()))
            .ok_or_else(|| LoadError::Model("model has no tensor input".into()))?;
        let output = session
            .outputs()
            .first()
            .and_then(|o| tensor_spec(o.dtype()))
            .ok_or_else(|| LoadError::Model("model has no tensor output".into()))?;

        info!(
            input = %input,
            output = %output,
            model = %model_path.display(),
            "loaded classification model"
        );
        Ok(Self {
            session,
            input,
            output,
        })
    }
}

impl InferenceModel for OnnxModel {
    fn input_spec(&self) -> &TensorSpec {
        &self.input
    }

    fn output_spec(&self) -> &TensorSpec {
        &self.output
    }

    fn run(&mut self, input: &NormalizedTensor) -> anyhow::Result<ModelOutput> {
        let shape = input.shape.clone();

        let outputs = match &input.data {
            TensorData::Float32(values) => {
                let tensor = Tensor::from_array((shape, values.clone().into_boxed_slice()))?;
                self.session.run(ort::inputs![tensor])?
            }
            TensorData::Uint8(values) => {
                let tensor = Tensor::from_array((shape, values.clone().into_boxed_slice()))?;
                self.session.run(ort::inputs![tensor])?
            }
        };

        let scores = &outputs[0];
        let output = match self.output.element_type {
            ElementType::Float32 => {
                let (_, data) = scores.try_extract_tensor::<f32>()?;
                ModelOutput::Float32(data.to_vec())
            }
            ElementType::Uint8 => {
                let (_, data) = scores.try_extract_tensor::<u8>()?;
                ModelOutput::Uint8(data.to_vec())
            }
            other => ModelOutput::Unsupported(other),
        };

        Ok(output)
    }
}

fn open_session(model_path: &Path) -> anyhow::Result<Session> {
    Ok(Session::builder()?.commit_from_file(model_path)?)
}

/// Shape and element type of a tensor-valued graph input or output.
fn tensor_spec(value_type: &ValueType) -> Option<TensorSpec> {
    match value_type {
        ValueType::Tensor { ty, shape, .. } => Some(TensorSpec::new(
            shape.iter().copied().collect::<Vec<i64>>(),
            element_type(*ty),
        )),
        _ => None,
    }
}

fn element_type(ty: TensorElementType) -> ElementType {
    match ty {
        TensorElementType::Float32 => ElementType::Float32,
        TensorElementType::Uint8 => ElementType::Uint8,
        TensorElementType::Int8 => ElementType::Int8,
        TensorElementType::Int16 => ElementType::Int16,
        TensorElementType::Int32 => ElementType::Int32,
        TensorElementType::Int64 => ElementType::Int64,
        TensorElementType::Float16 => ElementType::Float16,
        TensorElementType::Float64 => ElementType::Float64,
        TensorElementType::Bool => ElementType::Bool,
        TensorElementType::String => ElementType::String,
        _ => ElementType::Other,
    }
}
