//! Image classification: pre-processing, ONNX Runtime inference, label decoding.

pub mod decode;
mod error;
pub mod labels;
pub mod model;
pub mod pipeline;
pub mod preprocess;
mod raw_image;

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;

pub use decode::{ModelOutput, argmax_f32, argmax_u8};
pub use error::{ClassifyError, ImageSourceError, LoadError};
pub use labels::LabelTable;
pub use model::InferenceModel;
pub use pipeline::{InferenceContext, Pipeline, Prediction};
pub use preprocess::{InputType, NormalizedTensor, Preprocessor, TensorData};
pub use raw_image::RawImage;
