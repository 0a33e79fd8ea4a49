use std::path::PathBuf;

use cropscan_core::{ElementType, ShapeError};
use thiserror::Error;

/// Failure to bring up the model or label table. Inference stays disabled.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model file not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("label file not found: {0}")]
    LabelsNotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("label file {0} contains no labels")]
    EmptyLabels(PathBuf),

    #[error("failed to load model: {0}")]
    Model(String),

    #[error("model input type {0} is not supported (expected float32 or uint8)")]
    UnsupportedInputType(ElementType),

    #[error("unsupported model shape: {0}")]
    Shape(#[from] ShapeError),
}

/// Failure of a single `classify` call. Never retried; the pipeline stays usable.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("model or labels not loaded")]
    NotReady,

    #[error("pre-processing failed: {0}")]
    Preprocess(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("output data type {0} is not supported")]
    UnsupportedOutputType(ElementType),

    #[error("model produced no usable scores")]
    EmptyOutput,

    #[error("predicted class {index} has no label (label table has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Failure to turn a capture or file into a [`RawImage`](crate::RawImage).
///
/// Raised by the image source; the pipeline is never invoked for such input.
#[derive(Debug, Error)]
pub enum ImageSourceError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("pixel buffer has {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("image has zero width or height")]
    Empty,
}
