//! Tensor descriptors shared by the model backends and the pipeline.
//!
//! A [`TensorSpec`] is what a backend reports about one of its inputs or
//! outputs: the declared shape (dynamic dimensions are `-1`) and the element
//! type. The pipeline reads the input spec to derive the image geometry it
//! must produce, and the output spec to size and decode the score vector.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Element type of a model tensor.
///
/// Only [`ElementType::Float32`] and [`ElementType::Uint8`] are decodable as
/// class scores; the rest exist so a backend can report what it found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Float32,
    Uint8,
    Int8,
    Int16,
    Int32,
    Int64,
    Float16,
    Float64,
    Bool,
    String,
    Other,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Float32 => "float32",
            Self::Uint8 => "uint8",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float16 => "float16",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Memory order of an image tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `[N, H, W, C]`, channel-interleaved (TFLite / Keras exports).
    Nhwc,
    /// `[N, C, H, W]`, planar (PyTorch exports).
    Nchw,
}

/// Layout selection from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutHint {
    /// Infer from the position of the channel dimension.
    #[default]
    Auto,
    Nhwc,
    Nchw,
}

/// Spatial geometry the pipeline must produce for a model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageGeometry {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub layout: Layout,
}

impl ImageGeometry {
    /// Number of scalar elements in one packed image.
    pub fn element_count(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("input tensor must have rank 3 or 4, got shape {0:?}")]
    UnsupportedRank(Vec<i64>),

    #[error("input tensor batch dimension must be 1, got {0}")]
    BatchNotOne(i64),

    #[error("input tensor has a dynamic spatial dimension: {0:?}")]
    DynamicDimension(Vec<i64>),

    #[error("input tensor must have 1 or 3 channels, got shape {0:?}")]
    UnsupportedChannels(Vec<i64>),

    #[error("output tensor is not a flat class vector: {0:?}")]
    NotFlat(Vec<i64>),
}

/// Declared shape and element type of one model tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    pub shape: Vec<i64>,
    pub element_type: ElementType,
}

impl TensorSpec {
    pub fn new(shape: impl Into<Vec<i64>>, element_type: ElementType) -> Self {
        Self {
            shape: shape.into(),
            element_type,
        }
    }

    /// Total element count. Dynamic dimensions (`<= 0`) count as 1.
    pub fn element_count(&self) -> usize {
        self.shape.iter().map(|&d| d.max(1) as usize).product()
    }

    /// Length of the class vector for a classification output.
    ///
    /// Fails when more than one dimension is larger than 1, i.e. when the
    /// output is not a flat vector of per-class scores (detection boxes,
    /// segmentation maps, ...). `None` when the class dimension is dynamic
    /// (`[1, -1]`); the length is then only known per call.
    pub fn class_count(&self) -> Result<Option<usize>, ShapeError> {
        let mut non_unit = self.shape.iter().filter(|&&d| d > 1);
        match (non_unit.next(), non_unit.next()) {
            (Some(_), Some(_)) => Err(ShapeError::NotFlat(self.shape.clone())),
            (Some(&n), None) => Ok(Some(n as usize)),
            (None, _) if self.shape.last().is_some_and(|&d| d <= 0) => Ok(None),
            (None, _) => Ok(Some(1)),
        }
    }

    /// Derive the image geometry of an image input tensor.
    ///
    /// Accepts `[N, H, W, C]`, `[N, C, H, W]` (batch 1 or dynamic), or the
    /// same without the batch dimension.
    pub fn image_geometry(&self, hint: LayoutHint) -> Result<ImageGeometry, ShapeError> {
        let dims: &[i64] = match self.shape.as_slice() {
            [n, rest @ ..] if self.shape.len() == 4 => {
                if *n > 1 {
                    return Err(ShapeError::BatchNotOne(*n));
                }
                rest
            }
            all if all.len() == 3 => all,
            _ => return Err(ShapeError::UnsupportedRank(self.shape.clone())),
        };

        let is_channels = |d: i64| d == 1 || d == 3;
        let layout = match hint {
            LayoutHint::Nhwc => Layout::Nhwc,
            LayoutHint::Nchw => Layout::Nchw,
            LayoutHint::Auto if is_channels(dims[2]) => Layout::Nhwc,
            LayoutHint::Auto if is_channels(dims[0]) => Layout::Nchw,
            LayoutHint::Auto => return Err(ShapeError::UnsupportedChannels(self.shape.clone())),
        };

        let (h, w, c) = match layout {
            Layout::Nhwc => (dims[0], dims[1], dims[2]),
            Layout::Nchw => (dims[1], dims[2], dims[0]),
        };

        if !is_channels(c) {
            return Err(ShapeError::UnsupportedChannels(self.shape.clone()));
        }
        if h <= 0 || w <= 0 {
            return Err(ShapeError::DynamicDimension(self.shape.clone()));
        }

        Ok(ImageGeometry {
            width: w as u32,
            height: h as u32,
            channels: c as u32,
            layout,
        })
    }
}

impl fmt::Display for TensorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.element_type, self.shape)
    }
}
