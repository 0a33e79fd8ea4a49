//! Pipeline configuration.
//!
//! Everything the pipeline needs that is specific to a model export but not
//! recorded in the model file itself: how to fit the image to the input
//! aspect ratio, which memory layout the input uses, and the value range the
//! model was trained on. Loaded from an optional JSON file; every field has a
//! default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::tensor::LayoutHint;

pub const DEFAULT_MODEL_PATH: &str = "models/cropscan/model.onnx";
pub const DEFAULT_LABELS_PATH: &str = "models/cropscan/labels.txt";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How the image is brought to the model's aspect ratio before resizing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Center-crop the longer side to the target aspect ratio.
    #[default]
    Crop,
    /// Center-pad the shorter side with black to the target aspect ratio.
    Pad,
    /// Crop or pad each axis directly to the target size; the resize step is
    /// then a no-op. This matches the crop-or-pad step of the mobile app the
    /// bundled models were tuned with: large photos keep only their center
    /// at native scale.
    Exact,
}

/// Per-channel value normalization for float inputs: `(px * scale - mean) / std`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Normalization {
    pub scale: f32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for Normalization {
    /// Maps `0..=255` onto `0.0..=1.0`.
    fn default() -> Self {
        Self {
            scale: 1.0 / 255.0,
            mean: [0.0; 3],
            std: [1.0; 3],
        }
    }
}

impl Normalization {
    /// ImageNet statistics, as used by most torchvision-derived exports.
    pub fn imagenet() -> Self {
        Self {
            scale: 1.0 / 255.0,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }

    /// Symmetric `[-1, 1]` range used by MobileNet/EfficientNet-lite exports.
    pub fn symmetric() -> Self {
        Self {
            scale: 1.0 / 127.5,
            mean: [1.0; 3],
            std: [1.0; 3],
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }
        for (i, &m) in self.mean.iter().enumerate() {
            if !m.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "mean at index {i} is not finite: {m}"
                )));
            }
        }
        for (i, &s) in self.std.iter().enumerate() {
            if !(s.is_finite() && s > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "std at index {i} must be greater than 0, got {s}"
                )));
            }
        }
        Ok(())
    }

    /// Fold the parameters into `px * alpha + beta` per channel.
    pub fn coefficients(&self) -> ([f32; 3], [f32; 3]) {
        let mut alpha = [0.0; 3];
        let mut beta = [0.0; 3];
        for c in 0..3 {
            alpha[c] = self.scale / self.std[c];
            beta[c] = -self.mean[c] / self.std[c];
        }
        (alpha, beta)
    }
}

/// Geometric and numeric pre-processing options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub fit: FitMode,
    pub layout: LayoutHint,
    #[serde(flatten)]
    pub normalization: Normalization,
}

/// Top-level configuration: resource locations plus pre-processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    pub preprocess: PreprocessConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            labels_path: PathBuf::from(DEFAULT_LABELS_PATH),
            preprocess: PreprocessConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "read pipeline config");
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.preprocess.normalization.validate()
    }
}
