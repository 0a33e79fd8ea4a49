//! Core types and configuration shared by the CropScan crates.

pub mod config;
pub mod tensor;

pub use config::{ConfigError, FitMode, Normalization, PipelineConfig, PreprocessConfig};
pub use tensor::{ElementType, ImageGeometry, Layout, LayoutHint, ShapeError, TensorSpec};
