//! Image pre-processing: geometric normalization and tensor packing.
//!
//! Geometry keeps the aspect ratio. The image is center cropped to the model's
//! aspect ratio and resized, or resized to fit inside the input and padded
//! (letterboxed), or cropped and padded per axis without resampling.
//! Stretching the image to the input size would distort it in a way the model
//! was not trained on.

use cropscan_core::{ElementType, FitMode, ImageGeometry, Layout, PreprocessConfig};
use image::imageops::{self, FilterType};
use image::{Pixel, Rgb, RgbImage};
use tracing::debug;

use crate::error::{ClassifyError, LoadError};
use crate::raw_image::RawImage;

/// Input element types the packer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Float32,
    Uint8,
}

impl TryFrom<ElementType> for InputType {
    type Error = LoadError;

    fn try_from(element_type: ElementType) -> Result<Self, LoadError> {
        match element_type {
            ElementType::Float32 => Ok(Self::Float32),
            ElementType::Uint8 => Ok(Self::Uint8),
            other => Err(LoadError::UnsupportedInputType(other)),
        }
    }
}

/// Packed input values, in the element type the model expects.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Float32(Vec<f32>),
    Uint8(Vec<u8>),
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            Self::Float32(v) => v.len(),
            Self::Uint8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A packed model input: concrete shape plus data.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    pub shape: Vec<i64>,
    pub data: TensorData,
}

/// Converts raw images into model inputs for one particular model.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    geometry: ImageGeometry,
    shape: Vec<i64>,
    input_type: InputType,
    fit: FitMode,
    alpha: [f32; 3],
    beta: [f32; 3],
}

impl Preprocessor {
    /// `shape` is the model's declared input shape; dynamic dimensions are
    /// pinned to 1.
    pub fn new(
        geometry: ImageGeometry,
        shape: &[i64],
        input_type: InputType,
        config: &PreprocessConfig,
    ) -> Self {
        let (alpha, beta) = config.normalization.coefficients();
        Self {
            geometry,
            shape: shape.iter().map(|&d| d.max(1)).collect(),
            input_type,
            fit: config.fit,
            alpha,
            beta,
        }
    }

    pub fn geometry(&self) -> ImageGeometry {
        self.geometry
    }

    pub fn input_type(&self) -> InputType {
        self.input_type
    }

    /// Fit to the input size, then pack.
    pub fn process(&self, image: &RawImage) -> Result<NormalizedTensor, ClassifyError> {
        let fitted = self.normalize_geometry(image.pixels());
        self.pack(&fitted)
    }

    /// Bring an image to exactly the model's width x height.
    pub fn normalize_geometry(&self, image: &RgbImage) -> RgbImage {
        let (w, h) = (self.geometry.width, self.geometry.height);
        let fitted = fit_image(image, w, h, self.fit);
        debug!(
            from_w = image.width(),
            from_h = image.height(),
            to_w = w,
            to_h = h,
            fit = ?self.fit,
            "normalized image geometry"
        );
        fitted
    }

    /// Pack a target-sized image in the model's layout and element type.
    pub fn pack(&self, image: &RgbImage) -> Result<NormalizedTensor, ClassifyError> {
        let (w, h) = (self.geometry.width, self.geometry.height);
        if image.dimensions() != (w, h) {
            return Err(ClassifyError::Preprocess(format!(
                "image is {}x{}, model input is {w}x{h}",
                image.width(),
                image.height()
            )));
        }

        let data = match self.input_type {
            InputType::Uint8 => TensorData::Uint8(pack_with(image, &self.geometry, |_, v| v)),
            InputType::Float32 => {
                let (alpha, beta) = (self.alpha, self.beta);
                TensorData::Float32(pack_with(image, &self.geometry, |c, v| {
                    v as f32 * alpha[c] + beta[c]
                }))
            }
        };

        Ok(NormalizedTensor {
            shape: self.shape.clone(),
            data,
        })
    }
}

/// Lay out `image` as `geometry` describes, converting each channel value with `convert`.
///
/// `image` must be exactly `geometry.width x geometry.height`. Single-channel
/// geometries get the luma of each pixel, converted with channel 0's
/// parameters.
fn pack_with<T, F>(image: &RgbImage, geometry: &ImageGeometry, convert: F) -> Vec<T>
where
    T: Copy + Default,
    F: Fn(usize, u8) -> T,
{
    let (w, h) = (geometry.width as usize, geometry.height as usize);
    let channels = geometry.channels as usize;
    let mut out = vec![T::default(); geometry.element_count()];

    for (x, y, px) in image.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        let values: [u8; 3] = if channels == 1 {
            [px.to_luma()[0], 0, 0]
        } else {
            px.0
        };

        for (c, &v) in values.iter().take(channels).enumerate() {
            let idx = match geometry.layout {
                Layout::Nhwc => (y * w + x) * channels + c,
                Layout::Nchw => (c * h + y) * w + x,
            };
            out[idx] = convert(c, v);
        }
    }

    out
}

/// Bring `image` to exactly `target_w` x `target_h` according to `mode`.
///
/// - [`FitMode::Crop`]: center crop to the target aspect ratio, then bilinear resize.
/// - [`FitMode::Pad`]: bilinear resize to fit inside the target, then center
///   on a black canvas of the target size.
/// - [`FitMode::Exact`]: center crop or pad each axis to the target size.
///
/// Intermediate buffers never exceed the larger of the source and the target.
pub fn fit_image(image: &RgbImage, target_w: u32, target_h: u32, mode: FitMode) -> RgbImage {
    let (w, h) = image.dimensions();
    match mode {
        FitMode::Crop => {
            let (crop_w, crop_h) = crop_to_aspect(w, h, target_w, target_h);
            let window = center_window(image, crop_w, crop_h);
            resize_bilinear(&window, target_w, target_h)
        }
        FitMode::Pad => {
            let (fit_w, fit_h) = fit_inside(w, h, target_w, target_h);
            let scaled = resize_bilinear(image, fit_w, fit_h);
            center_window(&scaled, target_w, target_h)
        }
        FitMode::Exact => center_window(image, target_w, target_h),
    }
}

/// Bilinear resize to exactly `target_w` x `target_h`. Same-size input is returned as is.
pub fn resize_bilinear(image: &RgbImage, target_w: u32, target_h: u32) -> RgbImage {
    if image.dimensions() == (target_w, target_h) {
        return image.clone();
    }
    imageops::resize(image, target_w, target_h, FilterType::Triangle)
}

/// Center `image` in a `new_w x new_h` frame: axes that are too long are
/// cropped around the center, axes that are too short are padded with black.
fn center_window(image: &RgbImage, new_w: u32, new_h: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    if (new_w, new_h) == (w, h) {
        return image.clone();
    }

    let (src_x, copy_w) = if w > new_w { ((w - new_w) / 2, new_w) } else { (0, w) };
    let (src_y, copy_h) = if h > new_h { ((h - new_h) / 2, new_h) } else { (0, h) };
    let window = imageops::crop_imm(image, src_x, src_y, copy_w, copy_h).to_image();
    if (copy_w, copy_h) == (new_w, new_h) {
        return window;
    }

    let dst_x = (new_w - copy_w) / 2;
    let dst_y = (new_h - copy_h) / 2;
    let mut canvas = RgbImage::from_pixel(new_w, new_h, Rgb([0, 0, 0]));
    imageops::replace(&mut canvas, &window, dst_x as i64, dst_y as i64);
    canvas
}

/// Largest centered window of `w x h` with aspect `tw:th`.
fn crop_to_aspect(w: u32, h: u32, tw: u32, th: u32) -> (u32, u32) {
    let (w64, h64, tw64, th64) = (w as u64, h as u64, tw as u64, th as u64);
    if w64 * th64 > h64 * tw64 {
        // Too wide.
        let new_w = ((h64 * tw64 + th64 / 2) / th64).clamp(1, w64);
        (new_w as u32, h)
    } else {
        let new_h = ((w64 * th64 + tw64 / 2) / tw64).clamp(1, h64);
        (w, new_h as u32)
    }
}

/// Largest size with the aspect of `w x h` that fits inside `tw x th`.
fn fit_inside(w: u32, h: u32, tw: u32, th: u32) -> (u32, u32) {
    let (w64, h64, tw64, th64) = (w as u64, h as u64, tw as u64, th as u64);
    if w64 * th64 > h64 * tw64 {
        let new_h = ((h64 * tw64 + w64 / 2) / w64).clamp(1, th64);
        (tw, new_h as u32)
    } else {
        let new_w = ((w64 * th64 + h64 / 2) / h64).clamp(1, tw64);
        (new_w as u32, th)
    }
}
