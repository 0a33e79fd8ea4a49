//! Decoded input images.
//!
//! [`RawImage`] is what an image source (camera capture, gallery pick, file)
//! hands to the pipeline: an 8-bit RGB bitmap of non-zero size. Alpha is
//! dropped on conversion, the same way a bitmap is flattened into an RGB
//! input tensor.

use std::path::Path;

use image::{DynamicImage, RgbImage, RgbaImage};

use crate::error::ImageSourceError;

#[derive(Debug, Clone, PartialEq)]
pub struct RawImage {
    pixels: RgbImage,
}

impl RawImage {
    pub fn from_dynamic(image: DynamicImage) -> Result<Self, ImageSourceError> {
        Self::from_rgb_image(image.into_rgb8())
    }

    pub fn from_rgb_image(pixels: RgbImage) -> Result<Self, ImageSourceError> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(ImageSourceError::Empty);
        }
        Ok(Self { pixels })
    }

    /// Wrap a tightly packed RGBA8 buffer (`width * height * 4` bytes).
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ImageSourceError> {
        let expected = width as usize * height as usize * 4;
        let actual = data.len();
        if actual != expected {
            return Err(ImageSourceError::BufferSize { expected, actual });
        }
        let rgba = RgbaImage::from_raw(width, height, data)
            .ok_or(ImageSourceError::BufferSize { expected, actual })?;
        Self::from_dynamic(DynamicImage::ImageRgba8(rgba))
    }

    /// Wrap a tightly packed RGB8 buffer (`width * height * 3` bytes).
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ImageSourceError> {
        let expected = width as usize * height as usize * 3;
        let actual = data.len();
        if actual != expected {
            return Err(ImageSourceError::BufferSize { expected, actual });
        }
        let rgb = RgbImage::from_raw(width, height, data)
            .ok_or(ImageSourceError::BufferSize { expected, actual })?;
        Self::from_rgb_image(rgb)
    }

    /// Decode an encoded image (PNG, JPEG, ...); the format is sniffed from the bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, ImageSourceError> {
        Self::from_dynamic(image::load_from_memory(bytes)?)
    }

    /// Read and decode an image file.
    pub fn open(path: &Path) -> Result<Self, ImageSourceError> {
        let bytes = std::fs::read(path).map_err(|source| ImageSourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::decode(&bytes)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    #[test]
    fn rgba_drops_alpha() {
        let data = vec![10, 20, 30, 0, 40, 50, 60, 255];
        let img = RawImage::from_rgba(2, 1, data).unwrap();
        assert_eq!((img.width(), img.height()), (2, 1));
        assert_eq!(*img.pixels().get_pixel(0, 0), Rgb([10, 20, 30]));
        assert_eq!(*img.pixels().get_pixel(1, 0), Rgb([40, 50, 60]));
    }

    #[test]
    fn buffer_size_mismatch() {
        let err = RawImage::from_rgb(4, 4, vec![0; 10]).unwrap_err();
        match err {
            ImageSourceError::BufferSize { expected, actual } => {
                assert_eq!(expected, 48);
                assert_eq!(actual, 10);
            }
            other => panic!("expected BufferSize, got {other:?}"),
        }
    }

    #[test]
    fn oversized_buffer_rejected() {
        let err = RawImage::from_rgba(1, 1, vec![0; 8]).unwrap_err();
        assert!(matches!(
            err,
            ImageSourceError::BufferSize {
                expected: 4,
                actual: 8
            }
        ));
    }

    #[test]
    fn zero_sized_rejected() {
        let err = RawImage::from_rgb(0, 5, vec![]).unwrap_err();
        assert!(matches!(err, ImageSourceError::Empty));
    }

    #[test]
    fn decode_png_bytes() {
        let src = RgbImage::from_pixel(3, 2, Rgb([1, 2, 3]));
        let mut bytes = Cursor::new(Vec::new());
        src.write_to(&mut bytes, ImageFormat::Png).unwrap();

        let img = RawImage::decode(bytes.get_ref()).unwrap();
        assert_eq!(img.pixels(), &src);
    }

    #[test]
    fn decode_garbage_fails() {
        let err = RawImage::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ImageSourceError::Decode(_)));
    }

    #[test]
    fn open_missing_file() {
        let err = RawImage::open(Path::new("/nonexistent/leaf.jpg")).unwrap_err();
        assert!(matches!(err, ImageSourceError::Io { .. }));
    }
}
