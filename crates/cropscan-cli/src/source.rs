//! Where images come from.
//!
//! A file argument is a gallery pick; `-` reads one encoded capture (JPEG,
//! PNG, ...) from stdin, the way a camera app would pipe a photo in. Decode
//! failures stop here and never reach the pipeline.

use std::io::Read;
use std::path::{Path, PathBuf};

use cropscan_ai::{ImageSourceError, RawImage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Gallery(PathBuf),
    Camera,
}

impl ImageSource {
    pub fn from_arg(arg: &Path) -> Self {
        if arg == Path::new("-") {
            Self::Camera
        } else {
            Self::Gallery(arg.to_path_buf())
        }
    }

    /// Name shown next to the result.
    pub fn name(&self) -> String {
        match self {
            Self::Gallery(path) => path.display().to_string(),
            Self::Camera => "<camera>".to_string(),
        }
    }

    pub fn acquire(&self) -> Result<RawImage, ImageSourceError> {
        match self {
            Self::Gallery(path) => RawImage::open(path),
            Self::Camera => read_capture(std::io::stdin().lock()),
        }
    }
}

/// Decode one encoded image from a byte stream.
pub fn read_capture(mut reader: impl Read) -> Result<RawImage, ImageSourceError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|source| ImageSourceError::Io {
            path: PathBuf::from("<stdin>"),
            source,
        })?;
    RawImage::decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb([30, 160, 40]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn dash_is_camera() {
        assert_eq!(ImageSource::from_arg(Path::new("-")), ImageSource::Camera);
        assert_eq!(
            ImageSource::from_arg(Path::new("leaf.jpg")),
            ImageSource::Gallery(PathBuf::from("leaf.jpg"))
        );
        assert_eq!(ImageSource::Camera.name(), "<camera>");
    }

    #[test]
    fn capture_from_stream() {
        let img = read_capture(Cursor::new(png_bytes(5, 3))).unwrap();
        assert_eq!((img.width(), img.height()), (5, 3));
    }

    #[test]
    fn corrupt_capture_is_rejected() {
        let err = read_capture(Cursor::new(b"\x89PNG broken".to_vec())).unwrap_err();
        assert!(matches!(err, ImageSourceError::Decode(_)));
    }

    #[test]
    fn gallery_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.png");
        std::fs::write(&path, png_bytes(4, 4)).unwrap();

        let img = ImageSource::Gallery(path).acquire().unwrap();
        assert_eq!(img.width(), 4);
    }

    #[test]
    fn gallery_missing_file() {
        let source = ImageSource::Gallery(PathBuf::from("/nonexistent/leaf.png"));
        assert!(matches!(
            source.acquire(),
            Err(ImageSourceError::Io { .. })
        ));
    }
}
