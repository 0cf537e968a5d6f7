//! Image decode/encode keyed by file extension.
//!
//! The pipeline reads and writes exactly two formats:
//!
//! | Extension | Format | Crate decoder/encoder |
//! |---|---|---|
//! | `.jpg`, `.jpeg` | JPEG | `image` (pure Rust) |
//! | `.png` | PNG | `image` (pure Rust) |
//!
//! Extensions are matched case-insensitively. Everything here is a pure
//! function over the filesystem — no shared state.

use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("Failed to encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),
}

/// Extensions whose codecs are compiled in and known to work.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Whether `path` has a supported image extension (case-insensitive).
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| ext.eq_ignore_ascii_case(s))
        })
}

/// Map a path's extension to its encode format.
pub fn format_for(path: &Path) -> Result<ImageFormat, CodecError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "png" => Ok(ImageFormat::Png),
        other => Err(CodecError::UnsupportedExtension(other.to_string())),
    }
}

/// Load and decode an image from disk.
///
/// Open failures surface as [`CodecError::Io`]; unrecognized or corrupt
/// content as [`CodecError::Decode`].
pub fn load_image(path: &Path) -> Result<DynamicImage, CodecError> {
    ImageReader::open(path)?.decode().map_err(|e| CodecError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Encode and write an image, inferring the format from the extension.
///
/// JPEG has no alpha channel, so RGBA inputs are flattened to RGB before
/// encoding; PNG is written as-is.
pub fn save_image(img: &DynamicImage, path: &Path) -> Result<(), CodecError> {
    let format = format_for(path)?;
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);

    let encode_result = match format {
        ImageFormat::Jpeg => {
            DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut writer, format)
        }
        _ => img.write_to(&mut writer, format),
    };

    encode_result.map_err(|e| CodecError::Encode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{write_test_jpeg, write_test_png};
    use tempfile::TempDir;

    #[test]
    fn supported_extensions_case_insensitive() {
        assert!(is_supported(Path::new("/in/photo.jpg")));
        assert!(is_supported(Path::new("/in/photo.JPEG")));
        assert!(is_supported(Path::new("/in/photo.Png")));
        assert!(!is_supported(Path::new("/in/photo.webp")));
        assert!(!is_supported(Path::new("/in/photo")));
    }

    #[test]
    fn load_jpeg_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("photo.jpg");
        write_test_jpeg(&path, 120, 80);

        let img = load_image(&path).unwrap();
        assert_eq!(img.width(), 120);
        assert_eq!(img.height(), 80);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let result = load_image(Path::new("/nonexistent/photo.jpg"));
        assert!(matches!(result, Err(CodecError::Io(_))));
    }

    #[test]
    fn load_corrupt_file_is_decode_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"not an image at all").unwrap();

        let result = load_image(&path);
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }

    #[test]
    fn save_png_preserves_pixels() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.png");
        write_test_png(&src, 40, 30);

        let img = load_image(&src).unwrap();
        let dst = tmp.path().join("copy.png");
        save_image(&img, &dst).unwrap();

        let reloaded = load_image(&dst).unwrap();
        assert_eq!(reloaded.to_rgba8(), img.to_rgba8());
    }

    #[test]
    fn save_rgba_as_jpeg_flattens_alpha() {
        let tmp = TempDir::new().unwrap();
        let rgba = image::RgbaImage::from_pixel(16, 16, image::Rgba([200, 100, 50, 128]));
        let img = DynamicImage::ImageRgba8(rgba);

        let dst = tmp.path().join("flat.jpg");
        save_image(&img, &dst).unwrap();

        let reloaded = load_image(&dst).unwrap();
        assert_eq!(reloaded.width(), 16);
        assert_eq!(reloaded.height(), 16);
    }

    #[test]
    fn save_unsupported_extension_errors() {
        let tmp = TempDir::new().unwrap();
        let img = DynamicImage::new_rgb8(8, 8);
        let result = save_image(&img, &tmp.path().join("out.gif"));
        assert!(matches!(result, Err(CodecError::UnsupportedExtension(_))));
    }
}
