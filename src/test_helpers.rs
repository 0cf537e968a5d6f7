//! Shared test utilities for the mosaic test suite.
//!
//! Synthetic image builders so tests never depend on binary fixtures. Images
//! carry a coordinate gradient, which makes resize/crop regressions visible
//! in pixel assertions.

use image::{ImageEncoder, Rgb, RgbImage};
use std::path::Path;

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Write a small valid JPEG with the given dimensions.
pub fn write_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = gradient(width, height);
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write a small valid PNG with the given dimensions.
pub fn write_test_png(path: &Path, width: u32, height: u32) {
    gradient(width, height).save(path).unwrap();
}
