//! Pixel operations for overlay jobs: crop, resize, and alpha blending.
//!
//! All functions here are pure over their image arguments — no filesystem
//! access — so they unit test without fixtures.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Center square crop | `DynamicImage::crop_imm` |
//! | Resample | `resize_exact` with `Lanczos3` |
//! | Blend | integer "over" compositing, source alpha modulated by [`Opacity`] |

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbaImage};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Opacity must be within [0.0, 1.0], got {0}")]
pub struct InvalidOpacity(pub f64);

/// Blend intensity for composited cells, validated to [0.0, 1.0].
///
/// The per-cell alpha mask is uniform — every pixel carries the same value —
/// so it collapses to the single 8-bit alpha this type produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Opacity(f64);

impl Opacity {
    /// Validate a scalar opacity. Rejection happens before any job I/O.
    pub fn new(value: f64) -> Result<Self, InvalidOpacity> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidOpacity(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Linear map to an 8-bit alpha: `round(opacity * 255)`.
    pub fn alpha(self) -> u8 {
        (self.0 * 255.0).round() as u8
    }
}

/// Crop a centered square of `min(width, height)` pixels.
pub fn crop_to_square(img: &DynamicImage) -> DynamicImage {
    let (width, height) = img.dimensions();
    let min_dim = width.min(height);
    let x0 = (width - min_dim) / 2;
    let y0 = (height - min_dim) / 2;
    img.crop_imm(x0, y0, min_dim, min_dim)
}

/// Center-crop to a square, then resample to `width`×`height` with Lanczos3.
///
/// Deterministic for identical inputs; an already-square image of the target
/// size passes through pixel-for-pixel.
pub fn crop_and_resize(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let square = crop_to_square(img);
    if square.dimensions() == (width, height) {
        return square;
    }
    square.resize_exact(width, height, FilterType::Lanczos3)
}

/// Composite `cell` over `canvas` at `(x0, y0)` with the standard "over"
/// operator, the cell's own alpha modulated by `alpha`. Regions falling
/// outside the canvas are clipped.
///
/// `alpha` 0 leaves the canvas untouched; 255 replaces it wherever the cell
/// itself is opaque.
pub fn blend_over(canvas: &mut RgbaImage, cell: &DynamicImage, x0: u32, y0: u32, alpha: u8) {
    if alpha == 0 {
        return;
    }

    let cell = cell.to_rgba8();
    let (canvas_w, canvas_h) = canvas.dimensions();

    for (cx, cy, src) in cell.enumerate_pixels() {
        let (dx, dy) = (x0 + cx, y0 + cy);
        if dx >= canvas_w || dy >= canvas_h {
            continue;
        }

        let dst = canvas.get_pixel_mut(dx, dy);
        // Effective source alpha: cell alpha scaled by the mask value.
        let a = (u32::from(src[3]) * u32::from(alpha) + 127) / 255;
        let inv = 255 - a;
        for ch in 0..3 {
            let blended = (u32::from(src[ch]) * a + u32::from(dst[ch]) * inv + 127) / 255;
            dst[ch] = blended as u8;
        }
        let out_a = a + (u32::from(dst[3]) * inv + 127) / 255;
        dst[3] = out_a.min(255) as u8;
    }
}
