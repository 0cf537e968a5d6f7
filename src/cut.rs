//! Grid cutting: partition one image into rows×cols cell files.
//!
//! Cells are `floor(width/cols) × floor(height/rows)` pixels; the last row
//! and column absorb the remainder, so the partition covers the whole image.
//! Each cell is encoded in the source image's format and written as
//! `R<row>C<col>.<ext>` (1-based) into the output directory.
//!
//! Cells encode in parallel via rayon.

use crate::codec::{self, CodecError};
use image::GenericImageView;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CutError {
    #[error("Invalid grid dimensions: {rows} rows x {cols} cols")]
    InvalidDimensions { rows: u32, cols: u32 },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cut `image_path` into a rows×cols grid of cell files under `output_dir`,
/// creating the directory if absent. Returns the output directory.
pub fn cut_into_grid(
    image_path: &Path,
    rows: u32,
    cols: u32,
    output_dir: &Path,
) -> Result<PathBuf, CutError> {
    if rows == 0 || cols == 0 {
        return Err(CutError::InvalidDimensions { rows, cols });
    }

    // Validates the extension up front so the cells inherit a known format.
    codec::format_for(image_path)?;
    let ext = image_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let img = codec::load_image(image_path)?;
    let (width, height) = img.dimensions();
    let cell_w = width / cols;
    let cell_h = height / rows;
    if cell_w == 0 || cell_h == 0 {
        return Err(CutError::InvalidDimensions { rows, cols });
    }

    std::fs::create_dir_all(output_dir)?;

    let tiles: Vec<(u32, u32)> = (0..rows)
        .flat_map(|row| (0..cols).map(move |col| (row, col)))
        .collect();

    tiles.par_iter().try_for_each(|&(row, col)| {
        let x0 = col * cell_w;
        let y0 = row * cell_h;
        // Last row/column absorbs the remainder pixels.
        let w = if col == cols - 1 { width - x0 } else { cell_w };
        let h = if row == rows - 1 { height - y0 } else { cell_h };

        let cell = img.crop_imm(x0, y0, w, h);
        let name = format!("R{}C{}.{}", row + 1, col + 1, ext);
        codec::save_image(&cell, &output_dir.join(name))?;
        Ok::<(), CutError>(())
    })?;

    Ok(output_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_test_png;
    use tempfile::TempDir;

    #[test]
    fn rejects_zero_rows_or_cols() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.png");
        write_test_png(&src, 100, 100);

        let out = tmp.path().join("cells");
        assert!(matches!(
            cut_into_grid(&src, 0, 4, &out),
            Err(CutError::InvalidDimensions { rows: 0, cols: 4 })
        ));
        assert!(matches!(
            cut_into_grid(&src, 4, 0, &out),
            Err(CutError::InvalidDimensions { .. })
        ));
        assert!(!out.exists());
    }

    #[test]
    fn rejects_grid_finer_than_image() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.png");
        write_test_png(&src, 3, 3);

        let result = cut_into_grid(&src, 5, 5, &tmp.path().join("cells"));
        assert!(matches!(result, Err(CutError::InvalidDimensions { .. })));
    }

    #[test]
    fn writes_all_cells_with_grid_naming() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.png");
        write_test_png(&src, 103, 92);

        let out = cut_into_grid(&src, 3, 4, &tmp.path().join("cells")).unwrap();

        for row in 1..=3 {
            for col in 1..=4 {
                assert!(out.join(format!("R{row}C{col}.png")).exists());
            }
        }

        // 103/4 = 25 wide, 92/3 = 30 tall; interior cells are exact.
        let interior = crate::codec::load_image(&out.join("R1C1.png")).unwrap();
        assert_eq!(interior.dimensions(), (25, 30));

        // Last row/column absorb the remainder: 103-75=28, 92-60=32.
        let corner = crate::codec::load_image(&out.join("R3C4.png")).unwrap();
        assert_eq!(corner.dimensions(), (28, 32));
    }

    #[test]
    fn cells_inherit_source_format() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.jpg");
        crate::test_helpers::write_test_jpeg(&src, 60, 60);

        let out = cut_into_grid(&src, 2, 2, &tmp.path().join("cells")).unwrap();
        let cell = crate::codec::load_image(&out.join("R2C2.jpg")).unwrap();
        assert_eq!(cell.dimensions(), (30, 30));
    }

    #[test]
    fn unsupported_source_extension_errors_before_decode() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.bmp");
        std::fs::write(&src, b"whatever").unwrap();

        let result = cut_into_grid(&src, 2, 2, &tmp.path().join("cells"));
        assert!(matches!(result, Err(CutError::Codec(_))));
    }

    #[test]
    fn grid_reassembles_to_source_dimensions() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.png");
        write_test_png(&src, 50, 70);

        let out = cut_into_grid(&src, 2, 3, &tmp.path().join("cells")).unwrap();

        let mut total_w = 0;
        for col in 1..=3 {
            total_w += crate::codec::load_image(&out.join(format!("R1C{col}.png")))
                .unwrap()
                .width();
        }
        let mut total_h = 0;
        for row in 1..=2 {
            total_h += crate::codec::load_image(&out.join(format!("R{row}C1.png")))
                .unwrap()
                .height();
        }
        assert_eq!((total_w, total_h), (50, 70));
    }
}
