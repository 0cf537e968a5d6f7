//! One overlay job, end to end.
//!
//! A job moves through `LoadingInput → LoadingPool → Compositing →
//! Persisting → Done`, aborting on the first unrecoverable error. Jobs run
//! detached (dispatched from a folder watch), so errors are terminal for the
//! job only — the caller logs and moves on, no retry.
//!
//! ## Compositing
//!
//! The pool is shuffled, and the **first shuffled cell's** dimensions anchor
//! everything: the input is center-cropped and resized to that size, and the
//! grid capacity `floor(W/cw) * floor(H/ch)` is computed from it even though
//! cells may vary in size. Capacity from one representative cell is a
//! documented simplification, not a uniform-cell-size guarantee.
//!
//! Each consumed cell is blended onto the canvas and its backing file is
//! relocated into `processed/` **before** the canvas is persisted, so an
//! overlapping job can never pick the same physical file. Consumed cells are
//! drained from the in-memory pool only after the iteration completes — the
//! pool is never mutated mid-loop.
//!
//! A persist failure after successful compositing does not roll back the
//! relocations: the job still reports completion, with
//! [`JobOutcome::Composited::output_written`] set to `false`
//! (at-least-once-move, at-most-once-output).

use crate::codec::{self, CodecError};
use crate::compositor::{self, Opacity};
use crate::pool::{CellPool, GridCell, PROCESSED_DIR_NAME, PoolError};
use image::{DynamicImage, GenericImageView};
use rand::Rng;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Failed loading input image: {0}")]
    Input(#[from] CodecError),
    #[error("Failed loading cell pool: {0}")]
    Pool(#[from] PoolError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cell backing file missing: {0}")]
    MissingCellFile(PathBuf),
}

/// Parameters for one overlay run. Immutable once started.
#[derive(Debug, Clone)]
pub struct OverlayJob {
    pub input_file: PathBuf,
    pub cell_folder: PathBuf,
    pub output_folder: PathBuf,
    pub opacity: Opacity,
}

/// Terminal state of a completed (non-aborted) job.
#[derive(Debug, PartialEq)]
pub enum JobOutcome {
    /// The cell folder held no usable cells — a logged no-op.
    NoCells,
    Composited {
        cells_consumed: usize,
        output_path: PathBuf,
        /// False when compositing succeeded but the output write failed.
        output_written: bool,
    },
}

/// Run one overlay job with a freshly seeded RNG.
pub fn run(job: &OverlayJob) -> Result<JobOutcome, OverlayError> {
    run_with_rng(job, &mut rand::rng())
}

/// Run one overlay job with a caller-supplied RNG (deterministic in tests).
pub fn run_with_rng(job: &OverlayJob, rng: &mut impl Rng) -> Result<JobOutcome, OverlayError> {
    // LoadingInput
    let input = codec::load_image(&job.input_file)?;

    // LoadingPool
    let mut pool = CellPool::load(&job.cell_folder)?;
    if pool.is_empty() {
        info!(
            cell_folder = %job.cell_folder.display(),
            "no grid cells found, skipping overlay"
        );
        return Ok(JobOutcome::NoCells);
    }

    let processed_dir = job.cell_folder.join(PROCESSED_DIR_NAME);
    std::fs::create_dir_all(&processed_dir)?;

    // Compositing
    pool.shuffle(rng);

    let (cell_w, cell_h) = pool.cells()[0].image.dimensions();
    let resized = compositor::crop_and_resize(&input, cell_w, cell_h);
    let mut canvas = resized.to_rgba8();
    for pixel in canvas.pixels_mut() {
        pixel[3] = 255;
    }

    let capacity = ((canvas.width() / cell_w) * (canvas.height() / cell_h)) as usize;
    let alpha = job.opacity.alpha();

    let mut consumed = 0;
    for cell in pool.cells() {
        if consumed >= capacity {
            break;
        }
        compositor::blend_over(&mut canvas, &cell.image, 0, 0, alpha);
        relocate_cell(cell, &processed_dir)?;
        consumed += 1;
    }
    pool.remove_prefix(consumed);

    // Persisting
    let base_name = job
        .input_file
        .file_name()
        .ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "input path has no file name")
        })?
        .to_owned();
    let output_path = job.output_folder.join(base_name);

    // Directory creation and the encode fail the same soft way: relocations
    // are not rolled back, the cells stay consumed.
    let persisted = std::fs::create_dir_all(&job.output_folder)
        .map_err(CodecError::from)
        .and_then(|()| codec::save_image(&DynamicImage::ImageRgba8(canvas), &output_path));
    let output_written = match persisted {
        Ok(()) => true,
        Err(e) => {
            warn!(
                output = %output_path.display(),
                error = %e,
                "compositing succeeded but output write failed"
            );
            false
        }
    };

    Ok(JobOutcome::Composited {
        cells_consumed: consumed,
        output_path,
        output_written,
    })
}

/// Move a consumed cell's backing file into the processed directory so no
/// later job can load it again. Atomic at rename granularity on one volume.
fn relocate_cell(cell: &GridCell, processed_dir: &Path) -> Result<(), OverlayError> {
    if !cell.source_path.exists() {
        return Err(OverlayError::MissingCellFile(cell.source_path.clone()));
    }
    std::fs::rename(&cell.source_path, processed_dir.join(&cell.file_name))?;
    Ok(())
}
