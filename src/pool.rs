//! The cell pool — pre-cut grid images awaiting consumption.
//!
//! A pool is built fresh for every overlay job by scanning the cell folder
//! (recursively — grid cutting may have written cells into nested
//! directories). Loading is fail-fast: one corrupt cell invalidates the whole
//! pool for that job, so a job never runs against a partially loaded set.
//!
//! The `processed/` sub-directory holds cells already consumed by earlier
//! jobs and is skipped during the scan; a consumed cell never re-enters a
//! pool.
//!
//! Zero cells is not a load error. Callers check [`CellPool::is_empty`] and
//! treat an empty pool as a no-op.

use crate::codec::{self, CodecError};
use image::DynamicImage;
use rand::Rng;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory (inside the cell folder) that consumed cells are moved into.
pub const PROCESSED_DIR_NAME: &str = "processed";

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed walking cell folder: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Failed loading cell: {0}")]
    Decode(#[from] CodecError),
}

/// One pre-cut grid image, exclusively owned by the pool until consumed.
#[derive(Debug)]
pub struct GridCell {
    pub image: DynamicImage,
    /// Base file name, used to name the relocated file under `processed/`.
    pub file_name: String,
    /// Full path of the backing file. Kept alongside the name so cells found
    /// in nested sub-directories relocate from where they actually live.
    pub source_path: PathBuf,
}

/// Ordered sequence of not-yet-consumed cells for one overlay job.
#[derive(Debug, Default)]
pub struct CellPool {
    cells: Vec<GridCell>,
}

impl CellPool {
    /// Scan `folder` recursively and load every supported image file.
    ///
    /// Any decode failure aborts the whole load — no partial pools. The
    /// `processed/` sub-directory is excluded from the walk.
    pub fn load(folder: &Path) -> Result<Self, PoolError> {
        let mut cells = Vec::new();

        let walker = walkdir::WalkDir::new(folder)
            .into_iter()
            .filter_entry(|e| {
                !(e.file_type().is_dir()
                    && e.file_name() == std::ffi::OsStr::new(PROCESSED_DIR_NAME))
            });

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() || !codec::is_supported(entry.path()) {
                continue;
            }
            let image = codec::load_image(entry.path())?;
            cells.push(GridCell {
                image,
                file_name: entry.file_name().to_string_lossy().to_string(),
                source_path: entry.path().to_path_buf(),
            });
        }

        Ok(Self { cells })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    /// Uniformly permute the cell order. Callers pass a freshly seeded RNG
    /// per job so repeated jobs over the same folder assign cells in
    /// different orders.
    pub fn shuffle(&mut self, rng: &mut impl Rng) {
        self.cells.shuffle(rng);
    }

    /// Remove and return the cell at `index`, preserving the relative order
    /// of the remainder. O(n), fine for pools of tens to low hundreds.
    pub fn remove_at(&mut self, index: usize) -> GridCell {
        self.cells.remove(index)
    }

    /// Remove the first `count` cells (the consumed prefix after a
    /// compositing pass), preserving the order of the rest.
    pub fn remove_prefix(&mut self, count: usize) {
        self.cells.drain(..count.min(self.cells.len()));
    }
}
