//! # Mosaic
//!
//! A photo mosaic pipeline in two halves:
//!
//! 1. **Cut** — partition one source image into a grid of cell files
//!    (`R<row>C<col>.<ext>`).
//! 2. **Overlay** — watch a folder for newly arriving photos and blend each
//!    one, at a configurable opacity, beneath a randomly chosen cell from a
//!    shrinking pool of pre-cut cells. Every cell is consumed at most once:
//!    using it relocates its backing file into a `processed/` directory.
//!
//! ```text
//! file created in input folder
//!   → dispatch   (classify by extension, dedupe, bounded queue)
//!   → overlay    (load input, snapshot+shuffle pool, composite, persist)
//!   → pool       (consumed cells relocated, never revisited)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`codec`] | PNG/JPEG decode/encode keyed by file extension |
//! | [`pool`] | Cell pool — recursive scan/load, per-job shuffle, removal |
//! | [`compositor`] | Crop/resize and alpha blending, plus [`compositor::Opacity`] |
//! | [`overlay`] | One overlay job: the load → composite → persist state machine |
//! | [`dispatch`] | Folder watcher, duplicate-event suppression, serialized jobs |
//! | [`cut`] | Grid cutting — one image into rows×cols cell files |
//!
//! # Concurrency Model
//!
//! Each dispatcher is an independent background unit: a `notify`
//! subscription feeding a bounded queue drained by one worker thread. Jobs
//! for one dispatcher are strictly serialized — the on-disk cell pool is not
//! safe for concurrent consumption, since two jobs could both pick and try
//! to relocate the same file. Safety comes from single-consumer
//! serialization, not locks on the pool. Running several dispatchers for
//! different folder tuples is fine and is the caller's arrangement.
//!
//! There is no retry: a malformed input or cell aborts its one job with a
//! log line, and the dispatcher waits for the next event.

pub mod codec;
pub mod compositor;
pub mod cut;
pub mod dispatch;
pub mod overlay;
pub mod pool;

#[cfg(test)]
pub(crate) mod test_helpers;
