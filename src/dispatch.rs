//! Folder watching and overlay job dispatch.
//!
//! One dispatcher owns one `(cell_folder, input_folder, output_folder,
//! opacity)` tuple. File-creation events from the watched input folder are
//! classified (supported image extensions only), deduplicated against a
//! per-dispatcher processed-file set, and pushed onto a bounded queue drained
//! by a single worker thread — so no two jobs for the same dispatcher ever
//! run concurrently against the same cell folder. Two simultaneous jobs
//! could otherwise both select and try to relocate the same cell file.
//!
//! Filesystem watchers commonly emit more than one creation-like event per
//! file; the processed-file set suppresses the duplicates. Entries are never
//! evicted, so re-creating a file at a previously processed path is ignored
//! for the dispatcher's lifetime.
//!
//! Losing the watched folder is terminal: a watcher error, or a remove event
//! for the watch root itself, stops the dispatch — the queue sender is
//! dropped, the worker drains what is already queued and exits, and
//! [`DispatcherHandle::is_stopped`] flips so the caller can notice and
//! restart. A failed subscription at startup aborts [`start_overlay_watch`]
//! instead. Stopping the handle drops the subscription, lets the worker drain
//! the queue and finish any in-flight job, then joins it.

use crate::codec;
use crate::compositor::{InvalidOpacity, Opacity};
use crate::overlay::{self, JobOutcome, OverlayJob};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Queue capacity for pending file-creation events.
const QUEUE_CAPACITY: usize = 1024;

/// Pause between jobs, coalescing bursty file arrivals.
const INTER_JOB_DELAY: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    InvalidOpacity(#[from] InvalidOpacity),
    #[error("Missing parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Failed to set up folder watch: {0}")]
    Watch(#[from] notify::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The folder tuple one dispatcher instance serves.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub cell_folder: PathBuf,
    pub input_folder: PathBuf,
    pub output_folder: PathBuf,
    pub opacity: f64,
}

/// Per-dispatcher shared state: the set of input paths already dispatched.
///
/// Shared between the notification callback (producer) and nothing else —
/// the worker only consumes the queue — but the callback runs on the
/// watcher's thread, so access is mutex-guarded. Constructed per dispatcher;
/// independent dispatchers never share a set.
#[derive(Debug, Default)]
pub struct DispatcherState {
    processed: Mutex<HashSet<PathBuf>>,
}

impl DispatcherState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify and dedupe a created path. Returns true exactly once per
    /// eligible path; duplicates and non-image files are dropped silently.
    pub fn accept(&self, path: &Path) -> bool {
        if !codec::is_supported(path) {
            return false;
        }
        // A poisoned lock still holds a usable set; `insert` cannot leave it
        // in a torn state.
        self.processed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_path_buf())
    }
}

/// Running dispatcher. Dropping it (or calling [`stop`](Self::stop)) ends
/// the watch, drains in-flight work, and joins the worker.
pub struct DispatcherHandle {
    watcher: Option<RecommendedWatcher>,
    worker: Option<thread::JoinHandle<()>>,
    stopped: Arc<AtomicBool>,
}

impl DispatcherHandle {
    /// Stop watching and wait for the worker to finish its queue.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Whether the dispatch has ended on its own, typically because the
    /// watched folder became inaccessible. A stopped dispatcher never
    /// recovers; the caller restarts with a fresh [`start_overlay_watch`].
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
            || self.worker.as_ref().map_or(true, |w| w.is_finished())
    }

    fn shutdown(&mut self) {
        // Dropping the watcher drops the queue sender it owns; the worker
        // exits once the channel is drained and disconnected.
        self.watcher.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Validate parameters and start a folder dispatcher in the background.
///
/// Validation happens synchronously, before any filesystem access; the
/// returned handle does not block. Multiple dispatchers may run for
/// different folder tuples — arbitrating overlapping tuples is the caller's
/// responsibility.
pub fn start_overlay_watch(config: WatchConfig) -> Result<DispatcherHandle, DispatchError> {
    let opacity = Opacity::new(config.opacity)?;
    for (name, path) in [
        ("cell_folder", &config.cell_folder),
        ("input_folder", &config.input_folder),
        ("output_folder", &config.output_folder),
    ] {
        if path.as_os_str().is_empty() {
            return Err(DispatchError::MissingParameter(name));
        }
    }

    let (tx, rx) = sync_channel::<PathBuf>(QUEUE_CAPACITY);
    let state = Arc::new(DispatcherState::new());
    let stopped = Arc::new(AtomicBool::new(false));

    let worker_config = config.clone();
    let worker = thread::Builder::new()
        .name("mosaic-overlay-worker".into())
        .spawn(move || worker_loop(rx, &worker_config, opacity))?;

    let mut tx = Some(tx);
    let watch_root = config.input_folder.clone();
    let callback_stopped = Arc::clone(&stopped);
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        on_event(result, &state, &mut tx, &watch_root, &callback_stopped);
    })?;
    watcher.watch(&config.input_folder, RecursiveMode::NonRecursive)?;
    info!(
        input_folder = %config.input_folder.display(),
        opacity = opacity.value(),
        "watching for new files"
    );

    Ok(DispatcherHandle {
        watcher: Some(watcher),
        worker: Some(worker),
        stopped,
    })
}

/// Notification callback: forward accepted creation paths to the queue.
///
/// Losing the watch root ends the dispatch. `tx` holds the queue's only
/// sender; taking it disconnects the channel, so the worker drains whatever
/// is queued and exits.
fn on_event(
    result: notify::Result<Event>,
    state: &DispatcherState,
    tx: &mut Option<SyncSender<PathBuf>>,
    watch_root: &Path,
    stopped: &AtomicBool,
) {
    if tx.is_none() {
        return;
    }

    match result {
        Ok(event) if matches!(event.kind, EventKind::Remove(_)) => {
            if event.paths.iter().any(|p| p == watch_root) {
                error!(
                    input_folder = %watch_root.display(),
                    "watched folder removed, stopping dispatch"
                );
                stopped.store(true, Ordering::SeqCst);
                tx.take();
            }
        }
        Ok(event) if matches!(event.kind, EventKind::Create(_)) => {
            let Some(sender) = tx.as_ref() else { return };
            for path in event.paths {
                if state.accept(&path) {
                    if sender.try_send(path.clone()).is_err() {
                        warn!(path = %path.display(), "event queue full, dropping file");
                    }
                }
            }
        }
        Ok(_) => {}
        Err(e) => {
            error!(error = %e, "folder watch failed, stopping dispatch");
            stopped.store(true, Ordering::SeqCst);
            tx.take();
        }
    }
}

/// Single consumer: one overlay job at a time, in arrival order.
fn worker_loop(rx: Receiver<PathBuf>, config: &WatchConfig, opacity: Opacity) {
    for input_file in rx {
        info!(path = %input_file.display(), "new file detected");
        let job = OverlayJob {
            input_file,
            cell_folder: config.cell_folder.clone(),
            output_folder: config.output_folder.clone(),
            opacity,
        };
        match overlay::run(&job) {
            Ok(JobOutcome::NoCells) => {}
            Ok(JobOutcome::Composited {
                cells_consumed,
                output_path,
                output_written,
            }) => {
                info!(
                    cells_consumed,
                    output = %output_path.display(),
                    output_written,
                    "overlay complete"
                );
            }
            Err(e) => {
                // Terminal for this job only; the dispatcher keeps waiting.
                error!(input = %job.input_file.display(), error = %e, "overlay job failed");
            }
        }
        thread::sleep(INTER_JOB_DELAY);
    }
}
