//! Collaborators the editing session talks to
//!
//! Rendering, dialogs, file formats and image decoding live outside this
//! crate. The session only sees them through these traits.

use crate::error::EditorResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use terra_map_core::{MapAttributes, MapDocument, MapTile};

/// Produces a terrain fragment, typically from image files on a worker thread
pub trait TerrainSource: Send {
    /// Build the fragment, reporting progress as it goes
    ///
    /// Returns `Ok(None)` when the job noticed a cancellation request.
    fn load(&mut self, progress: &dyn ProgressReporter) -> EditorResult<Option<MapTile>>;
}

/// Writes a flattened document snapshot to disk
pub trait MapWriter {
    fn write(&mut self, document: &MapDocument, path: &Path) -> EditorResult;
}

/// Type metadata for placeable features
pub trait FeatureCatalog {
    /// Collision footprint in feature-grid cells, or `None` for unknown types
    fn footprint(&self, type_name: &str) -> Option<(usize, usize)>;
}

/// Answer to "save changes before closing?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardChoice {
    Save,
    Discard,
    Cancel,
}

/// Modal questions and error reporting
pub trait DialogService {
    /// Edit map attributes; `None` when the user cancelled
    fn ask_map_attributes(&mut self, current: &MapAttributes) -> Option<MapAttributes>;

    fn ask_discard_changes(&mut self) -> DiscardChoice;

    /// Pick a destination file; `None` when the user cancelled
    fn ask_save_path(&mut self) -> Option<PathBuf>;

    fn show_error(&mut self, message: &str);
}

/// Progress sink for long-running work with cooperative cancellation
pub trait ProgressReporter: Sync {
    /// Completion in percent, 0 to 100
    fn report(&self, percent: u8);

    fn is_cancelled(&self) -> bool;
}

/// Progress state shared between a worker and the UI thread
#[derive(Debug, Clone, Default)]
pub struct SharedProgress {
    percent: Arc<AtomicU8>,
    cancelled: Arc<AtomicBool>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn percent(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }

    /// Ask the worker to stop at its next checkpoint
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl ProgressReporter for SharedProgress {
    fn report(&self, percent: u8) {
        self.percent.store(percent.min(100), Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Terminal state of a background job
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome<T> {
    Completed(T),
    Cancelled,
    Failed(String),
}

/// Run a terrain import to completion; meant to be called on a worker thread
///
/// A result produced after cancellation was requested is discarded.
pub fn run_import(
    source: &mut dyn TerrainSource,
    progress: &dyn ProgressReporter,
) -> JobOutcome<MapTile> {
    match source.load(progress) {
        Ok(Some(_)) if progress.is_cancelled() => JobOutcome::Cancelled,
        Ok(Some(tile)) => {
            progress.report(100);
            JobOutcome::Completed(tile)
        }
        Ok(None) => JobOutcome::Cancelled,
        Err(e) => JobOutcome::Failed(e.to_string()),
    }
}

/// Something copied out of the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClipboardItem {
    Tile(MapTile),
    /// Features are copied by type; pasting places a fresh instance
    Feature { type_name: String },
}
