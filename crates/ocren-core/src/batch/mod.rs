//! Batch processing: input staging, document discovery and the worker pool.

mod input;
mod scheduler;

pub use input::{discover, is_document, stage_input, Workspace, DOCUMENT_EXTENSIONS};
pub use scheduler::{BatchScheduler, DEFAULT_CHUNK_SIZE};

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{OcrError, RenderError};
use crate::models::record::RenameRecord;
use crate::ocr::TextRecognizer;
use crate::pdf::PageRenderer;

/// A document discovered in the batch input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Position in discovery order.
    pub index: usize,
    /// Path relative to the input root, `/`-separated. Identity of the document.
    pub relative: String,
    /// Absolute path of the staged file.
    pub path: PathBuf,
}

impl Document {
    pub fn new(index: usize, relative: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            index,
            relative: relative.into(),
            path: path.into(),
        }
    }
}

/// Progress after one completed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub remaining: Duration,
}

impl ProgressEvent {
    /// Estimate remaining time from the average duration so far.
    pub fn new(completed: usize, total: usize, elapsed: Duration) -> Self {
        let remaining = if completed == 0 {
            Duration::ZERO
        } else {
            let left = total.saturating_sub(completed) as u32;
            (elapsed / completed as u32) * left
        };
        Self {
            completed,
            total,
            elapsed,
            remaining,
        }
    }
}

/// Receives one call per completed document, always from the thread that
/// runs the batch.
pub trait ProgressSink {
    fn on_progress(&mut self, record: &RenameRecord, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: FnMut(&RenameRecord, &ProgressEvent),
{
    fn on_progress(&mut self, record: &RenameRecord, event: &ProgressEvent) {
        self(record, event)
    }
}

/// Opens documents and creates recognizers for the worker pool.
///
/// Shared by reference across workers. Each worker creates its own
/// recognizer once and opens every document it processes.
pub trait ExtractionBackend: Sync {
    type Renderer: PageRenderer;
    type Recognizer: TextRecognizer;

    /// Open a staged document for rendering.
    fn open(&self, path: &Path) -> Result<Self::Renderer, RenderError>;

    /// Create a recognizer for one worker.
    fn recognizer(&self) -> Result<Self::Recognizer, OcrError>;
}
