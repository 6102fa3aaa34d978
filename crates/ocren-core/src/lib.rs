//! Core library for OCR-driven renaming of scanned documents.
//!
//! This crate provides:
//! - PDF page rendering of header regions
//! - Text recognition through pure-onnx-ocr or an installed tesseract
//! - Extraction of the 20-digit `002025` code with confusable-character recovery
//! - A bounded worker pool with per-document failure isolation
//! - Packaging of renamed documents into a zip archive plus a CSV audit

pub mod error;
pub mod models;
pub mod pdf;
pub mod ocr;
pub mod extract;
pub mod batch;
pub mod output;
pub mod native;
pub mod pipeline;

#[cfg(test)]
mod testing;

pub use error::{ArchiveError, InputError, OcrError, OcrenError, RenderError, Result};
pub use models::config::{DpiPreset, OcrEngineKind, OcrenConfig, WorkerCount};
pub use models::record::{BatchReport, Code, Criterion, ExtractionResult, RenameRecord};
pub use pdf::{PageRenderer, PdfRenderer};
pub use ocr::{recognizer_from_config, TextRecognizer};
pub use extract::CodeExtractor;
pub use batch::{BatchScheduler, Document, ExtractionBackend, ProgressEvent, ProgressSink};
pub use output::AuditRow;
pub use native::NativeBackend;
pub use pipeline::{run_batch, BatchRequest, BatchSummary};
