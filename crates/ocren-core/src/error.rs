//! Error types for the ocren-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the ocren library.
///
/// Only input validation, configuration and final packaging failures surface
/// here. Per-document rendering and recognition failures are absorbed into
/// the batch report instead.
#[derive(Error, Debug)]
pub enum OcrenError {
    /// Invalid input path or unreadable input archive.
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// The input contains no matching documents.
    #[error("no documents found in {}", .0.display())]
    NoDocuments(PathBuf),

    /// Building the output archive or audit file failed.
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// OCR engine could not be constructed.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// I/O error outside of a more specific stage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while validating and staging the batch input.
#[derive(Error, Debug)]
pub enum InputError {
    /// The input path does not exist.
    #[error("input not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The input is neither a directory nor a zip archive.
    #[error("unsupported input (expected a directory or .zip): {}", .0.display())]
    Unsupported(PathBuf),

    /// The input archive could not be read.
    #[error("unreadable archive {}: {reason}", path.display())]
    Archive { path: PathBuf, reason: String },

    /// The input root could not be turned into a search pattern.
    #[error("invalid input pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// A document path cannot be represented in the audit file.
    #[error("file name is not valid UTF-8: {}", .0.display())]
    NonUtf8Name(PathBuf),

    /// Copying input files into the workspace failed.
    #[error("failed to stage {}: {source}", path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to page rendering.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to open/parse the document.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The document is encrypted and cannot be opened.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The document has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Requested page index is beyond the page count.
    #[error("invalid page index {index} (document has {count} pages)")]
    InvalidPage { index: usize, count: usize },

    /// Resolution must be positive.
    #[error("invalid resolution: {0} dpi")]
    InvalidDpi(u32),

    /// Embedded raster data could not be decoded.
    #[error("failed to decode page image: {0}")]
    Decode(String),
}

/// Errors related to OCR engine setup.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The external recognition engine is not available.
    #[error("recognition engine unavailable: {0}")]
    EngineUnavailable(String),
}

/// Errors raised while packaging the output.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Zip writer failure.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Audit file writer failure.
    #[error("audit error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem failure while copying or persisting output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tempfile::PersistError> for ArchiveError {
    fn from(err: tempfile::PersistError) -> Self {
        Self::Io(err.error)
    }
}

/// Result type for the ocren library.
pub type Result<T> = std::result::Result<T, OcrenError>;
