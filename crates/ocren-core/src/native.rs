//! Extraction backend over real PDF files and the configured OCR engine.

use std::path::Path;

use crate::batch::ExtractionBackend;
use crate::error::{OcrError, RenderError};
use crate::models::config::OcrConfig;
use crate::ocr::{recognizer_from_config, TextRecognizer};
use crate::pdf::PdfRenderer;

/// Opens staged PDFs with [`PdfRenderer`] and builds one recognizer per worker
/// from the OCR configuration.
#[derive(Debug, Clone)]
pub struct NativeBackend {
    ocr: OcrConfig,
}

impl NativeBackend {
    pub fn new(ocr: OcrConfig) -> Self {
        Self { ocr }
    }
}

impl ExtractionBackend for NativeBackend {
    type Renderer = PdfRenderer;
    type Recognizer = Box<dyn TextRecognizer>;

    fn open(&self, path: &Path) -> Result<PdfRenderer, RenderError> {
        let data = std::fs::read(path)
            .map_err(|e| RenderError::Parse(format!("{}: {}", path.display(), e)))?;
        PdfRenderer::load(&data)
    }

    fn recognizer(&self) -> Result<Box<dyn TextRecognizer>, OcrError> {
        recognizer_from_config(&self.ocr)
    }
}
