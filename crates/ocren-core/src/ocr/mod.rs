//! Text recognition adapters.
//!
//! A [`TextRecognizer`] turns a raster image into text lines. Recognizers never
//! fail on unreadable input: a blank or undecipherable image yields no lines.
//! Only constructing an engine can fail.

#[cfg(feature = "native")]
mod pure_engine;
mod tesseract;

#[cfg(feature = "native")]
pub use pure_engine::PureOcrEngine;
pub use tesseract::TesseractEngine;

use image::DynamicImage;
#[cfg(feature = "native")]
use tracing::info;

use crate::error::OcrError;
use crate::models::config::{OcrConfig, OcrEngineKind};

/// Characters a code can be read as: the digits plus their look-alikes.
pub const WHITELIST: &str = "0123456789OIlSBZgGQD";

/// Files the onnx engine expects in its model directory: detection model,
/// recognition model and character dictionary.
pub const MODEL_FILES: [&str; 3] = ["det.onnx", "latin_rec.onnx", "latin_dict.txt"];

/// Trait for OCR engines.
pub trait TextRecognizer {
    /// Recognize text lines in `image`, restricted to `whitelist`.
    fn recognize(&self, image: &DynamicImage, whitelist: &str) -> Vec<String>;
}

impl<T: TextRecognizer + ?Sized> TextRecognizer for Box<T> {
    fn recognize(&self, image: &DynamicImage, whitelist: &str) -> Vec<String> {
        (**self).recognize(image, whitelist)
    }
}

/// Split raw engine output into lines, dropping characters outside the
/// whitelist and lines left blank. Whitespace inside a line is kept.
pub fn whitelisted_lines(text: &str, whitelist: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.chars()
                .filter(|c| c.is_whitespace() || whitelist.contains(*c))
                .collect::<String>()
        })
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Construct the recognizer selected by `config`.
pub fn recognizer_from_config(config: &OcrConfig) -> Result<Box<dyn TextRecognizer>, OcrError> {
    match config.engine {
        OcrEngineKind::Tesseract => {
            let engine = TesseractEngine::new(config)?;
            Ok(Box::new(engine))
        }
        #[cfg(feature = "native")]
        OcrEngineKind::Onnx => {
            let model_dir = config
                .model_dir
                .as_deref()
                .ok_or_else(|| OcrError::ModelLoad("no model directory configured".to_string()))?;
            let engine = PureOcrEngine::from_dir(model_dir)?;
            info!("Using pure-onnx-ocr models from {}", model_dir.display());
            Ok(Box::new(engine))
        }
        #[cfg(not(feature = "native"))]
        OcrEngineKind::Onnx => Err(OcrError::EngineUnavailable(
            "built without the `native` feature".to_string(),
        )),
    }
}
