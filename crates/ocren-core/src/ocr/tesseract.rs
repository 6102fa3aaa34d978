//! Tesseract OCR engine (CLI wrapper).

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::error::OcrError;
use crate::models::config::OcrConfig;

use super::{whitelisted_lines, TextRecognizer};

/// Recognizer that shells out to an installed `tesseract` binary.
pub struct TesseractEngine {
    binary: PathBuf,
    language: String,
    psm: u8,
}

impl TesseractEngine {
    /// Locate the binary and make sure it runs.
    pub fn new(config: &OcrConfig) -> Result<Self, OcrError> {
        let binary = config
            .tesseract_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("tesseract"));
        let version = tesseract_version(&binary)?;

        info!("Using tesseract {} at {}", version, binary.display());

        Ok(Self {
            binary,
            language: config.language.clone(),
            psm: config.psm,
        })
    }

    fn run(&self, image_path: &Path, whitelist: &str) -> std::io::Result<std::process::Output> {
        Command::new(&self.binary)
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", whitelist))
            .output()
    }
}

impl TextRecognizer for TesseractEngine {
    fn recognize(&self, image: &DynamicImage, whitelist: &str) -> Vec<String> {
        let start = Instant::now();

        let temp = match tempfile::Builder::new().prefix("ocren-").suffix(".png").tempfile() {
            Ok(temp) => temp,
            Err(e) => {
                warn!("Failed to create temporary image file: {}", e);
                return Vec::new();
            }
        };
        if let Err(e) = image.save_with_format(temp.path(), image::ImageFormat::Png) {
            warn!("Failed to write temporary image: {}", e);
            return Vec::new();
        }

        let output = match self.run(temp.path(), whitelist) {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                warn!(
                    "tesseract exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                return Vec::new();
            }
            Err(e) => {
                warn!("Failed to run tesseract: {}", e);
                return Vec::new();
            }
        };

        let lines = whitelisted_lines(&String::from_utf8_lossy(&output.stdout), whitelist);
        debug!(
            "tesseract returned {} lines in {}ms",
            lines.len(),
            start.elapsed().as_millis()
        );
        lines
    }
}

fn tesseract_version(binary: &Path) -> Result<String, OcrError> {
    let output = Command::new(binary)
        .arg("--version")
        .output()
        .map_err(|e| OcrError::EngineUnavailable(format!("{}: {}", binary.display(), e)))?;

    if !output.status.success() {
        return Err(OcrError::EngineUnavailable(format!(
            "{} --version exited with {}",
            binary.display(),
            output.status
        )));
    }

    // Older releases print the banner on stderr.
    let banner = if output.stdout.is_empty() { &output.stderr } else { &output.stdout };
    Ok(String::from_utf8_lossy(banner)
        .lines()
        .next()
        .unwrap_or("unknown")
        .trim()
        .to_string())
}
