//! Configuration structures for the renaming pipeline.

use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OcrenError;

/// Main configuration for the ocren pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrenConfig {
    /// Page rendering configuration.
    pub render: RenderConfig,

    /// OCR engine configuration.
    pub ocr: OcrConfig,

    /// Batch scheduling configuration.
    pub batch: BatchConfig,
}

/// Page rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Rendering density in dots per inch.
    pub dpi: u32,

    /// Number of leading pages scanned per document.
    pub pages: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dpi: DpiPreset::Medium.dpi(),
            pages: 2,
        }
    }
}

/// Named resolution presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DpiPreset {
    Low,
    Medium,
    High,
}

impl DpiPreset {
    /// Resolution this preset stands for.
    pub fn dpi(self) -> u32 {
        match self {
            DpiPreset::Low => 150,
            DpiPreset::Medium => 300,
            DpiPreset::High => 600,
        }
    }
}

impl FromStr for DpiPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(DpiPreset::Low),
            "medium" => Ok(DpiPreset::Medium),
            "high" => Ok(DpiPreset::High),
            other => Err(format!("unknown dpi preset '{}' (expected low, medium or high)", other)),
        }
    }
}

/// Which recognition engine backs the text recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineKind {
    /// `pure-onnx-ocr` with PaddleOCR models from a model directory.
    Onnx,
    /// Externally installed `tesseract` binary.
    Tesseract,
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Engine used for recognition.
    pub engine: OcrEngineKind,

    /// Directory holding `det.onnx`, `latin_rec.onnx` and `latin_dict.txt`.
    pub model_dir: Option<PathBuf>,

    /// Path to the tesseract binary (looked up on `PATH` when unset).
    pub tesseract_path: Option<PathBuf>,

    /// Tesseract language pack.
    pub language: String,

    /// Tesseract page segmentation mode.
    pub psm: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: OcrEngineKind::Onnx,
            model_dir: None,
            tesseract_path: None,
            language: "eng".to_string(),
            psm: 6,
        }
    }
}

/// Batch scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of parallel workers.
    pub workers: WorkerCount,

    /// Documents handed to a worker per dispatch.
    pub chunk_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: WorkerCount::Auto,
            chunk_size: 2,
        }
    }
}

/// Worker pool size: `auto` or a positive count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WorkerCountRepr", into = "WorkerCountRepr")]
pub enum WorkerCount {
    Auto,
    Fixed(NonZeroUsize),
}

impl WorkerCount {
    /// Resolve to a concrete number of workers (always at least 1).
    pub fn resolve(self) -> usize {
        match self {
            WorkerCount::Auto => num_cpus::get().max(1),
            WorkerCount::Fixed(n) => n.get(),
        }
    }
}

impl Default for WorkerCount {
    fn default() -> Self {
        WorkerCount::Auto
    }
}

impl fmt::Display for WorkerCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerCount::Auto => f.write_str("auto"),
            WorkerCount::Fixed(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for WorkerCount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(WorkerCount::Auto);
        }
        s.parse::<usize>()
            .ok()
            .and_then(NonZeroUsize::new)
            .map(WorkerCount::Fixed)
            .ok_or_else(|| format!("invalid worker count '{}' (expected 'auto' or a positive integer)", s))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WorkerCountRepr {
    Count(usize),
    Named(String),
}

impl TryFrom<WorkerCountRepr> for WorkerCount {
    type Error = String;

    fn try_from(repr: WorkerCountRepr) -> Result<Self, Self::Error> {
        match repr {
            WorkerCountRepr::Count(n) => NonZeroUsize::new(n)
                .map(WorkerCount::Fixed)
                .ok_or_else(|| "worker count must be positive".to_string()),
            WorkerCountRepr::Named(s) => s.parse(),
        }
    }
}

impl From<WorkerCount> for WorkerCountRepr {
    fn from(count: WorkerCount) -> Self {
        match count {
            WorkerCount::Auto => WorkerCountRepr::Named("auto".to_string()),
            WorkerCount::Fixed(n) => WorkerCountRepr::Count(n.get()),
        }
    }
}

impl OcrenConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), OcrenError> {
        if self.render.dpi == 0 {
            return Err(OcrenError::Config("dpi must be a positive integer".to_string()));
        }
        if self.render.pages == 0 {
            return Err(OcrenError::Config("pages must be a positive integer".to_string()));
        }
        if self.batch.chunk_size == 0 {
            return Err(OcrenError::Config("chunk_size must be a positive integer".to_string()));
        }
        Ok(())
    }
}
