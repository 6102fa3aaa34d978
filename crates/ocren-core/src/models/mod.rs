//! Data models: configuration, codes, criteria and rename records.

pub mod config;
pub mod record;

pub use config::{BatchConfig, DpiPreset, OcrConfig, OcrEngineKind, OcrenConfig, RenderConfig, WorkerCount};
pub use record::{
    destination_name, BatchReport, Code, Criterion, ExtractionResult, FailureKind, MatchTier,
    RenameRecord, CODE_LEN, CODE_PREFIX,
};
