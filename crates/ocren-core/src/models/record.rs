//! Extraction results and the per-document rename records built from them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::batch::Document;

/// Leading digits every valid code starts with.
pub const CODE_PREFIX: &str = "002025";

/// Total number of digits in a valid code.
pub const CODE_LEN: usize = 20;

/// A validated 20-digit document code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Code(String);

impl Code {
    /// Accept `digits` only if it is exactly the prefix followed by 14 digits.
    ///
    /// Nothing is trimmed, truncated or padded.
    pub fn parse(digits: &str) -> Option<Self> {
        let valid = digits.len() == CODE_LEN
            && digits.bytes().all(|b| b.is_ascii_digit())
            && digits.starts_with(CODE_PREFIX);
        valid.then(|| Code(digits.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Code {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Code::parse(&value).ok_or_else(|| format!("not a valid code: {}", value))
    }
}

impl From<Code> for String {
    fn from(code: Code) -> Self {
        code.0
    }
}

/// Which matching strategy produced a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    /// A single line, digits only, equals a valid code.
    Literal,
    /// Same as literal after confusable-character substitution.
    Normalized,
    /// Prefix followed by a separated digit run somewhere in the block.
    Segmented,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchTier::Literal => "literal",
            MatchTier::Normalized => "normalized",
            MatchTier::Segmented => "segmented",
        })
    }
}

/// Why a document could not be processed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The document could not be opened or parsed.
    Open,
    /// A page region could not be rendered.
    Render,
    /// The worker's recognition engine could not be constructed.
    Recognizer,
    /// The task panicked.
    Panic,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::Open => "open",
            FailureKind::Render => "render",
            FailureKind::Recognizer => "recognizer",
            FailureKind::Panic => "panic",
        })
    }
}

/// How a result was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    /// A catalog region on a scanned page matched. `page` is 1-based.
    Region {
        index: usize,
        page: usize,
        dpi: u32,
        tier: MatchTier,
    },
    /// The full first page matched after every region failed.
    FullPage { dpi: u32, tier: MatchTier },
    /// Nothing matched.
    NotFound,
    /// The document failed before a result could be computed.
    Failed { kind: FailureKind, message: String },
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Region { index, page, dpi, tier } => {
                write!(f, "region[{}] p{} {}dpi {}", index, page, dpi, tier)
            }
            Criterion::FullPage { dpi, tier } => write!(f, "full p1 {}dpi {}", dpi, tier),
            Criterion::NotFound => f.write_str("not found"),
            Criterion::Failed { kind, message } => write!(f, "{} error: {}", kind, message),
        }
    }
}

/// Outcome of running the extractor over one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionResult {
    Found { code: Code, criterion: Criterion },
    NotFound,
}

impl ExtractionResult {
    pub fn code(&self) -> Option<&Code> {
        match self {
            ExtractionResult::Found { code, .. } => Some(code),
            ExtractionResult::NotFound => None,
        }
    }
}

/// Final rename decision for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRecord {
    /// Position of the document in discovery order.
    pub index: usize,
    /// Original path relative to the input root, `/`-separated.
    pub original: String,
    /// Destination path relative to the output root, `/`-separated.
    pub new_name: String,
    /// Human readable description of how the result was reached.
    pub criterion: String,
    /// Detected code, empty when none.
    pub code: String,
}

impl RenameRecord {
    /// Build the record for a completed extraction.
    pub fn from_result(document: &Document, result: &ExtractionResult) -> Self {
        match result {
            ExtractionResult::Found { code, criterion } => Self {
                index: document.index,
                original: document.relative.clone(),
                new_name: destination_name(&document.relative, Some(code)),
                criterion: criterion.to_string(),
                code: code.to_string(),
            },
            ExtractionResult::NotFound => Self {
                index: document.index,
                original: document.relative.clone(),
                new_name: destination_name(&document.relative, None),
                criterion: Criterion::NotFound.to_string(),
                code: String::new(),
            },
        }
    }

    /// Build the record for a document whose task failed.
    pub fn failed(document: &Document, kind: FailureKind, message: impl Into<String>) -> Self {
        let criterion = Criterion::Failed {
            kind,
            message: message.into(),
        };
        Self {
            index: document.index,
            original: document.relative.clone(),
            new_name: destination_name(&document.relative, None),
            criterion: criterion.to_string(),
            code: String::new(),
        }
    }
}

/// All records of a run, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub records: Vec<RenameRecord>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of documents for which a code was detected.
    pub fn found(&self) -> usize {
        self.records.iter().filter(|r| !r.code.is_empty()).count()
    }
}

/// Compute the destination path for `relative`: same directory, file named
/// after the code when there is one, otherwise after the original stem. The
/// extension keeps its original spelling.
pub fn destination_name(relative: &str, code: Option<&Code>) -> String {
    let (dir, file) = match relative.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, relative),
    };
    let (stem, ext) = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file, None),
    };
    let base = code.map(Code::as_str).unwrap_or(stem);
    let name = match ext {
        Some(ext) => format!("{}.{}", base, ext),
        None => base.to_string(),
    };
    match dir {
        Some(dir) => format!("{}/{}", dir, name),
        None => name,
    }
}
