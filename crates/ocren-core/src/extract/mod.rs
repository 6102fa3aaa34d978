//! Code extraction: multi-tier matching over recognized header text.

mod extractor;
pub mod normalize;
pub mod patterns;

pub use extractor::{match_lines, CodeExtractor};
pub use normalize::{digits_only, normalize_confusables, CONFUSABLES};
