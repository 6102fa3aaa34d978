//! Regex patterns for code extraction.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::record::CODE_PREFIX;

lazy_static! {
    // Prefix (whitespace tolerated between its digits), optional separators,
    // then a run of digits and separators to be compacted.
    pub static ref SEGMENTED_CODE: Regex = Regex::new(&format!(
        r"{}[\s\-./]*([\s0-9\-./]{{10,40}})",
        spaced(CODE_PREFIX)
    ))
    .unwrap();
}

fn spaced(digits: &str) -> String {
    digits
        .chars()
        .map(|c| regex::escape(&c.to_string()))
        .collect::<Vec<_>>()
        .join(r"\s*")
}
