//! Region-by-region code search with literal, normalized and segmented tiers.

use tracing::{debug, trace};

use super::normalize::{digits_only, normalize_confusables};
use super::patterns::SEGMENTED_CODE;
use crate::error::RenderError;
use crate::models::record::{Code, Criterion, ExtractionResult, MatchTier, CODE_LEN, CODE_PREFIX};
use crate::ocr::{TextRecognizer, WHITELIST};
use crate::pdf::{PageRenderer, Region, FULL_PAGE, REGIONS};

/// Run the three matching tiers over the lines of one region.
///
/// Tiers are tried in order and the first hit wins:
/// 1. a single line whose digits form a valid code,
/// 2. the same after confusable normalization,
/// 3. the prefix followed by a separated digit run anywhere in the joined
///    block, literal first, then normalized; the first 20 digits are kept.
pub fn match_lines(lines: &[String]) -> Option<(Code, MatchTier)> {
    if let Some(code) = lines.iter().find_map(|line| Code::parse(&digits_only(line))) {
        return Some((code, MatchTier::Literal));
    }

    if let Some(code) = lines
        .iter()
        .find_map(|line| Code::parse(&digits_only(&normalize_confusables(line))))
    {
        return Some((code, MatchTier::Normalized));
    }

    let block = lines.join("\n");
    let normalized = normalize_confusables(&block);
    for text in [&block, &normalized] {
        for caps in SEGMENTED_CODE.captures_iter(text) {
            let digits = digits_only(&format!("{}{}", CODE_PREFIX, &caps[1]));
            if digits.len() < CODE_LEN {
                continue;
            }
            if let Some(code) = Code::parse(&digits[..CODE_LEN]) {
                return Some((code, MatchTier::Segmented));
            }
        }
    }

    None
}

/// Deterministic, early-exit code search over a document.
#[derive(Debug, Clone, Copy)]
pub struct CodeExtractor {
    dpi: u32,
    pages: usize,
}

impl CodeExtractor {
    /// Create an extractor rendering at `dpi` and scanning up to `pages` pages.
    pub fn new(dpi: u32, pages: usize) -> Self {
        Self { dpi, pages }
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Scan catalog regions page by page, then the full first page.
    ///
    /// Rendering failures propagate; recognition never fails.
    pub fn extract<R, T>(&self, renderer: &R, recognizer: &T) -> Result<ExtractionResult, RenderError>
    where
        R: PageRenderer + ?Sized,
        T: TextRecognizer + ?Sized,
    {
        let total = renderer.page_count();
        let scanned = self.pages.min(total);

        for page in 0..scanned {
            for (index, region) in REGIONS.iter().enumerate() {
                let lines = self.read(renderer, recognizer, page, region)?;
                if let Some((code, tier)) = match_lines(&lines) {
                    debug!("Found {} in region {} of page {} ({})", code, index, page + 1, tier);
                    return Ok(ExtractionResult::Found {
                        code,
                        criterion: Criterion::Region {
                            index,
                            page: page + 1,
                            dpi: self.dpi,
                            tier,
                        },
                    });
                }
            }
        }

        if total > 0 {
            debug!("No region matched on {} pages, trying full first page", scanned);
            let lines = self.read(renderer, recognizer, 0, &FULL_PAGE)?;
            if let Some((code, tier)) = match_lines(&lines) {
                debug!("Found {} on full first page ({})", code, tier);
                return Ok(ExtractionResult::Found {
                    code,
                    criterion: Criterion::FullPage { dpi: self.dpi, tier },
                });
            }
        }

        Ok(ExtractionResult::NotFound)
    }

    fn read<R, T>(
        &self,
        renderer: &R,
        recognizer: &T,
        page: usize,
        region: &Region,
    ) -> Result<Vec<String>, RenderError>
    where
        R: PageRenderer + ?Sized,
        T: TextRecognizer + ?Sized,
    {
        let image = renderer.render(page, region, self.dpi)?;
        let lines = recognizer.recognize(&image, WHITELIST);
        trace!("Page {} region {:?}: {:?}", page + 1, region, lines);
        Ok(lines)
    }
}
