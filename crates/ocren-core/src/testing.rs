//! Scripted renderer, recognizer and backend for tests.
//!
//! A script describes what the recognizer "reads" in each region:
//!
//! ```text
//! pages 2                         page count (default 1)
//! delay 40                        sleep on open, in milliseconds
//! fail-open                       opening the document fails
//! panic                           recognition panics
//! 1 0 002025 05011601234567       page (1-based), region slot, one text line
//! 1 full 002025 0501 1601 2345 67 slot "full" is the full-page fallback
//! ```
//!
//! The renderer encodes (document id, page, slot) into the image it returns,
//! so the recognizer can look the lines up again.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{DynamicImage, GenericImageView, GrayImage, Luma};

use crate::batch::ExtractionBackend;
use crate::error::{OcrError, RenderError};
use crate::ocr::TextRecognizer;
use crate::pdf::{PageRenderer, Region, FULL_PAGE, REGIONS};

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub pages: usize,
    pub delay: Option<Duration>,
    pub fail_open: bool,
    pub panic: bool,
    lines: HashMap<(usize, String), Vec<String>>,
}

impl Script {
    pub fn parse(text: &str) -> Self {
        let mut script = Script {
            pages: 1,
            ..Script::default()
        };
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let mut parts = line.splitn(3, ' ');
            let head = parts.next().unwrap_or_default();
            match head {
                "pages" => script.pages = parts.next().and_then(|n| n.parse().ok()).unwrap_or(1),
                "delay" => {
                    script.delay = parts
                        .next()
                        .and_then(|n| n.parse().ok())
                        .map(Duration::from_millis)
                }
                "fail-open" => script.fail_open = true,
                "panic" => script.panic = true,
                page => {
                    let page: usize = page.parse().expect("page number");
                    let slot = parts.next().expect("region slot").to_string();
                    let text = parts.next().unwrap_or_default().to_string();
                    script.lines.entry((page, slot)).or_default().push(text);
                }
            }
        }
        script
    }

    fn lines(&self, page: usize, slot: &str) -> Vec<String> {
        self.lines.get(&(page, slot.to_string())).cloned().unwrap_or_default()
    }
}

fn slot_of(region: &Region) -> usize {
    if *region == FULL_PAGE {
        return REGIONS.len();
    }
    REGIONS
        .iter()
        .position(|r| r == region)
        .expect("region from the catalog")
}

fn slot_name(slot: usize) -> String {
    if slot == REGIONS.len() {
        "full".to_string()
    } else {
        slot.to_string()
    }
}

type Scripts = Arc<Mutex<HashMap<u8, Script>>>;

/// Renderer side of a scripted document.
pub struct ScriptedDocument {
    id: u8,
    pages: usize,
}

impl PageRenderer for ScriptedDocument {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn render(&self, page_index: usize, region: &Region, dpi: u32) -> Result<DynamicImage, RenderError> {
        if dpi == 0 {
            return Err(RenderError::InvalidDpi(dpi));
        }
        if page_index >= self.pages {
            return Err(RenderError::InvalidPage {
                index: page_index,
                count: self.pages,
            });
        }
        let image = GrayImage::from_pixel(page_index as u32 + 1, slot_of(region) as u32 + 1, Luma([self.id]));
        Ok(DynamicImage::ImageLuma8(image))
    }
}

/// Recognizer returning the scripted lines of the rendered region.
pub struct ScriptedRecognizer {
    scripts: Scripts,
    calls: Mutex<Vec<(usize, String)>>,
}

impl ScriptedRecognizer {
    /// Renderer and recognizer for a single scripted document.
    pub fn single(script: Script) -> (ScriptedDocument, ScriptedRecognizer) {
        let pages = script.pages;
        let scripts: Scripts = Arc::new(Mutex::new(HashMap::from([(0, script)])));
        (
            ScriptedDocument { id: 0, pages },
            ScriptedRecognizer {
                scripts,
                calls: Mutex::new(Vec::new()),
            },
        )
    }

    /// `(page, slot)` of every recognition, in call order.
    pub fn calls(&self) -> Vec<(usize, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl TextRecognizer for ScriptedRecognizer {
    fn recognize(&self, image: &DynamicImage, _whitelist: &str) -> Vec<String> {
        let (width, height) = image.dimensions();
        let id = image.to_luma8().get_pixel(0, 0)[0];
        let page = width as usize;
        let slot = slot_name(height as usize - 1);
        self.calls.lock().unwrap().push((page, slot.clone()));

        let script = self.scripts.lock().unwrap().get(&id).cloned().unwrap_or_default();
        if script.panic {
            panic!("scripted recognition panic");
        }
        script.lines(page, &slot)
    }
}

/// Backend whose documents are script files on disk.
pub struct ScriptedBackend {
    scripts: Scripts,
    opened: AtomicUsize,
    fail_recognizer: bool,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(Mutex::new(HashMap::new())),
            opened: AtomicUsize::new(0),
            fail_recognizer: false,
        }
    }

    pub fn with_failing_recognizer(mut self) -> Self {
        self.fail_recognizer = true;
        self
    }

    /// Number of documents opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl ExtractionBackend for ScriptedBackend {
    type Renderer = ScriptedDocument;
    type Recognizer = ScriptedRecognizer;

    fn open(&self, path: &Path) -> Result<ScriptedDocument, RenderError> {
        let text = std::fs::read_to_string(path).map_err(|e| RenderError::Parse(e.to_string()))?;
        let script = Script::parse(&text);
        let id = u8::try_from(self.opened.fetch_add(1, Ordering::SeqCst)).expect("at most 256 scripted documents");
        if let Some(delay) = script.delay {
            std::thread::sleep(delay);
        }
        if script.fail_open {
            return Err(RenderError::Parse("scripted open failure".to_string()));
        }
        let pages = script.pages;
        self.scripts.lock().unwrap().insert(id, script);
        Ok(ScriptedDocument { id, pages })
    }

    fn recognizer(&self) -> Result<ScriptedRecognizer, OcrError> {
        if self.fail_recognizer {
            return Err(OcrError::ModelLoad("scripted recognizer failure".to_string()));
        }
        Ok(ScriptedRecognizer {
            scripts: Arc::clone(&self.scripts),
            calls: Mutex::new(Vec::new()),
        })
    }
}
