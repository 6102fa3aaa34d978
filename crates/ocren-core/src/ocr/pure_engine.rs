//! Pure Rust OCR engine wrapper using `pure-onnx-ocr`.

use std::path::Path;
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info, warn};

use crate::error::OcrError;

use super::{whitelisted_lines, TextRecognizer, MODEL_FILES};

/// A recognized text box in image coordinates.
#[derive(Debug, Clone)]
struct TextBox {
    text: String,
    left: f32,
    top: f32,
    bottom: f32,
}

impl TextBox {
    fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }

    fn height(&self) -> f32 {
        (self.bottom - self.top).max(1.0)
    }
}

/// OCR engine backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).
pub struct PureOcrEngine {
    engine: pure_onnx_ocr::engine::OcrEngine,
}

impl PureOcrEngine {
    /// Create an engine from model files in a directory.
    pub fn from_dir(model_dir: &Path) -> Result<Self, OcrError> {
        let [det, rec, dict] = MODEL_FILES;
        let det_path = model_dir.join(det);
        let rec_path = model_dir.join(rec);
        let dict_path = model_dir.join(dict);

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.is_file() {
                return Err(OcrError::ModelLoad(format!("missing model file {}", path.display())));
            }
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", model_dir.display());

        Ok(Self { engine })
    }
}

impl TextRecognizer for PureOcrEngine {
    fn recognize(&self, image: &DynamicImage, whitelist: &str) -> Vec<String> {
        let start = Instant::now();
        let (width, height) = image.dimensions();

        let results = match self.engine.run_from_image(image) {
            Ok(results) => results,
            Err(e) => {
                warn!("pure-onnx-ocr failed on {}x{} image: {}", width, height, e);
                return Vec::new();
            }
        };

        let boxes: Vec<TextBox> = results
            .iter()
            .filter_map(|r| {
                let (left, top, bottom) = polygon_extent(&r.bounding_box)?;
                Some(TextBox {
                    text: r.text.replace("[UNK]", " "),
                    left,
                    top,
                    bottom,
                })
            })
            .collect();

        let text = join_rows(boxes);
        let lines = whitelisted_lines(&text, whitelist);

        debug!(
            "OCR on {}x{} image: {} regions -> {} lines in {}ms",
            width,
            height,
            results.len(),
            lines.len(),
            start.elapsed().as_millis()
        );

        lines
    }
}

/// Left edge and vertical span of a detection polygon.
fn polygon_extent(polygon: &pure_onnx_ocr::Polygon<f64>) -> Option<(f32, f32, f32)> {
    let mut coords = polygon.exterior().coords().peekable();
    coords.peek()?;
    let (mut left, mut top, mut bottom) = (f32::MAX, f32::MAX, f32::MIN);
    for coord in coords {
        left = left.min(coord.x as f32);
        top = top.min(coord.y as f32);
        bottom = bottom.max(coord.y as f32);
    }
    Some((left, top, bottom))
}

/// Put boxes in reading order and merge boxes sharing a row into one line.
fn join_rows(mut boxes: Vec<TextBox>) -> String {
    boxes.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.left.total_cmp(&b.left)));

    let mut rows: Vec<Vec<TextBox>> = Vec::new();
    for text_box in boxes {
        match rows.last_mut() {
            Some(row)
                if (text_box.center_y() - row[0].center_y()).abs() < row[0].height() / 2.0 =>
            {
                row.push(text_box)
            }
            _ => rows.push(vec![text_box]),
        }
    }

    rows.into_iter()
        .map(|mut row| {
            row.sort_by(|a, b| a.left.total_cmp(&b.left));
            row.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
