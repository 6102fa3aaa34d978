//! Rasterization of scanned PDF pages using lopdf.
//!
//! Scanned documents carry each page as one embedded raster image. The
//! renderer picks the largest image XObject of a page, turns it by the page's
//! `/Rotate`, scales it to the displayed page size at the requested
//! resolution and crops the requested region.

use std::cell::OnceCell;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace};

use super::{scaled, PageRenderer, Region, Result};
use crate::error::RenderError;

/// A4 in page units, used when a page carries no usable MediaBox.
const DEFAULT_PAGE_SIZE: (f32, f32) = (595.0, 842.0);

/// Page renderer for scanned PDFs.
pub struct PdfRenderer {
    document: Document,
    pages: Vec<ObjectId>,
    /// Displayed raster per page, decoded on first use.
    rasters: Vec<OnceCell<std::result::Result<Option<DynamicImage>, String>>>,
}

impl PdfRenderer {
    /// Parse a PDF from memory.
    pub fn load(data: &[u8]) -> Result<Self> {
        let mut document = Document::load_mem(data).map_err(|e| RenderError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if document.is_encrypted() {
            if document.decrypt("").is_err() {
                return Err(RenderError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
        }

        let pages: Vec<ObjectId> = document.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(RenderError::NoPages);
        }

        debug!("Loaded PDF with {} pages", pages.len());
        let rasters = pages.iter().map(|_| OnceCell::new()).collect();
        Ok(Self {
            document,
            pages,
            rasters,
        })
    }

    /// Page size in page units, from the (possibly inherited) MediaBox.
    fn page_size(&self, page_id: ObjectId) -> (f32, f32) {
        let media_box = inherited_attribute(&self.document, page_id, b"MediaBox")
            .and_then(|obj| match obj {
                Object::Array(values) if values.len() == 4 => {
                    let nums: Vec<f32> = values.iter().filter_map(|v| number(&self.document, v)).collect();
                    (nums.len() == 4).then(|| ((nums[2] - nums[0]).abs(), (nums[3] - nums[1]).abs()))
                }
                _ => None,
            })
            .filter(|(w, h)| *w > 0.0 && *h > 0.0);

        media_box.unwrap_or_else(|| {
            trace!("Page {:?} has no usable MediaBox, assuming A4", page_id);
            DEFAULT_PAGE_SIZE
        })
    }

    /// Clockwise display rotation of the page: 0, 90, 180 or 270.
    fn rotation(&self, page_id: ObjectId) -> u32 {
        let degrees = inherited_attribute(&self.document, page_id, b"Rotate")
            .and_then(|obj| obj.as_i64().ok())
            .unwrap_or(0)
            .rem_euclid(360);
        match degrees {
            90 | 180 | 270 => degrees as u32,
            0 => 0,
            other => {
                trace!("Ignoring /Rotate {} on page {:?}", other, page_id);
                0
            }
        }
    }

    /// The page raster as displayed, decoded and rotated once per page.
    fn displayed_raster(&self, page_index: usize, page_id: ObjectId) -> Result<Option<&DynamicImage>> {
        let cached = self.rasters[page_index].get_or_init(|| {
            let raster = self.page_raster(page_id).map_err(|e| match e {
                RenderError::Decode(message) => message,
                other => other.to_string(),
            })?;
            Ok(raster.map(|img| match self.rotation(page_id) {
                90 => img.rotate90(),
                180 => img.rotate180(),
                270 => img.rotate270(),
                _ => img,
            }))
        });
        match cached {
            Ok(raster) => Ok(raster.as_ref()),
            Err(message) => Err(RenderError::Decode(message.clone())),
        }
    }

    /// Decode the largest raster image placed on the page.
    ///
    /// `Ok(None)` when the page has no image XObjects at all.
    fn page_raster(&self, page_id: ObjectId) -> Result<Option<DynamicImage>> {
        let doc = &self.document;
        let Some(resources) = inherited_attribute(doc, page_id, b"Resources")
            .and_then(|obj| obj.as_dict().ok().cloned())
        else {
            return Ok(None);
        };

        let Ok(xobjects) = resources.get(b"XObject") else {
            return Ok(None);
        };
        let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) else {
            return Ok(None);
        };

        let mut seen_images = 0usize;
        let mut best: Option<DynamicImage> = None;
        for (_name, obj_ref) in xobj_dict.iter() {
            let Ok((_, obj)) = doc.dereference(obj_ref) else {
                continue;
            };
            let Object::Stream(stream) = obj else {
                continue;
            };
            if !is_image(&stream.dict) {
                continue;
            }
            seen_images += 1;

            match decode_image(doc, stream) {
                Some(img) => {
                    let area = |i: &DynamicImage| u64::from(i.width()) * u64::from(i.height());
                    if best.as_ref().is_none_or(|b| area(&img) > area(b)) {
                        best = Some(img);
                    }
                }
                None => trace!("Skipping undecodable image on page {:?}", page_id),
            }
        }

        if best.is_none() && seen_images > 0 {
            return Err(RenderError::Decode(format!(
                "none of {} images on the page could be decoded",
                seen_images
            )));
        }
        Ok(best)
    }
}

impl PageRenderer for PdfRenderer {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn render(&self, page_index: usize, region: &Region, dpi: u32) -> Result<DynamicImage> {
        if dpi == 0 {
            return Err(RenderError::InvalidDpi(dpi));
        }
        let page_id = *self.pages.get(page_index).ok_or(RenderError::InvalidPage {
            index: page_index,
            count: self.pages.len(),
        })?;

        let (mut page_w, mut page_h) = self.page_size(page_id);
        if matches!(self.rotation(page_id), 90 | 270) {
            std::mem::swap(&mut page_w, &mut page_h);
        }
        let target_w = scaled(page_w * region.width(), dpi);
        let target_h = scaled(page_h * region.height(), dpi);

        let Some(raster) = self.displayed_raster(page_index, page_id)? else {
            debug!("Page {} has no raster content, rendering blank", page_index + 1);
            return Ok(DynamicImage::ImageLuma8(GrayImage::from_pixel(
                target_w,
                target_h,
                Luma([255]),
            )));
        };

        let (x, y, w, h) = region.pixel_rect(raster.width(), raster.height());
        let cropped = raster.crop_imm(x, y, w, h);
        trace!(
            "Rendered page {} region {:?}: {}x{} crop -> {}x{} at {}dpi",
            page_index + 1,
            region,
            w,
            h,
            target_w,
            target_h,
            dpi
        );
        Ok(cropped.resize_exact(target_w, target_h, FilterType::CatmullRom))
    }
}

/// Look up `key` on a page node, walking up `Parent` links for inherited
/// attributes.
fn inherited_attribute<'a>(doc: &'a Document, node_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(node_id);
    // Bounded walk; malformed trees can contain Parent cycles.
    for _ in 0..32 {
        let dict = doc.get_dictionary(current?).ok()?;
        if let Ok(value) = dict.get(key) {
            return doc.dereference(value).ok().map(|(_, obj)| obj);
        }
        current = match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => Some(*parent_id),
            _ => None,
        };
    }
    None
}

fn number(doc: &Document, obj: &Object) -> Option<f32> {
    match doc.dereference(obj).ok()?.1 {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn is_image(dict: &Dictionary) -> bool {
    dict.get(b"Subtype")
        .ok()
        .and_then(|o| o.as_name().ok())
        .is_some_and(|name| name == b"Image")
}

fn decode_image(doc: &Document, stream: &lopdf::Stream) -> Option<DynamicImage> {
    let dict = &stream.dict;
    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;

    trace!("Found image object: {}x{}", width, height);

    if let Ok(filter) = dict.get(b"Filter") {
        let filter_name = match filter {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.last().and_then(|o| o.as_name().ok()),
            _ => None,
        };

        match filter_name {
            Some(b"DCTDecode") => {
                return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg).ok();
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Unsupported image filter: {:?}", filter_name.map(String::from_utf8_lossy));
                return None;
            }
            _ => {}
        }
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceGray");

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);

    image_from_raw(&data, width, height, color_space, bits)
}

fn image_from_raw(data: &[u8], width: u32, height: u32, color_space: &[u8], bits: i64) -> Option<DynamicImage> {
    let (w, h) = (width as usize, height as usize);
    match (color_space, bits) {
        (b"DeviceRGB" | b"RGB", 8) => {
            let expected = w * h * 3;
            let buf = data.get(..expected)?.to_vec();
            ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buf).map(DynamicImage::ImageRgb8)
        }
        (b"DeviceGray" | b"G", 8) => {
            let expected = w * h;
            let buf = data.get(..expected)?.to_vec();
            ImageBuffer::<Luma<u8>, _>::from_raw(width, height, buf).map(DynamicImage::ImageLuma8)
        }
        (b"DeviceGray" | b"G", 1) => {
            // Rows are padded to whole bytes; 1 means white.
            let row_bytes = w.div_ceil(8);
            let packed = data.get(..row_bytes * h)?;
            let img = GrayImage::from_fn(width, height, |x, y| {
                let byte = packed[y as usize * row_bytes + x as usize / 8];
                let bit = (byte >> (7 - (x % 8))) & 1;
                Luma([if bit == 1 { 255 } else { 0 }])
            });
            Some(DynamicImage::ImageLuma8(img))
        }
        _ => {
            trace!(
                "Could not decode image: colorspace={:?}, bits={}, data_len={}",
                String::from_utf8_lossy(color_space),
                bits,
                data.len()
            );
            None
        }
    }
}
