//! Page rendering: rasterize fractional regions of document pages.

mod renderer;

pub use renderer::PdfRenderer;

use image::DynamicImage;

use crate::error::RenderError;

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Resolution at which one page unit maps to one pixel.
pub const NATIVE_DPI: u32 = 72;

/// A rectangle in fractional page coordinates (`0.0..=1.0`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Region {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    /// Pixel rectangle `(x, y, w, h)` of this region on a `width` x `height`
    /// raster. Always at least one pixel and always inside the raster.
    pub fn pixel_rect(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let clamp = |v: f32| v.clamp(0.0, 1.0);
        let x = ((width as f32) * clamp(self.x0)).floor() as u32;
        let y = ((height as f32) * clamp(self.y0)).floor() as u32;
        let x_end = ((width as f32) * clamp(self.x1)).ceil() as u32;
        let y_end = ((height as f32) * clamp(self.y1)).ceil() as u32;
        let x = x.min(width.saturating_sub(1));
        let y = y.min(height.saturating_sub(1));
        let w = x_end.min(width).saturating_sub(x).max(1);
        let h = y_end.min(height).saturating_sub(y).max(1);
        (x, y, w, h)
    }
}

/// Header bands scanned in priority order: left, center, right.
pub const REGIONS: [Region; 3] = [
    Region::new(0.00, 0.00, 0.50, 0.28),
    Region::new(0.25, 0.00, 0.75, 0.30),
    Region::new(0.50, 0.00, 1.00, 0.32),
];

/// The whole page, used by the full-page fallback.
pub const FULL_PAGE: Region = Region::new(0.0, 0.0, 1.0, 1.0);

/// Trait for anything that can rasterize regions of an opened document.
pub trait PageRenderer {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Render `region` of page `page_index` (0-based) at `dpi`.
    ///
    /// Output size scales linearly with `dpi`; at [`NATIVE_DPI`] one page
    /// unit is one pixel. Fails without producing an image when the page
    /// does not exist.
    fn render(&self, page_index: usize, region: &Region, dpi: u32) -> Result<DynamicImage>;
}

/// Pixel size of `extent` page units at `dpi`.
pub(crate) fn scaled(extent: f32, dpi: u32) -> u32 {
    ((extent * dpi as f32) / NATIVE_DPI as f32).round().max(1.0) as u32
}
