//! PDF module - Page text and page rendering
//!
//! Extraction logic only talks to [`PageSource`], so the search pipeline runs
//! the same against PDFium documents and in-memory fixtures.

mod pdfium;

pub use pdfium::{bind_pdfium, PdfiumDocument};

use image::DynamicImage;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to load PDFium library: {0}")]
    Library(String),
    #[error("Failed to open {path}: {message}")]
    Open { path: String, message: String },
    #[error("Page {index} is out of range ({count} pages)")]
    PageOutOfRange { index: usize, count: usize },
    #[error("Page {index}: {message}")]
    Page { index: usize, message: String },
    #[error("Page {index}: clip region is empty after scaling")]
    EmptyClip { index: usize },
}

/// Rectangle in page points with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageRect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

/// A run of text on a page with its bounds.
#[derive(Debug, Clone)]
pub struct TextSpan {
    pub text: String,
    pub rect: PageRect,
}

/// Embedded objects on one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ObjectCounts {
    /// Raster images
    pub images: usize,
    /// Vector drawing paths
    pub paths: usize,
}

/// Read access to the pages of one document.
pub trait PageSource {
    /// Document name used for output filenames and logs.
    fn name(&self) -> &str;

    fn page_count(&self) -> usize;

    /// Page width and height in points.
    fn page_size(&self, index: usize) -> Result<(f32, f32), PdfError>;

    /// Text spans in reading order.
    fn text_spans(&self, index: usize) -> Result<Vec<TextSpan>, PdfError>;

    /// Full page text.
    fn page_text(&self, index: usize) -> Result<String, PdfError>;

    fn object_counts(&self, index: usize) -> Result<ObjectCounts, PdfError>;

    /// Render the whole page, scaled by `zoom` (1.0 = 72 dpi).
    fn render(&self, index: usize, zoom: f32) -> Result<DynamicImage, PdfError>;
}

/// Render a page and crop it to `clip` (page points).
pub fn render_clip<S: PageSource + ?Sized>(
    source: &S,
    index: usize,
    zoom: f32,
    clip: PageRect,
) -> Result<DynamicImage, PdfError> {
    let (page_w, page_h) = source.page_size(index)?;
    let rendered = source.render(index, zoom)?;
    let (img_w, img_h) = (rendered.width(), rendered.height());

    let scale_x = img_w as f32 / page_w;
    let scale_y = img_h as f32 / page_h;

    let left = (clip.x0.max(0.0) * scale_x).floor().clamp(0.0, img_w as f32) as u32;
    let right = (clip.x1.min(page_w) * scale_x).ceil().clamp(0.0, img_w as f32) as u32;
    let top = (clip.y0.max(0.0) * scale_y).floor().clamp(0.0, img_h as f32) as u32;
    let bottom = (clip.y1.min(page_h) * scale_y).ceil().clamp(0.0, img_h as f32) as u32;

    if right <= left || bottom <= top {
        return Err(PdfError::EmptyClip { index });
    }

    Ok(rendered.crop_imm(left, top, right - left, bottom - top))
}
