//! PDFium-backed page source.
//!
//! PDFium reports coordinates bottom-up; spans are flipped to a top-left
//! origin here so the rest of the crate never sees PDF user space.

use super::{ObjectCounts, PageRect, PageSource, PdfError, TextSpan};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;

/// Bind to the pdfium shared library.
///
/// Searches, in order: `library_dir` (or `./` when unset), then the system
/// library paths.
pub fn bind_pdfium(library_dir: Option<&Path>) -> Result<Pdfium, PdfError> {
    let local = Pdfium::pdfium_platform_library_name_at_path(library_dir.unwrap_or(Path::new("./")));
    let bindings = Pdfium::bind_to_library(local)
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| {
            PdfError::Library(format!(
                "{e:?}. Place libpdfium next to the binary, set pdfium_library_dir, or install it system-wide"
            ))
        })?;

    Ok(Pdfium::new(bindings))
}

/// An open PDF document.
pub struct PdfiumDocument<'a> {
    name: String,
    document: PdfDocument<'a>,
}

impl<'a> PdfiumDocument<'a> {
    pub fn open(pdfium: &'a Pdfium, path: &Path) -> Result<Self, PdfError> {
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| PdfError::Open {
                path: path.display().to_string(),
                message: format!("{e:?}"),
            })?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());

        Ok(Self { name, document })
    }

    fn page(&self, index: usize) -> Result<PdfPage<'a>, PdfError> {
        let count = self.page_count();
        let page_index = u16::try_from(index)
            .ok()
            .filter(|_| index < count)
            .ok_or(PdfError::PageOutOfRange { index, count })?;

        self.document
            .pages()
            .get(page_index)
            .map_err(|e| page_err(index, e))
    }
}

fn page_err(index: usize, err: PdfiumError) -> PdfError {
    PdfError::Page {
        index,
        message: format!("{err:?}"),
    }
}

impl PageSource for PdfiumDocument<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_size(&self, index: usize) -> Result<(f32, f32), PdfError> {
        let page = self.page(index)?;
        Ok((page.width().value, page.height().value))
    }

    #[allow(deprecated)] // PdfRect field access deprecated in 0.8.28
    fn text_spans(&self, index: usize) -> Result<Vec<TextSpan>, PdfError> {
        let page = self.page(index)?;
        let page_height = page.height().value;
        let text = page.text().map_err(|e| page_err(index, e))?;
        let segments = text.segments();

        Ok(segments
            .iter()
            .map(|segment| {
                let bounds = segment.bounds();
                TextSpan {
                    text: segment.text(),
                    rect: PageRect::new(
                        bounds.left.value,
                        page_height - bounds.top.value,
                        bounds.right.value,
                        page_height - bounds.bottom.value,
                    ),
                }
            })
            .collect())
    }

    fn page_text(&self, index: usize) -> Result<String, PdfError> {
        let page = self.page(index)?;
        let text = page.text().map_err(|e| page_err(index, e))?;
        Ok(text.all())
    }

    fn object_counts(&self, index: usize) -> Result<ObjectCounts, PdfError> {
        let page = self.page(index)?;
        let mut counts = ObjectCounts::default();
        for object in page.objects().iter() {
            match object.object_type() {
                PdfPageObjectType::Image => counts.images += 1,
                PdfPageObjectType::Path => counts.paths += 1,
                _ => {}
            }
        }
        Ok(counts)
    }

    fn render(&self, index: usize, zoom: f32) -> Result<DynamicImage, PdfError> {
        let page = self.page(index)?;
        let config = PdfRenderConfig::new().scale_page_by_factor(zoom);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| page_err(index, e))?;

        Ok(bitmap.as_image())
    }
}
