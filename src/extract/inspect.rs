//! Page Inventory
//! Counts embedded raster images and vector drawings per page and keeps a
//! full-page render of each, for surveying what a report embeds.

use super::ExtractError;
use crate::pdf::{bind_pdfium, ObjectCounts, PageSource, PdfiumDocument, TextSpan};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Span tops closer than this (points) share a text row
const ROW_TOLERANCE: f32 = 2.0;

#[derive(Debug, Clone, Serialize)]
pub struct PageInventory {
    /// 0-based page index
    pub page: usize,
    #[serde(flatten)]
    pub objects: ObjectCounts,
    pub table_like: bool,
    pub render_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentInventory {
    pub name: String,
    pub total_pages: usize,
    pub pages: Vec<PageInventory>,
}

/// At least two text rows each holding two or more separate spans.
pub fn is_table_like(spans: &[TextSpan]) -> bool {
    let mut tops: Vec<f32> = spans
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| s.rect.y0)
        .collect();
    tops.sort_by(|a, b| a.total_cmp(b));

    tops.chunk_by(|a, b| b - a <= ROW_TOLERANCE)
        .filter(|row| row.len() >= 2)
        .count()
        >= 2
}

/// Writes inventories and page renders into one directory.
pub struct PageInspector {
    output_dir: PathBuf,
    zoom: f32,
}

impl PageInspector {
    pub fn new(output_dir: &Path, zoom: f32) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            zoom,
        }
    }

    pub fn inventory_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{name}_inventory.json"))
    }

    pub fn render_path(&self, name: &str, page: usize) -> PathBuf {
        self.output_dir.join(format!("{name}_page_{}_full.png", page + 1))
    }

    /// Open and inspect each PDF; documents that fail are logged and skipped.
    pub fn run(
        &self,
        files: &[PathBuf],
        library_dir: Option<&Path>,
    ) -> Result<Vec<DocumentInventory>, ExtractError> {
        let pdfium = bind_pdfium(library_dir)?;

        let mut inventories = Vec::new();
        for (i, path) in files.iter().enumerate() {
            info!("[{}/{}] Inspecting {}", i + 1, files.len(), path.display());
            let inventory = PdfiumDocument::open(&pdfium, path)
                .map_err(ExtractError::from)
                .and_then(|document| self.inspect(&document));
            match inventory {
                Ok(inventory) => inventories.push(inventory),
                Err(e) => error!("Failed to inspect {}: {}", path.display(), e),
            }
        }
        Ok(inventories)
    }

    /// Survey every page of one document and write its JSON inventory.
    pub fn inspect<S: PageSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<DocumentInventory, ExtractError> {
        fs::create_dir_all(&self.output_dir)?;

        let inventory = DocumentInventory {
            name: source.name().to_string(),
            total_pages: source.page_count(),
            pages: (0..source.page_count())
                .map(|page| self.inspect_page(source, page))
                .collect(),
        };

        let path = self.inventory_path(&inventory.name);
        fs::write(&path, serde_json::to_string_pretty(&inventory)?)?;
        info!("Inventory saved to {}", path.display());
        Ok(inventory)
    }

    fn inspect_page<S: PageSource + ?Sized>(&self, source: &S, page: usize) -> PageInventory {
        self.survey(source, page).unwrap_or_else(|e| {
            warn!("{} page {}: {}", source.name(), page + 1, e);
            PageInventory {
                page,
                objects: ObjectCounts::default(),
                table_like: false,
                render_path: None,
                error: Some(e.to_string()),
            }
        })
    }

    fn survey<S: PageSource + ?Sized>(
        &self,
        source: &S,
        page: usize,
    ) -> Result<PageInventory, ExtractError> {
        let objects = source.object_counts(page)?;
        let table_like = is_table_like(&source.text_spans(page)?);

        let render_path = self.render_path(source.name(), page);
        source.render(page, self.zoom)?.save(&render_path)?;

        info!(
            "Page {}: {} embedded image(s), {} vector drawing(s){}",
            page + 1,
            objects.images,
            objects.paths,
            if table_like { ", possible table" } else { "" }
        );
        Ok(PageInventory {
            page,
            objects,
            table_like,
            render_path: Some(render_path),
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixture::{FixtureDocument, FixturePage};
    use crate::pdf::PageRect;

    fn spans(lines: &[(&str, f32)]) -> Vec<TextSpan> {
        FixturePage::text(lines).spans
    }

    #[test]
    fn table_needs_two_multi_span_rows() {
        assert!(is_table_like(&spans(&[
            ("Jan", 100.0),
            ("120", 100.5),
            ("Feb", 120.0),
            ("125", 121.0),
        ])));
        // One row of cells is a heading, not a table
        assert!(!is_table_like(&spans(&[("Month", 100.0), ("Price", 100.0)])));
        assert!(!is_table_like(&spans(&[
            ("A paragraph", 100.0),
            ("of running", 114.0),
            ("text", 128.0),
        ])));
        assert!(!is_table_like(&spans(&[(" ", 100.0), ("x", 100.0), ("", 130.0), ("y", 130.0)])));
    }

    #[test]
    fn inspect_writes_renders_and_inventory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let inspector = PageInspector::new(&dir.path().join("inventory"), 1.0);

        let mut broken = FixturePage::text(&[("Appendix", 40.0)]).with_objects(1, 0);
        broken.fail_render = true;
        let doc = FixtureDocument::new(
            "05_2019",
            vec![
                FixturePage::text(&[("Jan", 100.0), ("120", 100.0), ("Feb", 120.0), ("125", 120.0)])
                    .with_chart(PageRect::new(100.0, 150.0, 500.0, 400.0))
                    .with_objects(2, 15),
                broken,
            ],
        );

        let inventory = inspector.inspect(&doc).expect("inspect");
        assert_eq!(inventory.total_pages, 2);

        let first = &inventory.pages[0];
        assert_eq!(first.objects, ObjectCounts { images: 2, paths: 15 });
        assert!(first.table_like);
        let render = first.render_path.as_ref().expect("rendered");
        assert_eq!(render, &inspector.render_path("05_2019", 0));
        assert!(render.ends_with("05_2019_page_1_full.png"));
        let image = image::open(render).expect("render readable");
        assert_eq!((image.width(), image.height()), (600, 800));

        let second = &inventory.pages[1];
        assert!(second.render_path.is_none());
        assert!(second.error.as_deref().unwrap_or_default().contains("render failed"));

        let json: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(inspector.inventory_path("05_2019")).expect("json"),
        )
        .expect("valid json");
        assert_eq!(json["pages"][0]["images"], 2);
        assert_eq!(json["pages"][0]["paths"], 15);
        assert_eq!(json["pages"][0]["table_like"], true);
        assert!(json["pages"][0].get("error").is_none());
        assert!(json["pages"][1]["render_path"].is_null());
    }
}
