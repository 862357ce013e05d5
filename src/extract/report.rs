//! Report Module
//! HTML reports, JSON manifests and the plain-text batch summary.

use super::batch::BatchSummary;
use super::pipeline::{DocumentResult, Outcome};
use super::ExtractError;
use aho_corasick::AhoCorasick;
use chrono::Local;
use once_cell::sync::Lazy;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// Automaton is built once, on first use
static HTML_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::new(["&", "<", ">", "\"", "'"]).expect("valid escape patterns")
});

const STYLE_DOCUMENT: &str = "
        body { font-family: Arial, sans-serif; margin: 20px; }
        h1, h2, h3 { color: #333; }
        .plot-section { margin-bottom: 40px; border-bottom: 1px solid #ccc; padding-bottom: 20px; }
        .plot-image img { max-width: 100%; border: 1px solid #ddd; }
        .fallback { background-color: #fff3cd; }";

const STYLE_COMBINED: &str = "
        body { font-family: Arial, sans-serif; margin: 20px; }
        h1, h2, h3 { color: #333; }
        .chart-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(500px, 1fr)); gap: 20px; }
        .chart-card { border: 1px solid #ccc; border-radius: 5px; padding: 15px; }
        .chart-card img { width: 100%; height: auto; border: 1px solid #eee; }
        .chart-card h3 { margin-top: 0; }
        .fallback { background-color: #fff3cd; }";

/// Writes every report into one logs directory.
pub struct ReportWriter {
    logs_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(logs_dir: &Path) -> Self {
        Self {
            logs_dir: logs_dir.to_path_buf(),
        }
    }

    pub fn document_report_path(&self, name: &str) -> PathBuf {
        self.logs_dir.join(format!("{name}_chart_report.html"))
    }

    pub fn manifest_path(&self, name: &str) -> PathBuf {
        self.logs_dir.join(format!("{name}_results.json"))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.logs_dir.join("extraction_summary.txt")
    }

    pub fn combined_report_path(&self) -> PathBuf {
        self.logs_dir.join("all_charts_report.html")
    }

    /// JSON manifest always; HTML report only when something was captured.
    pub fn write_document(&self, result: &DocumentResult) -> Result<(), ExtractError> {
        fs::create_dir_all(&self.logs_dir)?;

        let json = serde_json::to_string_pretty(result)?;
        fs::write(self.manifest_path(&result.name), json)?;

        if let Some((image, fallback)) = result.capture_image() {
            let path = self.document_report_path(&result.name);
            fs::write(&path, self.document_html(result, image, fallback))?;
            info!("HTML report saved to {}", path.display());
        }
        Ok(())
    }

    fn document_html(&self, result: &DocumentResult, image: &Path, fallback: bool) -> String {
        let (page, indicator) = match &result.outcome {
            Outcome::Found(c) => (c.page + 1, c.indicator_text.as_str()),
            Outcome::WholePage(p) => (p.page + 1, "Whole page fallback"),
            Outcome::NotFound { .. } => (0, "Unknown"),
        };
        let section_class = if fallback {
            "plot-section fallback"
        } else {
            "plot-section"
        };

        format!(
            "<!DOCTYPE html>
<html>
<head>
    <title>Chart Extraction Report</title>
    <style>{STYLE_DOCUMENT}
    </style>
</head>
<body>
    <h1>Chart Extraction Report</h1>
    <h2>PDF: {name}</h2>
    <p>Pages: {pages}</p>
    <div class=\"{section_class}\">
        <h3>Chart - Page {page}</h3>
        <p>Indicator text: <strong>{indicator}</strong></p>
        <div class=\"plot-image\">
            <img src=\"{src}\" alt=\"Chart from {name}\">
        </div>
    </div>
</body>
</html>
",
            name = escape_html(&result.name),
            pages = result.total_pages,
            indicator = escape_html(indicator),
            src = escape_html(&self.relative_link(image)),
        )
    }

    /// Totals, successes, failures and failed document names.
    pub fn write_summary(&self, summary: &BatchSummary) -> Result<PathBuf, ExtractError> {
        fs::create_dir_all(&self.logs_dir)?;

        let mut text = String::from("Chart Extraction Summary\n");
        text.push_str("========================\n\n");
        text.push_str(&format!("Total PDFs processed: {}\n", summary.total));
        text.push_str(&format!("Successfully extracted charts: {}\n", summary.successes()));
        text.push_str(&format!("Whole-page fallbacks: {}\n", summary.whole_page_count()));
        text.push_str(&format!("Failed extractions: {}\n", summary.failed.len()));
        if !summary.failed.is_empty() {
            text.push_str("\nFailed PDFs:\n");
            for name in &summary.failed {
                text.push_str(&format!("- {name}\n"));
            }
        }

        let path = self.summary_path();
        fs::write(&path, text)?;
        Ok(path)
    }

    /// One card per captured document; fallback captures are highlighted.
    pub fn write_combined(&self, summary: &BatchSummary) -> Result<PathBuf, ExtractError> {
        fs::create_dir_all(&self.logs_dir)?;

        let captured: Vec<(&DocumentResult, &Path, bool)> = summary
            .results
            .iter()
            .filter_map(|r| r.capture_image().map(|(image, fallback)| (r, image, fallback)))
            .collect();

        let mut html = format!(
            "<!DOCTYPE html>
<html>
<head>
    <title>All Extracted Charts</title>
    <style>{STYLE_COMBINED}
    </style>
</head>
<body>
    <header>
        <h1>Combined Charts Report</h1>
        <p>Generated on {generated}</p>
    </header>
    <h2>Charts Extracted: {count} out of {total}</h2>
    <div class=\"chart-grid\">
",
            generated = Local::now().format("%Y-%m-%d at %H:%M:%S"),
            count = captured.len(),
            total = summary.total,
        );

        for (result, image, fallback) in captured {
            let (class, tag) = if fallback {
                ("chart-card fallback", " (Fallback)")
            } else {
                ("chart-card", "")
            };
            let name = escape_html(&result.name);
            html.push_str(&format!(
                "        <div class=\"{class}\">
            <h3>{name}{tag}</h3>
            <img src=\"{src}\" alt=\"Chart from {name}\">
        </div>
",
                src = escape_html(&self.relative_link(image)),
            ));
        }

        html.push_str("    </div>\n</body>\n</html>\n");

        let path = self.combined_report_path();
        fs::write(&path, html)?;
        Ok(path)
    }

    /// Link to `image` as seen from the logs directory.
    fn relative_link(&self, image: &Path) -> String {
        let Some(file_name) = image.file_name().map(|f| f.to_string_lossy()) else {
            return image.display().to_string();
        };
        match image.parent() {
            Some(parent) if parent == self.logs_dir => file_name.to_string(),
            Some(parent) if Some(parent) == self.logs_dir.parent() => format!("../{file_name}"),
            _ => image.display().to_string(),
        }
    }
}

fn escape_html(text: &str) -> String {
    HTML_ESCAPER.replace_all(text, &["&amp;", "&lt;", "&gt;", "&quot;", "&#39;"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, CandidateRegion};
    use crate::extract::pipeline::{CaptureKind, ChartCapture, PageCapture};

    fn found(name: &str, out: &Path, kind: CaptureKind) -> DocumentResult {
        DocumentResult {
            name: name.to_string(),
            total_pages: 12,
            outcome: Outcome::Found(ChartCapture {
                page: 2,
                kind,
                indicator_text: "Average Retail Selling Price".to_string(),
                render_path: out.join("logs").join(format!("{name}_chart.png")),
                crop_path: out.join(format!("{name}_chart_cropped.png")),
                bbox_path: out.join("logs").join(format!("{name}_chart_bbox.png")),
                region: CandidateRegion {
                    bbox: BoundingBox { x: 10, y: 20, width: 300, height: 200 },
                    area: 59_000.0,
                },
            }),
            detected_keywords: vec!["Average Retail Selling Price".to_string()],
        }
    }

    fn summary(out: &Path) -> BatchSummary {
        BatchSummary {
            total: 4,
            results: vec![
                found("05_2019", out, CaptureKind::Anchored),
                found("06_2019", out, CaptureKind::Fallback),
                DocumentResult {
                    name: "07_2019".to_string(),
                    total_pages: 8,
                    outcome: Outcome::WholePage(PageCapture {
                        page: 4,
                        image_path: out.join("logs/07_2019_chart_fallback.png"),
                    }),
                    detected_keywords: vec![],
                },
                DocumentResult {
                    name: "08_2019".to_string(),
                    total_pages: 9,
                    outcome: Outcome::NotFound {
                        error: "No chart found".to_string(),
                    },
                    detected_keywords: vec![],
                },
            ],
            failed: vec!["08_2019".to_string()],
        }
    }

    #[test]
    fn document_report_and_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let logs = dir.path().join("logs");
        let writer = ReportWriter::new(&logs);
        let result = found("05_2019", dir.path(), CaptureKind::Anchored);

        writer.write_document(&result).expect("write reports");

        let html = fs::read_to_string(logs.join("05_2019_chart_report.html")).expect("html");
        assert!(html.contains("Chart - Page 3"));
        assert!(html.contains("src=\"../05_2019_chart_cropped.png\""));

        let json: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(logs.join("05_2019_results.json")).expect("json"),
        )
        .expect("valid json");
        assert_eq!(json["outcome"]["status"], "found");
        assert_eq!(json["outcome"]["kind"], "anchored");
        assert_eq!(json["outcome"]["region"]["bbox"]["width"], 300);
    }

    #[test]
    fn not_found_gets_manifest_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = ReportWriter::new(dir.path());
        let s = summary(dir.path());

        writer.write_document(&s.results[3]).expect("write reports");
        assert!(writer.manifest_path("08_2019").exists());
        assert!(!writer.document_report_path("08_2019").exists());
    }

    #[test]
    fn summary_lists_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = ReportWriter::new(dir.path());

        let path = writer.write_summary(&summary(dir.path())).expect("summary");
        let text = fs::read_to_string(path).expect("read");
        assert!(text.contains("Total PDFs processed: 4"));
        assert!(text.contains("Successfully extracted charts: 3"));
        assert!(text.contains("Whole-page fallbacks: 1"));
        assert!(text.contains("Failed extractions: 1"));
        assert!(text.contains("- 08_2019"));
    }

    #[test]
    fn combined_report_highlights_fallbacks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let logs = dir.path().join("logs");
        let writer = ReportWriter::new(&logs);

        let path = writer.write_combined(&summary(dir.path())).expect("combined");
        let html = fs::read_to_string(path).expect("read");
        assert!(html.contains("Charts Extracted: 3 out of 4"));
        assert_eq!(html.matches("chart-card fallback").count(), 2);
        assert!(html.contains("src=\"../05_2019_chart_cropped.png\""));
        assert!(html.contains("src=\"07_2019_chart_fallback.png\""));
        assert!(!html.contains("08_2019"));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<a & \"b\">"), "&lt;a &amp; &quot;b&quot;&gt;");
        assert_eq!(escape_html("Dealer's &amp; co"), "Dealer&#39;s &amp;amp; co");
        assert_eq!(escape_html("05_2019"), "05_2019");
    }
}
