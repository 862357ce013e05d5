//! Batch Runner
//! Processes a directory (or explicit list) of PDFs one document at a time.

use super::error_log::{ErrorLog, ErrorRecord};
use super::pipeline::{ChartSearch, DocumentResult, Outcome};
use super::report::ReportWriter;
use super::ExtractError;
use crate::config::Config;
use crate::pdf::{bind_pdfium, PageSource, PdfiumDocument};
use pdfium_render::prelude::Pdfium;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// `*.pdf` files (any case) directly inside `dir`, sorted by path.
pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_pdf(path))
        .collect();
    files.sort();
    Ok(files)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Documents attempted, including ones that could not be opened
    pub total: usize,
    pub results: Vec<DocumentResult>,
    /// Names of documents without any capture
    pub failed: Vec<String>,
}

impl BatchSummary {
    pub fn successes(&self) -> usize {
        self.results.iter().filter(|r| r.captured()).count()
    }

    pub fn whole_page_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::WholePage(_)))
            .count()
    }
}

/// Runs the chart search over many documents, sharing one error log.
pub struct BatchRunner<'a> {
    config: &'a Config,
    error_log: ErrorLog,
    reports: ReportWriter,
}

impl<'a> BatchRunner<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            error_log: ErrorLog::new(config.error_log_path()),
            reports: ReportWriter::new(&config.logs_dir()),
        }
    }

    /// Process `files`, or every PDF in the configured input directory.
    pub fn run(&self, files: Option<Vec<PathBuf>>) -> Result<BatchSummary, ExtractError> {
        let files = match files {
            Some(files) => files,
            None => list_pdfs(&self.config.input_dir)?,
        };
        info!("Found {} PDF files to process", files.len());

        fs::create_dir_all(&self.config.output_dir)?;
        self.error_log.ensure_header()?;

        let pdfium = bind_pdfium(self.config.pdfium_library_dir.as_deref())?;

        let mut summary = BatchSummary::default();
        for (i, path) in files.iter().enumerate() {
            info!("[{}/{}] Processing {}", i + 1, files.len(), path.display());
            let result = self.process_file(&pdfium, path);
            self.record(&mut summary, path, result);
        }

        self.finish(&summary)?;
        Ok(summary)
    }

    fn process_file(&self, pdfium: &Pdfium, path: &Path) -> Option<DocumentResult> {
        if !path.is_file() {
            warn!("File does not exist: {}", path.display());
            self.error_log
                .record(&ErrorRecord::now(&document_name(path), path, "File does not exist"));
            return None;
        }

        match PdfiumDocument::open(pdfium, path) {
            Ok(document) => self.process_source(&document, path),
            Err(e) => {
                error!("Failed to process {}: {}", path.display(), e);
                self.error_log.record(&ErrorRecord::now(
                    &document_name(path),
                    path,
                    format!("Exception: {e}"),
                ));
                None
            }
        }
    }

    /// Search one open document and write its reports.
    pub fn process_source<S: PageSource + ?Sized>(
        &self,
        source: &S,
        path: &Path,
    ) -> Option<DocumentResult> {
        info!("{} has {} pages", source.name(), source.page_count());
        let search = ChartSearch::new(
            source,
            path,
            &self.config.extract,
            &self.config.output_dir,
            &self.config.logs_dir(),
            Some(&self.error_log),
        );

        let result = match search.run() {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to process {}: {}", source.name(), e);
                self.error_log.record(
                    &ErrorRecord::now(source.name(), path, format!("Exception: {e}"))
                        .pages_checked(source.page_count()),
                );
                return None;
            }
        };

        if let Err(e) = self.reports.write_document(&result) {
            warn!("Failed to write reports for {}: {}", result.name, e);
        }
        Some(result)
    }

    fn record(&self, summary: &mut BatchSummary, path: &Path, result: Option<DocumentResult>) {
        summary.total += 1;
        match result {
            Some(result) => {
                if !result.captured() {
                    summary.failed.push(result.name.clone());
                }
                summary.results.push(result);
            }
            None => summary.failed.push(document_name(path)),
        }
    }

    /// Write the summary and combined report.
    pub fn finish(&self, summary: &BatchSummary) -> Result<(), ExtractError> {
        let summary_path = self.reports.write_summary(summary)?;
        let combined_path = self.reports.write_combined(summary)?;

        info!(
            "Successfully extracted charts from {} out of {} PDFs",
            summary.successes(),
            summary.total
        );
        if !summary.failed.is_empty() {
            warn!(
                "Failed to extract charts from {} PDFs. See {} for details.",
                summary.failed.len(),
                self.error_log.path().display()
            );
        }
        info!("Summary report created at {}", summary_path.display());
        info!("Combined HTML report created at {}", combined_path.display());
        Ok(())
    }
}

fn document_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
