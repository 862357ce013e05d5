//! Append-only CSV error log.

use super::ExtractError;
use chrono::Local;
use polars::prelude::*;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const COLUMNS: [&str; 6] = [
    "pdf_name",
    "pdf_path",
    "timestamp",
    "error",
    "pages_checked",
    "detected_keywords",
];

/// One failure row.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub source_name: String,
    pub source_path: String,
    pub timestamp: String,
    pub error: String,
    pub pages_checked: usize,
    pub detected_keywords: Vec<String>,
}

impl ErrorRecord {
    /// New record stamped with the local time.
    pub fn now(source_name: &str, source_path: &Path, error: impl Into<String>) -> Self {
        Self {
            source_name: source_name.to_string(),
            source_path: source_path.display().to_string(),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            error: error.into(),
            pages_checked: 0,
            detected_keywords: Vec::new(),
        }
    }

    pub fn pages_checked(mut self, pages: usize) -> Self {
        self.pages_checked = pages;
        self
    }

    pub fn keywords(mut self, keywords: Vec<String>) -> Self {
        self.detected_keywords = keywords;
        self
    }

    fn to_frame(&self) -> PolarsResult<DataFrame> {
        df!(
            COLUMNS[0] => [self.source_name.as_str()],
            COLUMNS[1] => [self.source_path.as_str()],
            COLUMNS[2] => [self.timestamp.as_str()],
            COLUMNS[3] => [self.error.as_str()],
            COLUMNS[4] => [self.pages_checked as u64],
            COLUMNS[5] => [self.detected_keywords.join(";")]
        )
    }
}

/// Error CSV shared by every document of a run.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with its header row if it does not exist yet.
    pub fn ensure_header(&self) -> Result<(), ExtractError> {
        if self.has_content() {
            return Ok(());
        }
        self.create_parent()?;

        let mut empty = DataFrame::new(
            COLUMNS
                .iter()
                .map(|name| Column::new((*name).into(), Vec::<String>::new()))
                .collect(),
        )?;
        let mut file = fs::File::create(&self.path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut empty)?;
        Ok(())
    }

    /// Append one row, writing the header first for a new file.
    pub fn append(&self, record: &ErrorRecord) -> Result<(), ExtractError> {
        let write_header = !self.has_content();
        self.create_parent()?;

        let mut frame = record.to_frame()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        CsvWriter::new(&mut file)
            .include_header(write_header)
            .finish(&mut frame)?;
        Ok(())
    }

    /// Append, reporting failures through tracing instead of the caller.
    pub fn record(&self, record: &ErrorRecord) {
        if let Err(e) = self.append(record) {
            warn!("Failed to log error for {}: {}", record.source_name, e);
        }
    }

    fn has_content(&self) -> bool {
        fs::metadata(&self.path)
            .map(|m| m.len() > 0)
            .unwrap_or(false)
    }

    fn create_parent(&self) -> Result<(), ExtractError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> ErrorRecord {
        ErrorRecord {
            source_name: name.to_string(),
            source_path: format!("/pdfs/{name}.pdf"),
            timestamp: "2024-05-01 10:00:00".to_string(),
            error: "No chart found".to_string(),
            pages_checked: 12,
            detected_keywords: vec!["Retail Price".to_string(), "Avg. Price".to_string()],
        }
    }

    #[test]
    fn append_writes_header_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = ErrorLog::new(dir.path().join("logs/errors.csv"));

        log.append(&record("05_2019")).expect("first append");
        log.append(&record("06_2019")).expect("second append");

        let text = fs::read_to_string(log.path()).expect("read log");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "pdf_name,pdf_path,timestamp,error,pages_checked,detected_keywords"
        );
        assert_eq!(
            lines[1],
            "05_2019,/pdfs/05_2019.pdf,2024-05-01 10:00:00,No chart found,12,Retail Price;Avg. Price"
        );
        assert!(lines[2].starts_with("06_2019,"));
    }

    #[test]
    fn ensure_header_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = ErrorLog::new(dir.path().join("errors.csv"));

        log.ensure_header().expect("header");
        log.ensure_header().expect("header again");
        log.append(&record("a")).expect("append");

        let text = fs::read_to_string(log.path()).expect("read log");
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("pdf_name,"));
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = ErrorLog::new(dir.path().join("errors.csv"));
        let mut rec = record("x");
        rec.error = "Exception: bad xref, offset 12".to_string();

        log.append(&rec).expect("append");
        let text = fs::read_to_string(log.path()).expect("read log");
        assert!(text.contains("\"Exception: bad xref, offset 12\""));
    }

    #[test]
    fn builder_sets_counts_and_timestamp() {
        let rec = ErrorRecord::now("doc", Path::new("/in/doc.pdf"), "File does not exist")
            .pages_checked(0)
            .keywords(vec!["k".to_string()]);
        assert_eq!(rec.source_path, "/in/doc.pdf");
        assert_eq!(rec.timestamp.len(), 19);
        assert_eq!(rec.detected_keywords, vec!["k".to_string()]);
    }
}
