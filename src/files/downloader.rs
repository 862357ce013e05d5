//! PDF Downloader
//! Fetches report PDFs listed in a links CSV, with per-run CSV logs.

use crate::data::{DataLoader, LoaderError};
use chrono::Local;
use polars::prelude::*;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("Failed to load links: {0}")]
    Links(#[from] LoaderError),
    #[error("Links CSV has no '{0}' column")]
    MissingColumn(String),
    #[error("No links found in {0}")]
    NoLinks(PathBuf),
}

/// Counts for one download run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub duplicates: usize,
    pub non_pdf: usize,
    pub errors: usize,
    /// Stopped early because the runtime limit was hit
    pub timed_out: bool,
}

enum Fetch {
    Saved,
    NotPdf(String),
}

/// Header-first CSV log appended one row at a time.
struct LinkLog {
    path: PathBuf,
    columns: &'static [&'static str],
}

impl LinkLog {
    fn create(path: PathBuf, columns: &'static [&'static str]) -> Result<Self, DownloadError> {
        let log = Self { path, columns };
        log.write(vec![Vec::new(); columns.len()], true)?;
        Ok(log)
    }

    fn append(&self, values: &[&str]) -> Result<(), DownloadError> {
        self.write(values.iter().map(|v| vec![v.to_string()]).collect(), false)
    }

    fn write(&self, values: Vec<Vec<String>>, header: bool) -> Result<(), DownloadError> {
        let columns = self
            .columns
            .iter()
            .zip(values)
            .map(|(name, vals)| Column::new((*name).into(), vals))
            .collect();
        let mut frame = DataFrame::new(columns)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(!header)
            .write(true)
            .truncate(header)
            .open(&self.path)?;
        CsvWriter::new(&mut file)
            .include_header(header)
            .finish(&mut frame)?;
        Ok(())
    }

    fn record(&self, values: &[&str]) {
        if let Err(e) = self.append(values) {
            warn!("Failed to write {}: {}", self.path.display(), e);
        }
    }
}

/// Filename for a link: the URL path's last segment if it is a PDF name,
/// else `document_<row>.pdf`.
pub fn filename_for(url: &str, row: usize) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| name.to_lowercase().ends_with(".pdf"))
        .unwrap_or_else(|| format!("document_{row}.pdf"))
}

/// `dir/name`, or `dir/<stem>_<n><ext>` with the first free `n` from 1.
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..)
        .map(|n| dir.join(format!("{stem}_{n}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Link cells in row order; empty cells are `None`.
pub fn read_links(csv: &Path, column: &str) -> Result<Vec<Option<String>>, DownloadError> {
    let mut loader = DataLoader::new();
    loader.load_csv(csv)?;
    if !loader.get_columns().iter().any(|c| c == column) {
        return Err(DownloadError::MissingColumn(column.to_string()));
    }

    let frame = loader.into_dataframe()?;
    let links = frame.column(column)?.cast(&DataType::String)?;
    Ok(links
        .str()?
        .into_iter()
        .map(|v| v.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string))
        .collect())
}

pub struct Downloader {
    client: Client,
    output_dir: PathBuf,
    logs_dir: PathBuf,
    timeout: Duration,
    max_runtime: Duration,
}

impl Downloader {
    pub fn new(
        output_dir: &Path,
        timeout_secs: u64,
        max_runtime_secs: u64,
    ) -> Result<Self, DownloadError> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            output_dir: output_dir.to_path_buf(),
            logs_dir: output_dir.join("logs"),
            timeout,
            max_runtime: Duration::from_secs(max_runtime_secs),
        })
    }

    /// Download every link, skipping empties and already-fetched URLs.
    pub fn run(&self, links: &[Option<String>]) -> Result<DownloadSummary, DownloadError> {
        if links.is_empty() {
            return Err(DownloadError::NoLinks(self.output_dir.clone()));
        }
        fs::create_dir_all(&self.output_dir)?;
        fs::create_dir_all(&self.logs_dir)?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let log_path = |kind: &str| self.logs_dir.join(format!("{kind}_{stamp}.csv"));
        let non_pdf_log = LinkLog::create(log_path("non_pdf_links"), &["URL", "Content-Type"])?;
        let duplicate_log = LinkLog::create(log_path("duplicate_links"), &["URL"])?;
        let error_log = LinkLog::create(log_path("error_links"), &["URL", "Error"])?;

        let start = Instant::now();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut summary = DownloadSummary::default();

        for (row, link) in links.iter().enumerate() {
            if start.elapsed() >= self.max_runtime {
                warn!(
                    "Maximum runtime of {:.1} minutes reached. Stopping.",
                    self.max_runtime.as_secs_f64() / 60.0
                );
                summary.timed_out = true;
                break;
            }
            let Some(url) = link.as_deref() else {
                continue;
            };

            if seen.contains(url) {
                summary.duplicates += 1;
                duplicate_log.record(&[url]);
                continue;
            }

            let dest = unique_path(&self.output_dir, &filename_for(url, row));
            match self.fetch(url, &dest) {
                Ok(Fetch::Saved) => {
                    info!("[{}/{}] Saved {}", row + 1, links.len(), dest.display());
                    seen.insert(url);
                    summary.downloaded += 1;
                }
                Ok(Fetch::NotPdf(content_type)) => {
                    info!("Link is not a PDF: {} (Content-Type: {})", url, content_type);
                    non_pdf_log.record(&[url, content_type.as_str()]);
                    summary.non_pdf += 1;
                }
                Err(e) => {
                    let message = match &e {
                        DownloadError::Http(err) if err.is_timeout() => format!(
                            "Timeout: Request took longer than {} seconds",
                            self.timeout.as_secs()
                        ),
                        other => other.to_string(),
                    };
                    warn!("Error downloading {}: {}", url, message);
                    error_log.record(&[url, message.as_str()]);
                    // Drop any partial file
                    if dest.exists() {
                        let _ = fs::remove_file(&dest);
                    }
                    summary.errors += 1;
                }
            }
        }

        let runtime = format!("{:.1}", start.elapsed().as_secs_f64() / 60.0);
        let summary_log = LinkLog::create(log_path("download_summary"), &["Metric", "Count"])?;
        for (metric, count) in [
            ("Successful Downloads", summary.downloaded.to_string()),
            ("Skipped Duplicates", summary.duplicates.to_string()),
            ("Non-PDF Links", summary.non_pdf.to_string()),
            ("Errors", summary.errors.to_string()),
            ("Runtime (minutes)", runtime.clone()),
        ] {
            summary_log.record(&[metric, count.as_str()]);
        }

        info!("Downloaded {} PDFs.", summary.downloaded);
        info!("Skipped {} duplicate links.", summary.duplicates);
        info!("Disregarded {} non-PDF links.", summary.non_pdf);
        info!("Total runtime: {} minutes", runtime);
        info!("Log files created in {}", self.logs_dir.display());
        Ok(summary)
    }

    fn fetch(&self, url: &str, dest: &Path) -> Result<Fetch, DownloadError> {
        let mut response = self.client.get(url).send()?.error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("application/pdf") && !url.to_lowercase().ends_with(".pdf") {
            return Ok(Fetch::NotPdf(content_type));
        }

        let mut file = fs::File::create(dest)?;
        response.copy_to(&mut file)?;
        Ok(Fetch::Saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_from_url_path() {
        assert_eq!(
            filename_for("https://example.com/reports/Guidelines_2019.pdf?x=1", 3),
            "Guidelines_2019.pdf"
        );
        assert_eq!(filename_for("https://example.com/reports/REPORT.PDF", 0), "REPORT.PDF");
        assert_eq!(filename_for("https://example.com/view?id=7", 7), "document_7.pdf");
        assert_eq!(filename_for("https://example.com/files/", 2), "document_2.pdf");
        assert_eq!(filename_for("not a url", 5), "document_5.pdf");
    }

    #[test]
    fn collisions_get_numbered_suffixes() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(unique_path(dir.path(), "a.pdf"), dir.path().join("a.pdf"));

        fs::write(dir.path().join("a.pdf"), b"x").expect("write");
        assert_eq!(unique_path(dir.path(), "a.pdf"), dir.path().join("a_1.pdf"));

        fs::write(dir.path().join("a_1.pdf"), b"x").expect("write");
        assert_eq!(unique_path(dir.path(), "a.pdf"), dir.path().join("a_2.pdf"));
    }

    #[test]
    fn reads_link_column_with_gaps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let csv = dir.path().join("links.csv");
        fs::write(
            &csv,
            "title,link\nA,https://example.com/a.pdf\nB,\nC,https://example.com/c.pdf\n",
        )
        .expect("write");

        let links = read_links(&csv, "link").expect("links");
        assert_eq!(
            links,
            vec![
                Some("https://example.com/a.pdf".to_string()),
                None,
                Some("https://example.com/c.pdf".to_string()),
            ]
        );
        assert!(matches!(
            read_links(&csv, "url"),
            Err(DownloadError::MissingColumn(_))
        ));
    }

    #[test]
    fn zero_runtime_stops_before_any_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let downloader = Downloader::new(dir.path(), 30, 0).expect("client");

        let summary = downloader
            .run(&[Some("https://example.com/a.pdf".to_string())])
            .expect("run");
        assert!(summary.timed_out);
        assert_eq!(summary.downloaded, 0);

        let logs: Vec<String> = fs::read_dir(dir.path().join("logs"))
            .expect("logs dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(logs.len(), 4);
        assert!(logs.iter().any(|n| n.starts_with("download_summary_")));
    }

    #[test]
    fn empty_cells_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let downloader = Downloader::new(dir.path(), 30, 3600).expect("client");

        let summary = downloader.run(&[None, None]).expect("run");
        assert_eq!(summary, DownloadSummary::default());
    }
}
