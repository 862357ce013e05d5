//! Configuration Module
//! TOML-backed settings for every subcommand; CLI flags override file values.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "chart_harvest.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory of raw PDF reports
    pub input_dir: PathBuf,
    /// Directory receiving cropped charts; renders and reports go to `logs/` below it
    pub output_dir: PathBuf,
    /// Error CSV; defaults to `<output_dir>/logs/extraction_errors.csv`
    pub error_log_path: Option<PathBuf>,
    /// Directory holding the pdfium shared library
    pub pdfium_library_dir: Option<PathBuf>,
    pub extract: ExtractConfig,
    pub download: DownloadConfig,
    pub combine: CombineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Phrases that mark the chart's title, matched case-insensitively
    pub keywords: Vec<String>,
    /// Zoom for the anchored capture and its next-page retry
    pub anchor_zoom: f32,
    /// Zoom for whole-page fallback renders
    pub fallback_zoom: f32,
    /// Points kept above the anchor span
    pub capture_above: f32,
    /// Points kept below the anchor span's top edge
    pub capture_below: f32,
    /// Zoom for page inventory renders
    pub inspect_zoom: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub links_csv: PathBuf,
    pub link_column: String,
    /// Where PDFs land; defaults to `input_dir`
    pub output_dir: Option<PathBuf>,
    pub timeout_secs: u64,
    pub max_runtime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CombineConfig {
    pub csv_dir: PathBuf,
    pub output_path: PathBuf,
    /// Year assumed for month-only rows before any year has been seen
    pub default_year: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data/raw_pdfs"),
            output_dir: PathBuf::from("data/extracted_images"),
            error_log_path: None,
            pdfium_library_dir: None,
            extract: ExtractConfig::default(),
            download: DownloadConfig::default(),
            combine: CombineConfig::default(),
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            keywords: vec![
                "Average Retail Selling Price".to_string(),
                "Avg. Retail Selling Price".to_string(),
            ],
            anchor_zoom: 3.0,
            fallback_zoom: 2.0,
            capture_above: 20.0,
            capture_below: 350.0,
            inspect_zoom: 3.0,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            links_csv: PathBuf::from("data/pdf_links/combined/combined_pdf_links.csv"),
            link_column: "link".to_string(),
            output_dir: None,
            timeout_secs: 30,
            max_runtime_secs: 3600,
        }
    }
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self {
            csv_dir: PathBuf::from("data/csv_data/graph2table/Raw"),
            output_path: PathBuf::from("data/csv_data/graph2table/combined_data.csv"),
            default_year: 2016,
        }
    }
}

impl Config {
    /// Load from `path`, else `chart_harvest.toml` if present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Page renders, bbox images, reports and summaries.
    pub fn logs_dir(&self) -> PathBuf {
        self.output_dir.join("logs")
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.error_log_path
            .clone()
            .unwrap_or_else(|| self.logs_dir().join("extraction_errors.csv"))
    }

    /// Page inventories and their full-page renders.
    pub fn inventory_dir(&self) -> PathBuf {
        self.output_dir.join("inventory")
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download
            .output_dir
            .clone()
            .unwrap_or_else(|| self.input_dir.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_report_layout() {
        let config = Config::default();
        assert_eq!(config.logs_dir(), PathBuf::from("data/extracted_images/logs"));
        assert_eq!(
            config.error_log_path(),
            PathBuf::from("data/extracted_images/logs/extraction_errors.csv")
        );
        assert_eq!(config.download_dir(), PathBuf::from("data/raw_pdfs"));
        assert_eq!(config.extract.anchor_zoom, 3.0);
        assert_eq!(config.extract.inspect_zoom, 3.0);
        assert_eq!(config.inventory_dir(), PathBuf::from("data/extracted_images/inventory"));
        assert_eq!(config.combine.default_year, 2016);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            input_dir = "/reports"
            error_log_path = "/tmp/errors.csv"

            [extract]
            keywords = ["Retail Price"]
            "#,
        )
        .expect("valid toml");

        assert_eq!(config.input_dir, PathBuf::from("/reports"));
        assert_eq!(config.output_dir, PathBuf::from("data/extracted_images"));
        assert_eq!(config.error_log_path(), PathBuf::from("/tmp/errors.csv"));
        assert_eq!(config.extract.keywords, vec!["Retail Price".to_string()]);
        assert_eq!(config.extract.capture_below, 350.0);
        assert_eq!(config.download.timeout_secs, 30);
    }

    #[test]
    fn from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        fs::write(&path, "input_dir = [").expect("write");

        let err = Config::from_file(&path).expect_err("should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::from_file(Path::new("/nonexistent/chart_harvest.toml"))
            .expect_err("should fail");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
