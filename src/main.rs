//! Chart Harvest - Chart extraction from monthly PDF market reports
//!
//! Finds the retail-price chart in each report, crops it to a PNG, and
//! carries the surrounding chores: renaming and downloading reports, and
//! merging the per-chart CSV tables digitised from the crops.

mod config;
mod data;
mod detect;
mod extract;
mod files;
mod pdf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::Config;
use data::CsvCombiner;
use extract::{list_pdfs, BatchRunner, ChartCropper, ErrorLog, PageInspector};
use files::{read_links, rename_pdfs, Downloader, RenameOutcome};

#[derive(Parser)]
#[command(name = "chart_harvest")]
#[command(about = "Extract chart images from PDF reports and merge their tables")]
#[command(version)]
struct Cli {
    /// TOML config file (default: ./chart_harvest.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Locate and crop the chart in each PDF
    Extract {
        /// PDFs to process (default: every PDF in the input directory)
        files: Vec<PathBuf>,

        /// Directory of PDFs
        #[arg(short, long)]
        input_dir: Option<PathBuf>,

        /// Directory for cropped charts; renders and reports go to logs/ below it
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Error CSV path
        #[arg(short, long)]
        error_log: Option<PathBuf>,
    },

    /// Crop the chart out of an already rendered page image
    Crop {
        /// Page image (PNG, JPEG, ...)
        image: PathBuf,

        /// Directory for the cropped chart
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Error CSV path
        #[arg(short, long)]
        error_log: Option<PathBuf>,
    },

    /// Count embedded images and vector drawings per page, with full-page renders
    Inspect {
        /// PDFs to inspect (default: every PDF in the input directory)
        files: Vec<PathBuf>,

        /// Directory for renders and inventories (default: <output_dir>/inventory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Render zoom factor
        #[arg(long)]
        zoom: Option<f32>,
    },

    /// Rename reports to <MM>_<YYYY>.pdf
    Rename {
        /// Directory of PDFs
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Merge digitised chart tables into one date-sorted CSV
    Combine {
        /// Directory of per-chart CSVs
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// Combined CSV path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Year assumed for leading month-only rows
        #[arg(long)]
        default_year: Option<i32>,
    },

    /// Download the PDFs listed in a links CSV
    Download {
        /// Links CSV
        #[arg(short, long)]
        links: Option<PathBuf>,

        /// Column holding the URLs
        #[arg(long)]
        column: Option<String>,

        /// Directory for downloaded PDFs
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .compact()
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Extract {
            files,
            input_dir,
            output_dir,
            error_log,
        } => {
            if let Some(dir) = input_dir {
                config.input_dir = dir;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if error_log.is_some() {
                config.error_log_path = error_log;
            }
            cmd_extract(&config, files)?;
        }
        Commands::Crop {
            image,
            output_dir,
            error_log,
        } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if error_log.is_some() {
                config.error_log_path = error_log;
            }
            cmd_crop(&config, image)?;
        }
        Commands::Inspect {
            files,
            output_dir,
            zoom,
        } => {
            if let Some(zoom) = zoom {
                config.extract.inspect_zoom = zoom;
            }
            let output_dir = output_dir.unwrap_or_else(|| config.inventory_dir());
            cmd_inspect(&config, files, output_dir)?;
        }
        Commands::Rename { dir } => {
            cmd_rename(dir.unwrap_or_else(|| config.input_dir.clone()))?;
        }
        Commands::Combine {
            csv_dir,
            output,
            default_year,
        } => {
            if let Some(dir) = csv_dir {
                config.combine.csv_dir = dir;
            }
            if let Some(path) = output {
                config.combine.output_path = path;
            }
            if let Some(year) = default_year {
                config.combine.default_year = year;
            }
            cmd_combine(&config)?;
        }
        Commands::Download {
            links,
            column,
            output_dir,
        } => {
            if let Some(path) = links {
                config.download.links_csv = path;
            }
            if let Some(column) = column {
                config.download.link_column = column;
            }
            if output_dir.is_some() {
                config.download.output_dir = output_dir;
            }
            cmd_download(&config)?;
        }
    }

    Ok(())
}

fn cmd_extract(config: &Config, files: Vec<PathBuf>) -> Result<()> {
    let files = (!files.is_empty()).then_some(files);
    let runner = BatchRunner::new(config);
    let summary = runner
        .run(files)
        .with_context(|| format!("Extraction failed for {}", config.input_dir.display()))?;

    info!(
        "Processed {} PDFs: {} captured, {} failed",
        summary.total,
        summary.successes(),
        summary.failed.len()
    );
    Ok(())
}

fn cmd_crop(config: &Config, image: PathBuf) -> Result<()> {
    let log = ErrorLog::new(config.error_log_path());
    let cropper = ChartCropper::new(&config.output_dir, &config.logs_dir(), Some(&log));

    let (path, cropped) = cropper.extract_file(&image);
    if cropped {
        println!("{}", path.display());
    } else {
        warn!(
            "No chart cropped from {}; see {}",
            image.display(),
            log.path().display()
        );
    }
    Ok(())
}

fn cmd_inspect(config: &Config, files: Vec<PathBuf>, output_dir: PathBuf) -> Result<()> {
    let files = if files.is_empty() {
        list_pdfs(&config.input_dir)
            .with_context(|| format!("Failed to read {}", config.input_dir.display()))?
    } else {
        files
    };

    let inspector = PageInspector::new(&output_dir, config.extract.inspect_zoom);
    let inventories = inspector
        .run(&files, config.pdfium_library_dir.as_deref())
        .context("Inspection failed")?;

    info!(
        "Inspected {} of {} PDFs into {}",
        inventories.len(),
        files.len(),
        output_dir.display()
    );
    Ok(())
}

fn cmd_rename(dir: PathBuf) -> Result<()> {
    let outcomes =
        rename_pdfs(&dir).with_context(|| format!("Failed to read {}", dir.display()))?;

    let renamed = outcomes
        .iter()
        .filter(|o| matches!(o, RenameOutcome::Renamed { .. }))
        .count();
    info!("Renamed {} of {} PDFs in {}", renamed, outcomes.len(), dir.display());
    Ok(())
}

fn cmd_combine(config: &Config) -> Result<()> {
    let c = &config.combine;
    let summary = CsvCombiner::combine(&c.csv_dir, &c.output_path, c.default_year)
        .with_context(|| format!("Failed to combine CSVs in {}", c.csv_dir.display()))?;

    info!(
        "Combined {} files into {} rows",
        summary.files, summary.rows
    );
    Ok(())
}

fn cmd_download(config: &Config) -> Result<()> {
    let d = &config.download;
    let links = read_links(&d.links_csv, &d.link_column)
        .with_context(|| format!("Error loading links from {}", d.links_csv.display()))?;

    let downloader = Downloader::new(&config.download_dir(), d.timeout_secs, d.max_runtime_secs)
        .context("Failed to build HTTP client")?;
    let summary = downloader.run(&links).context("Download run failed")?;

    if summary.timed_out {
        warn!("Stopped early after {} seconds", d.max_runtime_secs);
    }
    Ok(())
}
