//! Extract module - Keyword search, chart cropping, reporting and page inventories

mod batch;
mod cropper;
mod error_log;
mod inspect;
mod pipeline;
mod report;
mod selector;

pub use batch::{list_pdfs, BatchRunner};
pub use cropper::ChartCropper;
pub use error_log::ErrorLog;
pub use inspect::PageInspector;

use crate::pdf::PdfError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("{0}")]
    Pdf(#[from] PdfError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
