//! Files module - Report downloads and filename normalisation

mod downloader;
mod renamer;

pub use downloader::{read_links, Downloader};
pub use renamer::{rename_pdfs, RenameOutcome};
