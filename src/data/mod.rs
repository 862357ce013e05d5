//! Data module - CSV loading, date normalisation and combining

mod combiner;
mod dates;
mod loader;

pub use combiner::CsvCombiner;
pub use loader::{DataLoader, LoaderError};
