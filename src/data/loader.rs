//! CSV Data Loader Module
//! Loads chart-table CSVs with Polars and exposes their column layout.

use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("No data loaded")]
    NoData,
    #[error("{0} has no columns")]
    NoColumns(PathBuf),
}

/// Handles CSV file loading with Polars for high performance.
#[derive(Default)]
pub struct DataLoader {
    df: Option<DataFrame>,
}

impl DataLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a CSV file using Polars.
    pub fn load_csv(&mut self, file_path: &Path) -> Result<&DataFrame, LoaderError> {
        // Lazy scan, then collect; malformed cells become nulls
        let df = LazyCsvReader::new(file_path)
            .with_infer_schema_length(Some(10000))
            .with_ignore_errors(true)
            .finish()?
            .collect()?;

        if df.width() == 0 {
            return Err(LoaderError::NoColumns(file_path.to_path_buf()));
        }

        self.df = Some(df);
        self.df.as_ref().ok_or(LoaderError::NoData)
    }

    /// Get list of column names from loaded DataFrame.
    pub fn get_columns(&self) -> Vec<String> {
        self.df
            .as_ref()
            .map(|df| {
                df.get_column_names()
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get list of numeric column names.
    pub fn get_numeric_columns(&self) -> Vec<String> {
        let Some(df) = &self.df else {
            return Vec::new();
        };

        df.get_columns()
            .iter()
            .filter(|col| is_numeric(col.dtype()))
            .map(|col| col.name().to_string())
            .collect()
    }

    /// Hand over the loaded DataFrame.
    pub fn into_dataframe(self) -> Result<DataFrame, LoaderError> {
        self.df.ok_or(LoaderError::NoData)
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}
