//! CSV Combiner Module
//! Merges per-chart tables into one date-sorted CSV.

use super::dates::normalize_labels;
use super::loader::{DataLoader, LoaderError};
use chrono::NaiveDate;
use polars::prelude::*;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const DATE_COLUMN: &str = "Date";
pub const SOURCE_COLUMN: &str = "Source_File";

#[derive(Error, Debug)]
pub enum CombineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("{path}: {source}")]
    Load { path: PathBuf, source: LoaderError },
    #[error("No CSV files found in {0}")]
    NoInput(PathBuf),
}

/// What a combine run produced.
#[derive(Debug, Clone)]
pub struct CombineSummary {
    pub files: usize,
    pub rows: usize,
    pub columns: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

pub struct CsvCombiner;

impl CsvCombiner {
    /// `*.csv` files directly inside `dir`, sorted.
    pub fn list_csvs(dir: &Path) -> Result<Vec<PathBuf>, CombineError> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .map(|e| e.eq_ignore_ascii_case("csv"))
                        .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Load one table: first column becomes `Date`, then `Source_File` is added.
    pub fn prepare(path: &Path, default_year: i32) -> Result<DataFrame, CombineError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        info!("Reading {}", file_name);

        let mut loader = DataLoader::new();
        let load_err = |source| CombineError::Load {
            path: path.to_path_buf(),
            source,
        };
        loader.load_csv(path).map_err(load_err)?;
        let columns = loader.get_columns();
        let numeric = loader.get_numeric_columns();
        let mut df = loader.into_dataframe().map_err(load_err)?;

        let first = columns[0].as_str();
        if first != DATE_COLUMN {
            df.rename(first, DATE_COLUMN.into())?;
        }

        let labels = df.column(DATE_COLUMN)?.cast(&DataType::String)?;
        let dates = normalize_labels(labels.str()?.into_iter(), default_year);
        let unparsed: Vec<&str> = labels
            .str()?
            .into_iter()
            .zip(&dates)
            .filter(|(_, date)| date.is_none())
            .map(|(label, _)| label.unwrap_or("null"))
            .take(5)
            .collect();
        if !unparsed.is_empty() {
            warn!(
                "Some dates in {} could not be parsed. First few problematic values: {:?}",
                file_name, unparsed
            );
        }

        df.with_column(date_series(&dates))?;

        // Same-named value columns must agree on dtype across files
        for name in numeric.iter().filter(|n| n.as_str() != first) {
            let cast = df.column(name)?.cast(&DataType::Float64)?;
            df.with_column(cast)?;
        }

        let height = df.height();
        df.with_column(Column::new(
            SOURCE_COLUMN.into(),
            vec![file_name.as_str(); height],
        ))?;

        let mut order = vec![DATE_COLUMN.to_string()];
        order.extend(
            df.get_column_names()
                .iter()
                .map(|n| n.to_string())
                .filter(|n| n != DATE_COLUMN),
        );
        Ok(df.select(order)?)
    }

    /// Combine every CSV in `csv_dir` into `output`.
    pub fn combine(
        csv_dir: &Path,
        output: &Path,
        default_year: i32,
    ) -> Result<CombineSummary, CombineError> {
        let files = Self::list_csvs(csv_dir)?;
        if files.is_empty() {
            return Err(CombineError::NoInput(csv_dir.to_path_buf()));
        }
        info!("Found {} CSV files", files.len());

        let frames = files
            .par_iter()
            .map(|path| Self::prepare(path, default_year))
            .collect::<Result<Vec<_>, _>>()?;

        info!("Combining files by Date column");
        let combined = polars::functions::concat_df_diagonal(&frames)?;
        let mut combined = combined.sort(
            [DATE_COLUMN],
            SortMultipleOptions::default()
                .with_nulls_last(true)
                .with_maintain_order(true),
        )?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(output)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut combined)?;

        let (first_date, last_date) = date_range(&combined)?;
        let summary = CombineSummary {
            files: files.len(),
            rows: combined.height(),
            columns: combined.width(),
            first_date,
            last_date,
        };
        info!("Combined data saved to {}", output.display());
        info!("Combined data shape: ({}, {})", summary.rows, summary.columns);
        if let (Some(first), Some(last)) = (first_date, last_date) {
            info!("Date range: {} to {}", first, last);
        }
        Ok(summary)
    }
}

fn date_series(dates: &[Option<NaiveDate>]) -> Column {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    let days = dates
        .iter()
        .map(|d| d.map(|d| (d - epoch).num_days() as i32));
    Int32Chunked::from_iter_options(DATE_COLUMN.into(), days)
        .into_date()
        .into_column()
}

fn date_range(df: &DataFrame) -> Result<(Option<NaiveDate>, Option<NaiveDate>), CombineError> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    let days = df.column(DATE_COLUMN)?.cast(&DataType::Int32)?;
    let days = days.i32()?;
    let to_date = |d: i32| epoch.checked_add_signed(chrono::Duration::days(d as i64));
    Ok((days.min().and_then(to_date), days.max().and_then(to_date)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).expect("write csv");
    }

    #[test]
    fn prepare_renames_and_tags_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "a.csv", "Month,Price\nJan-16,100\nFeb,110\n");

        let df = CsvCombiner::prepare(&dir.path().join("a.csv"), 2016).expect("prepare");
        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["Date", "Price", "Source_File"]);
        assert_eq!(df.column("Date").expect("date").dtype(), &DataType::Date);
        assert_eq!(df.column("Price").expect("price").dtype(), &DataType::Float64);
    }

    #[test]
    fn combine_unions_columns_and_sorts_dates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = dir.path().join("raw");
        fs::create_dir(&raw).expect("mkdir");
        write(&raw, "a.csv", "Month,Price\nJan-16,100\nFeb,110\nDec (est.),120\nJan,130\n");
        write(&raw, "b.csv", "Period,Volume\nMar-18,5\nTotal,6\n");
        write(&raw, "notes.txt", "ignored");
        let output = dir.path().join("out/combined_data.csv");

        let summary = CsvCombiner::combine(&raw, &output, 2016).expect("combine");
        assert_eq!(summary.files, 2);
        assert_eq!(summary.rows, 6);
        assert_eq!(summary.columns, 4);
        assert_eq!(summary.first_date, NaiveDate::from_ymd_opt(2016, 1, 1));
        assert_eq!(summary.last_date, NaiveDate::from_ymd_opt(2018, 3, 1));

        let text = fs::read_to_string(&output).expect("read output");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Date,Price,Source_File,Volume");
        assert!(lines[1].starts_with("2016-01-01,"));
        assert!(lines[3].starts_with("2016-12-01,"));
        assert!(lines[4].starts_with("2017-01-01,"));
        assert!(lines[5].starts_with("2018-03-01,"));
        assert!(lines[6].starts_with(','));
        assert!(lines[6].contains("b.csv"));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = CsvCombiner::combine(dir.path(), &dir.path().join("out.csv"), 2016)
            .expect_err("no input");
        assert!(matches!(err, CombineError::NoInput(_)));
    }
}
