//! Parquet-backed price source.
//!
//! Reads one parquet file per ticker from `{data_dir}/prices/{TICKER}.parquet`
//! with the schema:
//! - date (YYYY-MM-DD string, or a polars Date column)
//! - adj_close (f64)

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;
use tracing::warn;

use crate::error::Result;

use super::source::PriceDataSource;
use super::types::{PricePoint, PriceSeries};

/// Expected columns in the price files.
pub const EXPECTED_COLUMNS: &[&str] = &["date", "adj_close"];

const DATE_COLUMN: &str = "date";
const PRICE_COLUMN: &str = "adj_close";

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Price history loader over a directory of parquet files.
pub struct ParquetPriceSource {
    data_dir: String,
    dividend_yields: HashMap<String, f64>,
}

impl ParquetPriceSource {
    pub fn new(data_dir: &str) -> Self {
        Self {
            data_dir: data_dir.to_string(),
            dividend_yields: HashMap::new(),
        }
    }

    /// Parquet files carry no metadata, so yields are supplied by the caller.
    pub fn with_dividend_yield(mut self, ticker: &str, dividend_yield: f64) -> Self {
        self.dividend_yields.insert(ticker.to_string(), dividend_yield);
        self
    }

    fn parquet_path(&self, ticker: &str) -> String {
        format!("{}/prices/{}.parquet", self.data_dir, ticker)
    }

    /// List tickers with a price file.
    pub fn available_tickers(&self) -> std::result::Result<Vec<String>, LoaderError> {
        let dir_path = format!("{}/prices", self.data_dir);
        let path = Path::new(&dir_path);

        if !path.exists() {
            return Ok(vec![]);
        }

        let mut tickers = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if let Some(ticker) = name.strip_suffix(".parquet") {
                tickers.push(ticker.to_string());
            }
        }
        tickers.sort();
        Ok(tickers)
    }

    pub fn load_lazy(&self, ticker: &str) -> std::result::Result<LazyFrame, LoaderError> {
        let path = self.parquet_path(ticker);
        if !Path::new(&path).exists() {
            return Err(LoaderError::FileNotFound(path));
        }
        let lf = LazyFrame::scan_parquet(&path, ScanArgsParquet::default())?;
        Ok(lf)
    }

    /// Load every observation for a ticker, sorted by date.
    pub fn load_points(&self, ticker: &str) -> std::result::Result<Vec<PricePoint>, LoaderError> {
        let df = self
            .load_lazy(ticker)?
            .select([col(DATE_COLUMN), col(PRICE_COLUMN)])
            .collect()?;
        collect_points(ticker, &df)
    }

    /// Load observations with `start <= date <= end`.
    ///
    /// The range is pushed into the scan as an ISO string comparison, so Date
    /// columns are cast to strings first.
    pub fn load_range(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<Vec<PricePoint>, LoaderError> {
        let date = col(DATE_COLUMN).cast(DataType::String);
        let df = self
            .load_lazy(ticker)?
            .select([col(DATE_COLUMN), col(PRICE_COLUMN)])
            .filter(
                date.clone()
                    .gt_eq(lit(start.to_string()))
                    .and(date.lt_eq(lit(end.to_string()))),
            )
            .collect()?;
        collect_points(ticker, &df)
    }
}

impl PriceDataSource for ParquetPriceSource {
    fn price_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        let points = self.load_range(ticker, start, end)?;

        if points.is_empty() {
            return Err(LoaderError::InvalidData(format!(
                "No prices for {} between {} and {}",
                ticker, start, end
            ))
            .into());
        }

        PriceSeries::new(points)
    }

    fn dividend_yield(&self, ticker: &str) -> Result<Option<f64>> {
        Ok(self.dividend_yields.get(ticker).copied())
    }
}

/// Pair up dates and closes, dropping rows where either is missing.
fn collect_points(
    ticker: &str,
    df: &DataFrame,
) -> std::result::Result<Vec<PricePoint>, LoaderError> {
    let dates = parse_dates(df.column(DATE_COLUMN)?)?;
    let closes = df.column(PRICE_COLUMN)?.f64()?;

    let mut points: Vec<PricePoint> = Vec::with_capacity(dates.len());
    let mut skipped = 0usize;
    for (date, close) in dates.into_iter().zip(closes.into_iter()) {
        match (date, close) {
            (Some(date), Some(price)) => points.push(PricePoint::new(date, price)),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(ticker, skipped, "dropped rows with unparseable dates or missing closes");
    }

    points.sort_by_key(|p| p.date);
    Ok(points)
}

/// Handle both string and date column types.
fn parse_dates(column: &Column) -> std::result::Result<Vec<Option<NaiveDate>>, LoaderError> {
    if let Ok(str_col) = column.str() {
        Ok(str_col
            .into_iter()
            .map(|s| s.and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()))
            .collect())
    } else if let Ok(date_col) = column.date() {
        Ok(date_col
            .into_iter()
            .map(|d| d.map(date_from_days))
            .collect())
    } else {
        Err(LoaderError::InvalidData(
            "date column has unexpected type".to_string(),
        ))
    }
}

/// Convert days since the Unix epoch to a date.
fn date_from_days(days: i32) -> NaiveDate {
    NaiveDate::from_num_days_from_ce_opt(days + 719163).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BacktestError;

    #[test]
    fn test_date_from_days() {
        let date = date_from_days(18262);
        assert_eq!(date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
    }

    #[test]
    fn test_parquet_path() {
        let source = ParquetPriceSource::new("data/market");
        assert_eq!(source.parquet_path("JPM"), "data/market/prices/JPM.parquet");
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let source = ParquetPriceSource::new("/nonexistent/price/dir");
        assert!(source.available_tickers().unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_data_error() {
        let source = ParquetPriceSource::new("/nonexistent/price/dir");
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let result = source.price_history("AAPL", start, end);
        assert!(matches!(
            result,
            Err(BacktestError::Data(LoaderError::FileNotFound(_)))
        ));
    }

    #[test]
    fn test_dividend_yield_from_builder() {
        let source = ParquetPriceSource::new("data").with_dividend_yield("KO", 0.031);
        assert_eq!(source.dividend_yield("KO").unwrap(), Some(0.031));
        assert_eq!(source.dividend_yield("GS").unwrap(), None);
    }

    #[test]
    fn test_collect_points_skips_bad_rows() {
        let df = polars::df![
            "date" => ["2024-01-03", "not a date", "2024-01-02", "2024-01-04"],
            "adj_close" => [Some(11.0), Some(12.0), Some(10.0), None],
        ]
        .unwrap();

        let points = collect_points("KO", &df).unwrap();
        assert_eq!(
            points,
            vec![
                PricePoint::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 10.0),
                PricePoint::new(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), 11.0),
            ]
        );
    }

    #[test]
    fn test_range_filter_in_scan() {
        let dir = std::env::temp_dir().join(format!("ema-hedge-loader-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("prices")).unwrap();

        let mut df = polars::df![
            "date" => ["2024-01-02", "2024-01-03", "2024-01-04", "2024-01-05"],
            "adj_close" => [10.0, 11.0, 12.0, 13.0],
        ]
        .unwrap();
        let file = std::fs::File::create(dir.join("prices").join("KO.parquet")).unwrap();
        ParquetWriter::new(file).finish(&mut df).unwrap();

        let source = ParquetPriceSource::new(dir.to_str().unwrap());
        let history = source
            .price_history(
                "KO",
                NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
            )
            .unwrap();
        assert_eq!(history.closes(), vec![11.0, 12.0]);
        assert_eq!(source.available_tickers().unwrap(), vec!["KO".to_string()]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_range_load() {
        let source = ParquetPriceSource::new("/nonexistent/price/dir");
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        assert!(matches!(
            source.load_range("AAPL", start, end),
            Err(LoaderError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_expected_columns() {
        assert_eq!(EXPECTED_COLUMNS, &["date", "adj_close"]);
    }
}
