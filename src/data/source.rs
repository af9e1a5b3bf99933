//! Market data capability injected into a backtest run.
//!
//! The core never holds a live connection; it asks a `PriceDataSource` for a
//! dated price history and, optionally, a dividend yield.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::{BacktestError, Result};

use super::types::PriceSeries;

/// Supplier of price histories and instrument metadata.
pub trait PriceDataSource: Send + Sync {
    /// Adjusted closes for `ticker` with `start <= date <= end`.
    fn price_history(&self, ticker: &str, start: NaiveDate, end: NaiveDate)
        -> Result<PriceSeries>;

    /// Continuous dividend yield, if the provider knows it.
    fn dividend_yield(&self, _ticker: &str) -> Result<Option<f64>> {
        Ok(None)
    }
}

/// Source backed by series already resident in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPriceSource {
    series: HashMap<String, PriceSeries>,
    dividend_yields: HashMap<String, f64>,
}

impl InMemoryPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, ticker: &str, series: PriceSeries) -> Self {
        self.series.insert(ticker.to_string(), series);
        self
    }

    pub fn with_dividend_yield(mut self, ticker: &str, dividend_yield: f64) -> Self {
        self.dividend_yields.insert(ticker.to_string(), dividend_yield);
        self
    }

    pub fn tickers(&self) -> Vec<String> {
        let mut tickers: Vec<_> = self.series.keys().cloned().collect();
        tickers.sort();
        tickers
    }
}

impl PriceDataSource for InMemoryPriceSource {
    fn price_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        let series = self.series.get(ticker).ok_or_else(|| {
            BacktestError::InsufficientData(format!("no price history for {}", ticker))
        })?;

        let points = series.between(start, end);
        if points.is_empty() {
            return Err(BacktestError::InsufficientData(format!(
                "no prices for {} between {} and {}",
                ticker, start, end
            )));
        }
        PriceSeries::new(points)
    }

    fn dividend_yield(&self, ticker: &str) -> Result<Option<f64>> {
        Ok(self.dividend_yields.get(ticker).copied())
    }
}
