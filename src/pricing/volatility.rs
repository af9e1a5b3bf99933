//! Historical volatility from a training window.

use statrs::statistics::Statistics;

use crate::error::{BacktestError, Result};

/// Trading days used to annualize daily figures.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Simple day-over-day returns; the first (undefined) return is dropped.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Annualized close-to-close volatility estimator.
///
/// Uses the sample standard deviation (n - 1), so at least two returns, i.e.
/// three prices, are required.
#[derive(Debug, Clone, Copy)]
pub struct VolatilityEstimator {
    trading_days_per_year: f64,
}

impl Default for VolatilityEstimator {
    fn default() -> Self {
        Self {
            trading_days_per_year: TRADING_DAYS_PER_YEAR,
        }
    }
}

impl VolatilityEstimator {
    pub fn new(trading_days_per_year: f64) -> Self {
        Self {
            trading_days_per_year,
        }
    }

    pub fn annualized_vol(&self, prices: &[f64]) -> Result<f64> {
        if prices.len() < 3 {
            return Err(BacktestError::InsufficientData(format!(
                "volatility needs at least 3 prices (2 returns), got {}",
                prices.len()
            )));
        }
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(BacktestError::InvalidInput(
                "training prices must be finite and positive".to_string(),
            ));
        }
        if !(self.trading_days_per_year > 0.0) {
            return Err(BacktestError::InvalidParameters(format!(
                "trading days per year must be positive, got {}",
                self.trading_days_per_year
            )));
        }

        let returns = simple_returns(prices);
        let daily = returns.iter().std_dev();
        Ok(daily * self.trading_days_per_year.sqrt())
    }
}
