//! Performance metrics calculator.
//!
//! Calculates summary statistics for a delta-hedge backtest.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::backtest::{BacktestResult, DailyRecord};

/// Headline statistics for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub ticker: String,

    // Crossover rebalances; the settlement is not counted
    pub rebalances: usize,
    pub winning_rebalances: usize,
    pub losing_rebalances: usize,
    pub settled: bool,

    // P&L
    pub settlement_pnl: Decimal,
    pub total_pnl: Decimal,
    pub largest_gain: Decimal,
    pub largest_loss: Decimal,
    pub roi_pct: f64,

    // Risk
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,

    pub trading_days: usize,
}

impl PerformanceSummary {
    /// Generate a summary report.
    pub fn summary(&self) -> String {
        format!(
            "{} Performance Summary\n\
             ====================\n\
             \n\
             Rebalances: {} (W: {}, L: {})\n\
             Settlement: {}\n\
             Total P&L: ${:.2}\n\
             Largest Gain: ${:.2}\n\
             Largest Loss: ${:.2}\n\
             ROI: {:.2}%\n\
             \n\
             Max Drawdown: {:.2} ({:.2}%)\n\
             Sharpe Ratio: {:.2}\n\
             Trading Days: {}",
            self.ticker,
            self.rebalances,
            self.winning_rebalances,
            self.losing_rebalances,
            if self.settled {
                format!("${:.2}", self.settlement_pnl)
            } else {
                "none".to_string()
            },
            self.total_pnl,
            self.largest_gain,
            self.largest_loss,
            self.roi_pct,
            self.max_drawdown,
            self.max_drawdown_pct,
            self.sharpe_ratio,
            self.trading_days
        )
    }
}

/// Drawdown analysis details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrawdownAnalysis {
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub peak_date: Option<NaiveDate>,
    pub trough_date: Option<NaiveDate>,
    pub duration_days: i64,
    pub drawdown_periods: usize,
}

/// Metrics calculator.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all metrics from a backtest result.
    pub fn calculate(result: &BacktestResult) -> PerformanceSummary {
        let transactions = &result.transactions;

        // settlement is reported on its own
        let crossovers: Vec<_> = transactions.iter().filter(|t| !t.is_settlement()).collect();
        let settlement_pnl: f64 = transactions
            .iter()
            .filter(|t| t.is_settlement())
            .map(|t| t.pnl)
            .sum();

        let rebalances = crossovers.len();
        let winning_rebalances = crossovers.iter().filter(|t| t.is_winner()).count();
        let losing_rebalances = crossovers.iter().filter(|t| t.pnl < 0.0).count();

        let largest_gain = crossovers
            .iter()
            .map(|t| t.pnl)
            .filter(|p| *p > 0.0)
            .fold(0.0, f64::max);
        let largest_loss = crossovers
            .iter()
            .map(|t| t.pnl)
            .filter(|p| *p < 0.0)
            .fold(0.0, f64::min);

        let drawdown = Self::analyze_drawdown(&result.daily);

        PerformanceSummary {
            ticker: result.ticker.clone(),
            rebalances,
            winning_rebalances,
            losing_rebalances,
            settled: transactions.iter().any(|t| t.is_settlement()),
            settlement_pnl: Self::to_cents(settlement_pnl),
            total_pnl: Self::to_cents(result.total_realized_pnl()),
            largest_gain: Self::to_cents(largest_gain),
            largest_loss: Self::to_cents(largest_loss),
            roi_pct: result.roi_pct(),
            max_drawdown: drawdown.max_drawdown,
            max_drawdown_pct: drawdown.max_drawdown_pct,
            sharpe_ratio: Self::calculate_sharpe(
                &result.daily_pnl(),
                result.config.trading_days_per_year,
            ),
            trading_days: result.trading_days(),
        }
    }

    fn to_cents(value: f64) -> Decimal {
        Decimal::from_f64_retain(value)
            .unwrap_or(Decimal::ZERO)
            .round_dp(2)
    }

    /// Annualized Sharpe ratio of daily P&L (zero risk-free rate).
    fn calculate_sharpe(daily_pnl: &[f64], trading_days_per_year: f64) -> f64 {
        if daily_pnl.len() < 2 {
            return 0.0;
        }

        let mean = daily_pnl.iter().mean();
        let std_dev = daily_pnl.iter().std_dev();
        if !(std_dev > 0.0) {
            return 0.0;
        }

        mean / std_dev * trading_days_per_year.sqrt()
    }

    /// Analyze drawdown of the cumulative return curve.
    pub fn analyze_drawdown(daily: &[DailyRecord]) -> DrawdownAnalysis {
        let Some(first) = daily.first() else {
            return DrawdownAnalysis::default();
        };

        let mut peak = first.cumulative_return;
        let mut peak_date = first.date;
        let mut analysis = DrawdownAnalysis::default();
        let mut in_drawdown = false;

        for record in daily {
            if record.cumulative_return >= peak {
                if in_drawdown {
                    analysis.drawdown_periods += 1;
                }
                peak = record.cumulative_return;
                peak_date = record.date;
                in_drawdown = false;
                continue;
            }

            in_drawdown = true;
            let drawdown = peak - record.cumulative_return;
            if drawdown > analysis.max_drawdown {
                analysis.max_drawdown = drawdown;
                analysis.max_drawdown_pct = if peak != 0.0 {
                    drawdown / peak * 100.0
                } else {
                    0.0
                };
                analysis.peak_date = Some(peak_date);
                analysis.trough_date = Some(record.date);
                analysis.duration_days = (record.date - peak_date).num_days();
            }
        }

        // an unrecovered drawdown still counts
        if in_drawdown {
            analysis.drawdown_periods += 1;
        }

        analysis
    }
}
