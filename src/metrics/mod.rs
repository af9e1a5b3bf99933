//! Performance metrics module.
//!
//! Summarizes a finished backtest:
//! - ROI and realized P&L
//! - Winning/losing rebalances
//! - Maximum drawdown of the cumulative return curve
//! - Sharpe ratio of daily P&L

pub mod calculator;

pub use calculator::{DrawdownAnalysis, MetricsCalculator, PerformanceSummary};
