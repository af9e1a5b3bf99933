//! Delta-hedged put backtest.
//!
//! This module provides the simulation side of a run:
//! - Rebalance rule applied on each crossover
//! - Transaction log and portfolio state
//! - Day-by-day simulator, single-ticker and batch entry points

pub mod engine;
pub mod rebalance;
pub mod trade;

pub use engine::{
    run_backtest, run_batch, BacktestConfig, BacktestResult, DailyRecord, PortfolioSimulator,
    SimulationInputs,
};
pub use rebalance::{rebalance, HedgeMark, RebalanceOutcome, TradeDirection};
pub use trade::{PortfolioState, Transaction, TransactionKind};
