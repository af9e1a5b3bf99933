//! Portfolio state and the transaction log of a hedge backtest.
//!
//! The state is threaded through the simulation day by day and changes only
//! when a rebalance is applied.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::pricing::GreeksSnapshot;

use super::rebalance::{RebalanceOutcome, TradeDirection};

/// Why a transaction was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// EMA crossover on that day.
    Crossover,
    /// Forced rebalance on the last day that realizes the open hedge.
    Settlement,
}

/// One applied rebalance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Index into the test window.
    pub day: usize,
    pub date: NaiveDate,
    pub kind: TransactionKind,
    pub direction: TradeDirection,
    /// Greeks of the hedged option at the trade.
    pub greeks: GreeksSnapshot,
    pub price: f64,
    pub prev_price: f64,
    pub prev_delta: f64,
    /// Realized P&L scaled by position quantity.
    pub pnl: f64,
    pub stock_leg: f64,
    pub option_leg: f64,
}

impl Transaction {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_settlement(&self) -> bool {
        self.kind == TransactionKind::Settlement
    }
}

/// Running hedge portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub stock_leg: f64,
    pub option_leg: f64,
    pub cash: f64,
    pub realized_pnl: f64,
}

impl PortfolioState {
    /// Stock leg sized by delta on the whole capital, one option, the rest in cash.
    pub fn initial(capital: f64, greeks: &GreeksSnapshot) -> Self {
        let stock_leg = greeks.delta * capital;
        let option_leg = greeks.price;
        Self {
            stock_leg,
            option_leg,
            cash: capital - stock_leg - option_leg,
            realized_pnl: 0.0,
        }
    }

    /// Take the new legs and book `pnl` (already scaled by quantity).
    pub fn apply(&mut self, outcome: &RebalanceOutcome, pnl: f64, capital: f64) {
        self.stock_leg = outcome.stock_leg;
        self.option_leg = outcome.option_leg;
        self.realized_pnl += pnl;
        self.cash = capital + self.realized_pnl - self.stock_leg - self.option_leg;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_initial_allocation() {
        let greeks = GreeksSnapshot {
            price: 7.9,
            delta: 0.54,
            ..Default::default()
        };
        let state = PortfolioState::initial(100_000.0, &greeks);
        assert_relative_eq!(state.stock_leg, 54_000.0, epsilon = 1e-9);
        assert_eq!(state.option_leg, 7.9);
        assert_relative_eq!(state.cash, 100_000.0 - 54_000.0 - 7.9, epsilon = 1e-9);
        assert_eq!(state.realized_pnl, 0.0);
    }

    #[test]
    fn test_apply_accumulates_pnl() {
        let mut state = PortfolioState::initial(1_000.0, &GreeksSnapshot::default());
        let outcome = RebalanceOutcome {
            stock_leg: 60.0,
            option_leg: 4.0,
            realized_pnl: 0.5,
        };
        state.apply(&outcome, 5.0, 1_000.0);
        state.apply(&outcome, -2.0, 1_000.0);

        assert_eq!(state.realized_pnl, 3.0);
        assert_eq!(state.stock_leg, 60.0);
        assert_relative_eq!(state.cash, 1_000.0 + 3.0 - 64.0, epsilon = 1e-12);
    }
}
