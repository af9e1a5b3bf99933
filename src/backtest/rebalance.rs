//! Hedge rebalance rule.
//!
//! Maps the hedge mark at the previous rebalance and the mark now to new leg
//! notionals and the realized P&L per unit of underlying:
//!
//! pnl = (price_now - price_prev) * (delta_now - delta_prev) + (option_prev - option_now)
//!
//! BUY and SELL currently settle with the same formula. Whether SELL should
//! flip the sign is an open product question, so the direction is carried
//! through untouched.

use serde::{Deserialize, Serialize};

use crate::pricing::GreeksSnapshot;
use crate::signal::SignalState;

/// Direction of a rebalance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    /// Short EMA rose through the long EMA: buy stock, sell options.
    Buy,
    /// Short EMA fell through the long EMA: sell stock, buy options.
    Sell,
}

impl TradeDirection {
    /// Bullish -> Buy, Bearish -> Sell, Neutral has no direction.
    pub fn from_state(state: SignalState) -> Option<Self> {
        match state {
            SignalState::Bullish => Some(Self::Buy),
            SignalState::Bearish => Some(Self::Sell),
            SignalState::Neutral => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

/// Underlying price, hedge delta and option value at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HedgeMark {
    pub price: f64,
    pub delta: f64,
    pub option_price: f64,
}

impl HedgeMark {
    pub fn new(price: f64, greeks: &GreeksSnapshot) -> Self {
        Self {
            price,
            delta: greeks.delta,
            option_price: greeks.price,
        }
    }
}

/// Leg notionals after a rebalance and the P&L it realized (per unit).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RebalanceOutcome {
    pub stock_leg: f64,
    pub option_leg: f64,
    pub realized_pnl: f64,
}

/// Apply the rebalance rule.
pub fn rebalance(direction: TradeDirection, now: &HedgeMark, prev: &HedgeMark) -> RebalanceOutcome {
    let realized_pnl = match direction {
        TradeDirection::Buy | TradeDirection::Sell => {
            (now.price - prev.price) * (now.delta - prev.delta)
                + (prev.option_price - now.option_price)
        }
    };

    RebalanceOutcome {
        stock_leg: now.price * now.delta,
        option_leg: now.option_price,
        realized_pnl,
    }
}
