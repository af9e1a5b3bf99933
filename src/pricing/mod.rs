//! Option pricing and volatility estimation.

pub mod black_scholes;
pub mod volatility;

pub use black_scholes::{
    hedge_shares, GreeksSnapshot, OptionKind, OptionParameters, OptionPricer, ProfilePoint,
};
pub use volatility::{simple_returns, VolatilityEstimator, TRADING_DAYS_PER_YEAR};
