//! Trend signal generation.
//!
//! Two exponential moving averages of different spans are compared index by
//! index; their relative order is the signal state and a change of order is a
//! crossover event.

pub mod crossover;
pub mod ema;

pub use crossover::{Crossover, SignalDetector, SignalSeries, SignalState};
pub use ema::{ema, smoothing_factor, EmaSmoother};
