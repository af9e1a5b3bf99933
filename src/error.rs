//! Error taxonomy shared by every stage of a backtest run.
//!
//! Leaf components (smoother, pricer, volatility estimator) validate their own
//! inputs and fail fast; the simulator propagates without masking.

use thiserror::Error;

use crate::data::LoaderError;

#[derive(Error, Debug)]
pub enum BacktestError {
    /// Malformed or empty series, non-positive span, misaligned inputs.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Non-positive spot/strike/expiry, negative volatility, bad config values.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Not enough observations for a volatility estimate or a test window.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Data source error: {0}")]
    Data(#[from] LoaderError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BacktestError>;
