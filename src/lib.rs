pub mod backtest;
pub mod data;
pub mod error;
pub mod metrics;
pub mod pricing;
pub mod signal;
pub mod validation;

// Re-export commonly used types
pub use backtest::{
    run_backtest, run_batch, BacktestConfig, BacktestResult, DailyRecord, PortfolioSimulator,
    TradeDirection, Transaction,
};
pub use data::{InMemoryPriceSource, ParquetPriceSource, PriceDataSource, PricePoint, PriceSeries};
pub use error::{BacktestError, Result};
pub use metrics::{MetricsCalculator, PerformanceSummary};
pub use pricing::{GreeksSnapshot, OptionKind, OptionParameters, OptionPricer, VolatilityEstimator};
pub use signal::{EmaSmoother, SignalDetector, SignalSeries, SignalState};
pub use validation::PriceSeriesValidator;
