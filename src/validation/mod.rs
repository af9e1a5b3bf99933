//! Validation of input price histories.
//!
//! Blocking checks (empty, ordering, price validity) make `PriceSeries::new`
//! fail; advisory checks are only logged.

pub mod data_integrity;

pub use data_integrity::{CheckResult, IntegrityReport, PriceSeriesValidator};
