pub mod loader;
pub mod source;
pub mod types;

pub use loader::{LoaderError, ParquetPriceSource, EXPECTED_COLUMNS};
pub use source::{InMemoryPriceSource, PriceDataSource};
pub use types::{weekdays_from, PricePoint, PriceSeries, TrainTestSplit};
