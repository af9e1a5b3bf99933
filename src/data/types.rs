//! Core data types for the price history a backtest consumes.
//!
//! A `PriceSeries` is immutable once built: the constructor validates it and
//! every component downstream only borrows it.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};
use crate::validation::PriceSeriesValidator;

/// Minimum number of training observations (two returns) kept by a split.
pub const MIN_TRAINING_POINTS: usize = 3;

/// One adjusted close on one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

/// Ordered (date, price) observations for a single instrument.
///
/// Invariants: non-empty, dates strictly increasing, prices finite and > 0.
/// Serialized as a plain list of points; deserializing runs the same checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PricePoint>", into = "Vec<PricePoint>")]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series, rejecting anything that breaks the invariants.
    pub fn new(points: Vec<PricePoint>) -> Result<Self> {
        let report = PriceSeriesValidator::default().validate(&points);
        if let Some(check) = report.first_blocking_failure() {
            return Err(BacktestError::InvalidInput(format!(
                "{}: {}",
                check.name, check.message
            )));
        }
        for check in report.failed_checks() {
            tracing::warn!(check = %check.name, message = %check.message, "price series check failed");
        }
        Ok(Self { points })
    }

    /// Build a series from closes dated on consecutive weekdays from `start`.
    pub fn from_closes(start: NaiveDate, closes: &[f64]) -> Result<Self> {
        let dates = weekdays_from(start, closes.len());
        let points = dates
            .into_iter()
            .zip(closes.iter())
            .map(|(date, &price)| PricePoint::new(date, price))
            .collect();
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false for a constructed series; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// The last `n` observations (the whole series if shorter).
    pub fn tail(&self, n: usize) -> &[PricePoint] {
        let start = self.points.len().saturating_sub(n);
        &self.points[start..]
    }

    /// Observations with `start <= date <= end`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Vec<PricePoint> {
        self.points
            .iter()
            .filter(|p| p.date >= start && p.date <= end)
            .copied()
            .collect()
    }

    /// Partition into a training segment and the last `test_len` observations.
    pub fn split(&self, test_len: usize) -> Result<TrainTestSplit> {
        if test_len < 2 {
            return Err(BacktestError::InsufficientData(format!(
                "test window must hold at least 2 days, got {}",
                test_len
            )));
        }
        if self.points.len() < test_len + MIN_TRAINING_POINTS {
            return Err(BacktestError::InsufficientData(format!(
                "{} observations cannot cover a {}-day test window plus {} training points",
                self.points.len(),
                test_len,
                MIN_TRAINING_POINTS
            )));
        }

        let cut = self.points.len() - test_len;
        Ok(TrainTestSplit {
            training: Self {
                points: self.points[..cut].to_vec(),
            },
            testing: Self {
                points: self.points[cut..].to_vec(),
            },
        })
    }
}

impl TryFrom<Vec<PricePoint>> for PriceSeries {
    type Error = BacktestError;

    fn try_from(points: Vec<PricePoint>) -> Result<Self> {
        Self::new(points)
    }
}

impl From<PriceSeries> for Vec<PricePoint> {
    fn from(series: PriceSeries) -> Self {
        series.points
    }
}

/// Training/testing partition of one history.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub training: PriceSeries,
    pub testing: PriceSeries,
}

/// `count` weekdays (Mon-Fri) starting at `start`, or the next weekday after it.
pub fn weekdays_from(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(count);
    let mut current = start;
    while days.len() < count {
        if current.weekday().num_days_from_monday() < 5 {
            days.push(current);
        }
        current += Duration::days(1);
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekdays_skip_weekend() {
        // 2024-01-05 is a Friday
        let days = weekdays_from(day(2024, 1, 5), 3);
        assert_eq!(days, vec![day(2024, 1, 5), day(2024, 1, 8), day(2024, 1, 9)]);
    }

    #[test]
    fn test_rejects_non_increasing_dates() {
        let points = vec![
            PricePoint::new(day(2024, 1, 2), 10.0),
            PricePoint::new(day(2024, 1, 2), 11.0),
        ];
        assert!(matches!(
            PriceSeries::new(points),
            Err(BacktestError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive_price() {
        let result = PriceSeries::from_closes(day(2024, 1, 2), &[10.0, 0.0, 12.0]);
        assert!(matches!(result, Err(BacktestError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(
            PriceSeries::new(vec![]),
            Err(BacktestError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_split_keeps_last_observations_for_testing() {
        let closes: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let series = PriceSeries::from_closes(day(2024, 1, 2), &closes).unwrap();
        let split = series.split(4).unwrap();

        assert_eq!(split.training.closes(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(split.testing.closes(), vec![7.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn test_split_requires_training_points() {
        let series = PriceSeries::from_closes(day(2024, 1, 2), &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!(matches!(
            series.split(2),
            Err(BacktestError::InsufficientData(_))
        ));
        assert!(matches!(
            series.split(1),
            Err(BacktestError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_tail_and_between() {
        let series =
            PriceSeries::from_closes(day(2024, 1, 1), &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let tail: Vec<f64> = series.tail(2).iter().map(|p| p.price).collect();
        assert_eq!(tail, vec![4.0, 5.0]);
        assert_eq!(series.tail(10).len(), 5);

        let window = series.between(day(2024, 1, 2), day(2024, 1, 4));
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_deserialize_validates() {
        let series = PriceSeries::from_closes(day(2024, 1, 2), &[10.0, 11.0]).unwrap();
        let json = serde_json::to_string(&series).unwrap();
        assert!(json.starts_with('['));
        let parsed: PriceSeries = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, series);

        let unordered = r#"[{"date":"2024-01-03","price":10.0},{"date":"2024-01-02","price":11.0}]"#;
        assert!(serde_json::from_str::<PriceSeries>(unordered).is_err());
        assert!(serde_json::from_str::<PriceSeries>("[]").is_err());
    }
}
