//! Data integrity checks for price histories.
//!
//! Validates:
//! - Non-empty input
//! - Date ordering (strictly increasing)
//! - Price validity (finite, > 0)
//! - Calendar gaps (advisory; holidays make short gaps normal)

use crate::data::PricePoint;

/// Result of a single validation check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    /// A failed blocking check makes the series unusable.
    pub blocking: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            blocking: false,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn fail(name: &str, message: &str, blocking: bool, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            blocking,
            message: message.to_string(),
            details,
        }
    }
}

/// All checks run over one price history.
#[derive(Debug)]
pub struct IntegrityReport {
    pub observations: usize,
    pub checks: Vec<CheckResult>,
}

impl IntegrityReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn first_blocking_failure(&self) -> Option<&CheckResult> {
        self.checks.iter().find(|c| !c.passed && c.blocking)
    }

    pub fn summary(&self) -> String {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        format!(
            "{} observations: {}/{} checks passed",
            self.observations,
            passed,
            self.checks.len()
        )
    }
}

/// Validator for price histories.
pub struct PriceSeriesValidator {
    max_gap_days: i64,
}

impl Default for PriceSeriesValidator {
    fn default() -> Self {
        Self { max_gap_days: 5 }
    }
}

impl PriceSeriesValidator {
    pub fn new(max_gap_days: i64) -> Self {
        Self { max_gap_days }
    }

    pub fn validate(&self, points: &[PricePoint]) -> IntegrityReport {
        let mut checks = vec![Self::check_non_empty(points)];

        if !points.is_empty() {
            checks.push(Self::check_date_order(points));
            checks.push(Self::check_prices(points));
            checks.push(self.check_gaps(points));
        }

        IntegrityReport {
            observations: points.len(),
            checks,
        }
    }

    fn check_non_empty(points: &[PricePoint]) -> CheckResult {
        if points.is_empty() {
            CheckResult::fail("non_empty", "price series is empty", true, None)
        } else {
            CheckResult::pass("non_empty", "series has observations")
        }
    }

    fn check_date_order(points: &[PricePoint]) -> CheckResult {
        let violations: Vec<String> = points
            .windows(2)
            .filter(|w| w[1].date <= w[0].date)
            .map(|w| format!("{} -> {}", w[0].date, w[1].date))
            .collect();

        if violations.is_empty() {
            CheckResult::pass("date_order", "dates strictly increasing")
        } else {
            CheckResult::fail(
                "date_order",
                &format!("{} out-of-order or duplicate dates", violations.len()),
                true,
                Some(violations.into_iter().take(5).collect::<Vec<_>>().join(", ")),
            )
        }
    }

    fn check_prices(points: &[PricePoint]) -> CheckResult {
        let bad: Vec<String> = points
            .iter()
            .filter(|p| !p.price.is_finite() || p.price <= 0.0)
            .map(|p| format!("{}={}", p.date, p.price))
            .collect();

        if bad.is_empty() {
            CheckResult::pass("price_validity", "all prices finite and positive")
        } else {
            CheckResult::fail(
                "price_validity",
                &format!("{} non-positive or non-finite prices", bad.len()),
                true,
                Some(bad.into_iter().take(5).collect::<Vec<_>>().join(", ")),
            )
        }
    }

    fn check_gaps(&self, points: &[PricePoint]) -> CheckResult {
        let gaps: Vec<String> = points
            .windows(2)
            .filter(|w| (w[1].date - w[0].date).num_days() > self.max_gap_days)
            .map(|w| format!("{} -> {}", w[0].date, w[1].date))
            .collect();

        if gaps.is_empty() {
            CheckResult::pass("date_gaps", "no gaps beyond threshold")
        } else {
            CheckResult::fail(
                "date_gaps",
                &format!(
                    "{} gaps longer than {} days",
                    gaps.len(),
                    self.max_gap_days
                ),
                false,
                Some(gaps.into_iter().take(5).collect::<Vec<_>>().join(", ")),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn point(d: u32, price: f64) -> PricePoint {
        PricePoint::new(NaiveDate::from_ymd_opt(2024, 3, d).unwrap(), price)
    }

    #[test]
    fn test_clean_series_passes() {
        let report = PriceSeriesValidator::default()
            .validate(&[point(1, 10.0), point(4, 10.5), point(5, 10.2)]);
        assert!(report.all_passed());
        assert_eq!(report.checks.len(), 4);
    }

    #[test]
    fn test_gap_is_advisory() {
        let report = PriceSeriesValidator::default().validate(&[point(1, 10.0), point(20, 11.0)]);
        assert!(!report.all_passed());
        assert!(report.first_blocking_failure().is_none());
        assert_eq!(report.failed_checks()[0].name, "date_gaps");
    }

    #[test]
    fn test_nan_price_is_blocking() {
        let report = PriceSeriesValidator::new(10).validate(&[point(1, 10.0), point(2, f64::NAN)]);
        let failure = report.first_blocking_failure().unwrap();
        assert_eq!(failure.name, "price_validity");
    }

    #[test]
    fn test_empty_only_runs_first_check() {
        let report = PriceSeriesValidator::default().validate(&[]);
        assert_eq!(report.checks.len(), 1);
        assert!(report.first_blocking_failure().is_some());
        assert_eq!(report.summary(), "0 observations: 0/1 checks passed");
    }
}
