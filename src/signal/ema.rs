//! Exponential moving average.
//!
//! alpha = 2 / (span + 1). The first output is the first input (seed) and each
//! later output is `alpha * price + (1 - alpha) * previous`.

use crate::error::{BacktestError, Result};

/// Smoothing factor for a span.
pub fn smoothing_factor(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// EMA of `prices`, same length and index alignment as the input.
pub fn ema(prices: &[f64], span: usize) -> Result<Vec<f64>> {
    if prices.is_empty() {
        return Err(BacktestError::InvalidInput(
            "cannot smooth an empty price sequence".to_string(),
        ));
    }
    let mut smoother = EmaSmoother::new(span)?;
    Ok(prices.iter().map(|&p| smoother.update(p)).collect())
}

/// Streaming form of [`ema`]: O(1) state.
#[derive(Debug, Clone)]
pub struct EmaSmoother {
    span: usize,
    alpha: f64,
    value: Option<f64>,
}

impl EmaSmoother {
    pub fn new(span: usize) -> Result<Self> {
        if span == 0 {
            return Err(BacktestError::InvalidInput(
                "EMA span must be positive".to_string(),
            ));
        }
        Ok(Self {
            span,
            alpha: smoothing_factor(span),
            value: None,
        })
    }

    pub fn span(&self) -> usize {
        self.span
    }

    /// Current smoothed value, `None` before the first update.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Feed one price and return the new smoothed value.
    pub fn update(&mut self, price: f64) -> f64 {
        let next = match self.value {
            None => price,
            // Same as alpha * price + (1 - alpha) * prev, but exact on flat input.
            Some(prev) => prev + self.alpha * (price - prev),
        };
        self.value = Some(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_recurrence() {
        // span 3 -> alpha 0.5
        let out = ema(&[1.0, 2.0, 3.0], 3).unwrap();
        assert_eq!(out, vec![1.0, 1.5, 2.25]);
    }

    #[test]
    fn test_seed_is_first_price() {
        let out = ema(&[42.0, 10.0], 20).unwrap();
        assert_eq!(out[0], 42.0);
        assert_relative_eq!(out[1], 42.0 + (10.0 - 42.0) * 2.0 / 21.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_input_is_fixed_point() {
        for span in [1, 2, 20, 35, 200] {
            let out = ema(&[73.5; 50], span).unwrap();
            for v in out {
                assert_relative_eq!(v, 73.5, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_reapplication_to_flat_output_stays_flat() {
        let once = ema(&[100.0; 30], 20).unwrap();
        let twice = ema(&once, 35).unwrap();
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_converged_value_stays_constant() {
        let mut prices = vec![50.0; 10];
        prices.extend(vec![80.0; 400]);
        let out = ema(&prices, 5).unwrap();

        let tail = &out[300..];
        for pair in tail.windows(2) {
            assert_relative_eq!(pair[0], 80.0, epsilon = 1e-9);
            assert_relative_eq!(pair[1], pair[0], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_output_between_inputs() {
        let prices = [10.0, 12.0, 9.0, 15.0, 11.0];
        let out = ema(&prices, 4).unwrap();
        assert_eq!(out.len(), prices.len());
        for i in 1..prices.len() {
            let lo = prices[i].min(out[i - 1]);
            let hi = prices[i].max(out[i - 1]);
            assert!(out[i] >= lo && out[i] <= hi);
        }
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(ema(&[], 10), Err(BacktestError::InvalidInput(_))));
        assert!(matches!(ema(&[1.0], 0), Err(BacktestError::InvalidInput(_))));
    }

    #[test]
    fn test_streaming_matches_batch() {
        let prices = [3.0, 4.0, 8.0, 1.0];
        let mut smoother = EmaSmoother::new(6).unwrap();
        assert_eq!(smoother.value(), None);
        let streamed: Vec<f64> = prices.iter().map(|&p| smoother.update(p)).collect();
        assert_eq!(streamed, ema(&prices, 6).unwrap());
        assert_eq!(smoother.span(), 6);
    }
}
