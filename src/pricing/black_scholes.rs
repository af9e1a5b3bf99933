//! Black-Scholes pricing and Greeks for European options.
//!
//! Continuous dividend yield q enters d1 and the spot discount of both prices.
//! The Greeks follow the hedging convention this backtester trades on:
//! - Delta: N(d1) for calls and puts alike (the stock-leg hedge ratio)
//! - Gamma: N'(d1) / (S sigma sqrt(T))
//! - Vega: S N'(d1) sqrt(T), per unit of volatility
//! - Theta: -S sigma N'(d1) / (2 sqrt(T)) - r K e^(-rT) N(d2), annualized
//! - Rho: K T e^(-rT) N(d2), per unit of rate

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{BacktestError, Result};

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

impl OptionKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "C" | "CALL" => Some(Self::Call),
            "P" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "C",
            Self::Put => "P",
        }
    }
}

/// Inputs for one pricing instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionParameters {
    /// Underlying price S.
    pub spot: f64,
    /// Strike K.
    pub strike: f64,
    /// Time to expiry T in years.
    pub time_to_expiry: f64,
    /// Annualized risk-free rate r.
    pub rate: f64,
    /// Annualized volatility sigma.
    pub volatility: f64,
    /// Continuous dividend yield q.
    pub dividend_yield: f64,
}

impl OptionParameters {
    pub fn new(spot: f64, strike: f64, time_to_expiry: f64, rate: f64, volatility: f64) -> Self {
        Self {
            spot,
            strike,
            time_to_expiry,
            rate,
            volatility,
            dividend_yield: 0.0,
        }
    }

    pub fn with_dividend_yield(mut self, dividend_yield: f64) -> Self {
        self.dividend_yield = dividend_yield;
        self
    }

    pub fn with_spot(mut self, spot: f64) -> Self {
        self.spot = spot;
        self
    }

    pub fn with_time_to_expiry(mut self, time_to_expiry: f64) -> Self {
        self.time_to_expiry = time_to_expiry;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let finite = [
            self.spot,
            self.strike,
            self.time_to_expiry,
            self.rate,
            self.volatility,
            self.dividend_yield,
        ]
        .iter()
        .all(|v| v.is_finite());

        if !finite {
            return Err(BacktestError::InvalidParameters(format!(
                "non-finite pricing input: {:?}",
                self
            )));
        }
        if self.spot <= 0.0 {
            return Err(BacktestError::InvalidParameters(format!(
                "spot must be positive, got {}",
                self.spot
            )));
        }
        if self.strike <= 0.0 {
            return Err(BacktestError::InvalidParameters(format!(
                "strike must be positive, got {}",
                self.strike
            )));
        }
        if self.time_to_expiry <= 0.0 {
            return Err(BacktestError::InvalidParameters(format!(
                "time to expiry must be positive, got {}",
                self.time_to_expiry
            )));
        }
        if self.volatility < 0.0 {
            return Err(BacktestError::InvalidParameters(format!(
                "volatility must be non-negative, got {}",
                self.volatility
            )));
        }
        Ok(())
    }
}

/// Fair value and Greeks at one pricing instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GreeksSnapshot {
    pub price: f64,
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub theta: f64,
    pub rho: f64,
}

impl GreeksSnapshot {
    pub fn is_finite(&self) -> bool {
        [
            self.price, self.delta, self.gamma, self.vega, self.theta, self.rho,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Greeks at one spot level of a profile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProfilePoint {
    pub spot: f64,
    pub greeks: GreeksSnapshot,
}

/// Intermediate terms shared by price and Greeks.
struct Terms {
    /// N(d1), or the deterministic limit when sigma = 0.
    n_d1: f64,
    n_d2: f64,
    n_neg_d1: f64,
    n_neg_d2: f64,
    /// N'(d1).
    pdf_d1: f64,
    spot_discount: f64,
    strike_discount: f64,
}

/// Black-Scholes calculator.
pub struct OptionPricer {
    normal: Normal,
}

impl OptionPricer {
    pub fn new() -> Result<Self> {
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| BacktestError::InvalidParameters(format!("standard normal: {}", e)))?;
        Ok(Self { normal })
    }

    /// Standard normal PDF.
    fn norm_pdf(x: f64) -> f64 {
        (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
    }

    /// Calculate d1 and d2.
    pub fn d1_d2(params: &OptionParameters) -> (f64, f64) {
        let vol_sqrt_t = params.volatility * params.time_to_expiry.sqrt();
        let numerator = (params.spot / params.strike).ln()
            + (params.rate - params.dividend_yield + 0.5 * params.volatility.powi(2))
                * params.time_to_expiry;
        let d1 = numerator / vol_sqrt_t;
        (d1, d1 - vol_sqrt_t)
    }

    fn terms(&self, params: &OptionParameters) -> Result<Terms> {
        params.validate()?;

        let spot_discount = (-params.dividend_yield * params.time_to_expiry).exp();
        let strike_discount = (-params.rate * params.time_to_expiry).exp();

        if params.volatility == 0.0 {
            // Deterministic forward: d1 and d2 run to +/- infinity together.
            let forward = params.spot * spot_discount;
            let discounted_strike = params.strike * strike_discount;
            let (ind, pdf_d1) = if forward > discounted_strike {
                (1.0, 0.0)
            } else if forward < discounted_strike {
                (0.0, 0.0)
            } else {
                (0.5, Self::norm_pdf(0.0))
            };
            return Ok(Terms {
                n_d1: ind,
                n_d2: ind,
                n_neg_d1: 1.0 - ind,
                n_neg_d2: 1.0 - ind,
                pdf_d1,
                spot_discount,
                strike_discount,
            });
        }

        let (d1, d2) = Self::d1_d2(params);
        Ok(Terms {
            n_d1: self.normal.cdf(d1),
            n_d2: self.normal.cdf(d2),
            n_neg_d1: self.normal.cdf(-d1),
            n_neg_d2: self.normal.cdf(-d2),
            pdf_d1: Self::norm_pdf(d1),
            spot_discount,
            strike_discount,
        })
    }

    fn price_from_terms(params: &OptionParameters, t: &Terms, kind: OptionKind) -> f64 {
        match kind {
            OptionKind::Call => {
                params.spot * t.spot_discount * t.n_d1 - params.strike * t.strike_discount * t.n_d2
            }
            OptionKind::Put => {
                params.strike * t.strike_discount * t.n_neg_d2
                    - params.spot * t.spot_discount * t.n_neg_d1
            }
        }
    }

    /// Calculate call option price.
    pub fn call_price(&self, params: &OptionParameters) -> Result<f64> {
        self.price(params, OptionKind::Call)
    }

    /// Calculate put option price.
    pub fn put_price(&self, params: &OptionParameters) -> Result<f64> {
        self.price(params, OptionKind::Put)
    }

    pub fn price(&self, params: &OptionParameters, kind: OptionKind) -> Result<f64> {
        let t = self.terms(params)?;
        Ok(Self::price_from_terms(params, &t, kind))
    }

    /// Price and the five Greeks in one pass.
    pub fn greeks(&self, params: &OptionParameters, kind: OptionKind) -> Result<GreeksSnapshot> {
        let t = self.terms(params)?;
        let sqrt_t = params.time_to_expiry.sqrt();
        let vol_sqrt_t = params.volatility * sqrt_t;

        let gamma = if vol_sqrt_t > 0.0 {
            t.pdf_d1 / (params.spot * vol_sqrt_t)
        } else {
            0.0
        };
        let theta = -params.spot * params.volatility * t.pdf_d1 / (2.0 * sqrt_t)
            - params.rate * params.strike * t.strike_discount * t.n_d2;

        Ok(GreeksSnapshot {
            price: Self::price_from_terms(params, &t, kind),
            delta: t.n_d1,
            gamma,
            vega: params.spot * t.pdf_d1 * sqrt_t,
            theta,
            rho: params.strike * params.time_to_expiry * t.strike_discount * t.n_d2,
        })
    }

    pub fn put_greeks(&self, params: &OptionParameters) -> Result<GreeksSnapshot> {
        self.greeks(params, OptionKind::Put)
    }

    pub fn call_greeks(&self, params: &OptionParameters) -> Result<GreeksSnapshot> {
        self.greeks(params, OptionKind::Call)
    }

    /// Greeks over `steps` evenly spaced spots from `low` to `high` inclusive.
    pub fn greeks_profile(
        &self,
        params: &OptionParameters,
        kind: OptionKind,
        low: f64,
        high: f64,
        steps: usize,
    ) -> Result<Vec<ProfilePoint>> {
        if steps < 2 || !(low < high) {
            return Err(BacktestError::InvalidInput(format!(
                "profile needs low < high and at least 2 steps, got [{}, {}] x {}",
                low, high, steps
            )));
        }

        let step = (high - low) / (steps - 1) as f64;
        (0..steps)
            .map(|i| {
                let spot = low + step * i as f64;
                let greeks = self.greeks(&params.with_spot(spot), kind)?;
                Ok(ProfilePoint { spot, greeks })
            })
            .collect()
    }
}

/// Shares to short against `contracts` long options with the given delta.
pub fn hedge_shares(delta: f64, contracts: f64) -> f64 {
    delta * contracts
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pricer() -> OptionPricer {
        OptionPricer::new().unwrap()
    }

    #[test]
    fn test_reference_prices() {
        let params = OptionParameters::new(100.0, 105.0, 1.0, 0.05, 0.2);
        let call = pricer().call_price(&params).unwrap();
        let put = pricer().put_price(&params).unwrap();
        assert_relative_eq!(call, 8.02, epsilon = 0.01);
        assert_relative_eq!(put, 7.90, epsilon = 0.01);
    }

    #[test]
    fn test_put_call_parity() {
        let pricer = pricer();
        for &(spot, strike, time, rate, vol, q) in &[
            (100.0, 100.0, 1.0, 0.05, 0.20, 0.0),
            (100.0, 105.0, 0.5, 0.03, 0.35, 0.02),
            (42.0, 30.0, 2.0, 0.01, 0.60, 0.04),
        ] {
            let params = OptionParameters::new(spot, strike, time, rate, vol).with_dividend_yield(q);
            let call = pricer.call_price(&params).unwrap();
            let put = pricer.put_price(&params).unwrap();
            let rhs = spot * (-q * time).exp() - strike * (-rate * time).exp();
            assert_relative_eq!(call - put, rhs, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_greeks_bounds() {
        let pricer = pricer();
        for &spot in &[20.0, 80.0, 100.0, 125.0, 400.0] {
            for &time in &[0.004, 0.25, 1.0, 3.0] {
                for &vol in &[0.05, 0.2, 0.9] {
                    let params = OptionParameters::new(spot, 105.0, time, 0.05, vol);
                    for kind in [OptionKind::Call, OptionKind::Put] {
                        let g = pricer.greeks(&params, kind).unwrap();
                        assert!(g.is_finite());
                        assert!((0.0..=1.0).contains(&g.delta));
                        assert!(g.gamma >= 0.0);
                        assert!(g.vega >= 0.0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_put_shares_call_greeks() {
        let params = OptionParameters::new(100.0, 105.0, 1.0, 0.05, 0.2);
        let call = pricer().call_greeks(&params).unwrap();
        let put = pricer().put_greeks(&params).unwrap();
        assert_eq!(call.delta, put.delta);
        assert_eq!(call.theta, put.theta);
        assert_eq!(call.rho, put.rho);
        assert!(call.price > put.price);
    }

    #[test]
    fn test_reference_greeks() {
        let params = OptionParameters::new(100.0, 105.0, 1.0, 0.05, 0.2);
        let g = pricer().put_greeks(&params).unwrap();
        // d1 = 0.10604
        assert_relative_eq!(g.delta, 0.5422, epsilon = 1e-3);
        assert_relative_eq!(g.gamma, 0.01984, epsilon = 1e-4);
        assert_relative_eq!(g.vega, 39.67, epsilon = 0.01);
        assert_relative_eq!(g.theta, -6.277, epsilon = 0.01);
        assert_relative_eq!(g.rho, 46.20, epsilon = 0.05);
    }

    #[test]
    fn test_zero_volatility_is_deterministic() {
        let pricer = pricer();
        // forward ITM for the call: 100 > 105 * e^-0.05 = 99.88
        let params = OptionParameters::new(100.0, 105.0, 1.0, 0.05, 0.0);
        let g = pricer.put_greeks(&params).unwrap();
        assert_eq!(g.price, 0.0);
        assert_eq!(g.delta, 1.0);
        assert_eq!(g.gamma, 0.0);
        assert_eq!(g.vega, 0.0);

        let call = pricer.call_price(&params).unwrap();
        assert_relative_eq!(call, 100.0 - 105.0 * (-0.05_f64).exp(), epsilon = 1e-12);

        let late = params.with_time_to_expiry(0.1);
        let put = pricer.put_price(&late).unwrap();
        assert_relative_eq!(put, 105.0 * (-0.005_f64).exp() - 100.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_parameters() {
        let pricer = pricer();
        let base = OptionParameters::new(100.0, 105.0, 1.0, 0.05, 0.2);
        let bad = [
            base.with_spot(0.0),
            OptionParameters { strike: -1.0, ..base },
            base.with_time_to_expiry(0.0),
            base.with_time_to_expiry(-0.01),
            OptionParameters { volatility: -0.1, ..base },
            OptionParameters { rate: f64::NAN, ..base },
        ];
        for params in bad {
            assert!(matches!(
                pricer.put_greeks(&params),
                Err(BacktestError::InvalidParameters(_))
            ));
        }
    }

    #[test]
    fn test_greeks_profile() {
        let params = OptionParameters::new(100.0, 105.0, 1.0, 0.05, 0.25);
        let profile = pricer()
            .greeks_profile(&params, OptionKind::Call, 50.0, 150.0, 100)
            .unwrap();

        assert_eq!(profile.len(), 100);
        assert_relative_eq!(profile[0].spot, 50.0);
        assert_relative_eq!(profile[99].spot, 150.0, epsilon = 1e-9);
        for pair in profile.windows(2) {
            assert!(pair[1].greeks.delta >= pair[0].greeks.delta);
        }
        assert!(pricer()
            .greeks_profile(&params, OptionKind::Call, 150.0, 50.0, 10)
            .is_err());
    }

    #[test]
    fn test_hedge_shares() {
        assert_relative_eq!(hedge_shares(0.54, 10.0), 5.4, epsilon = 1e-12);
    }

    #[test]
    fn test_option_kind_parsing() {
        assert_eq!(OptionKind::from_str("C"), Some(OptionKind::Call));
        assert_eq!(OptionKind::from_str("put"), Some(OptionKind::Put));
        assert_eq!(OptionKind::from_str("X"), None);
        assert_eq!(OptionKind::Put.as_str(), "P");
    }
}
