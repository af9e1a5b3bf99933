//! Moving-average crossover detection.
//!
//! A short EMA above the long EMA is bullish, below is bearish, exactly equal
//! is neutral. A crossover is a decisive state that differs from the most
//! recent decisive state before it, so touches that bounce back and the first
//! decisive state after a neutral start are not events.

use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};

use super::ema::ema;

/// Relative order of the short and long EMA at one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalState {
    Bullish,
    Bearish,
    Neutral,
}

impl SignalState {
    pub fn from_emas(short: f64, long: f64) -> Self {
        if short > long {
            Self::Bullish
        } else if short < long {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }

    pub fn is_decisive(&self) -> bool {
        !matches!(self, Self::Neutral)
    }

    /// +1 / -1 / 0.
    pub fn sign(&self) -> i8 {
        match self {
            Self::Bullish => 1,
            Self::Bearish => -1,
            Self::Neutral => 0,
        }
    }
}

/// One crossover event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crossover {
    /// Index into the EMA series where the new state first holds.
    pub index: usize,
    /// Last decisive state before the event.
    pub from: SignalState,
    /// Decisive state at `index`.
    pub to: SignalState,
}

/// Per-index states plus the crossover events among them.
#[derive(Debug, Clone, Default)]
pub struct SignalSeries {
    pub states: Vec<SignalState>,
    pub crossovers: Vec<Crossover>,
}

impl SignalSeries {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn event_at(&self, index: usize) -> Option<&Crossover> {
        self.crossovers.iter().find(|c| c.index == index)
    }

    pub fn is_event(&self, index: usize) -> bool {
        self.event_at(index).is_some()
    }

    pub fn last_state(&self) -> Option<SignalState> {
        self.states.last().copied()
    }
}

/// Two-span EMA crossover detector.
#[derive(Debug, Clone, Copy)]
pub struct SignalDetector {
    short_span: usize,
    long_span: usize,
}

impl SignalDetector {
    pub fn new(short_span: usize, long_span: usize) -> Result<Self> {
        if short_span == 0 || long_span == 0 {
            return Err(BacktestError::InvalidInput(
                "EMA spans must be positive".to_string(),
            ));
        }
        if short_span >= long_span {
            return Err(BacktestError::InvalidInput(format!(
                "short span {} must be below long span {}",
                short_span, long_span
            )));
        }
        Ok(Self {
            short_span,
            long_span,
        })
    }

    pub fn short_span(&self) -> usize {
        self.short_span
    }

    pub fn long_span(&self) -> usize {
        self.long_span
    }

    /// Smooth `prices` with both spans and detect on the result.
    pub fn smooth_and_detect(
        &self,
        prices: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>, SignalSeries)> {
        let short = ema(prices, self.short_span)?;
        let long = ema(prices, self.long_span)?;
        let signals = Self::detect(&short, &long)?;
        Ok((short, long, signals))
    }

    /// States and crossover events for two aligned EMA series.
    pub fn detect(short: &[f64], long: &[f64]) -> Result<SignalSeries> {
        if short.len() != long.len() {
            return Err(BacktestError::InvalidInput(format!(
                "EMA series lengths differ: {} vs {}",
                short.len(),
                long.len()
            )));
        }

        let states: Vec<SignalState> = short
            .iter()
            .zip(long.iter())
            .map(|(&s, &l)| SignalState::from_emas(s, l))
            .collect();

        let mut crossovers = Vec::new();
        let mut last_decisive: Option<SignalState> = None;

        for (index, &state) in states.iter().enumerate() {
            if !state.is_decisive() {
                continue;
            }
            if let Some(prev) = last_decisive {
                if prev != state {
                    crossovers.push(Crossover {
                        index,
                        from: prev,
                        to: state,
                    });
                }
            }
            last_decisive = Some(state);
        }

        Ok(SignalSeries { states, crossovers })
    }
}
