//! Core backtesting engine.
//!
//! Runs the simulation loop over the test window:
//! 1. Decay time to expiry linearly across the window
//! 2. Reprice the put and its Greeks at the day's close
//! 3. On an EMA crossover, rebalance the hedge and book realized P&L
//! 4. Record the day's legs, P&L and cumulative return
//! 5. On the last day, settle the open hedge in the final signal direction

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data::{PriceDataSource, PriceSeries};
use crate::error::{BacktestError, Result};
use crate::pricing::{GreeksSnapshot, OptionParameters, OptionPricer, VolatilityEstimator};
use crate::signal::{ema, SignalDetector, SignalState};

use super::rebalance::{rebalance, HedgeMark, TradeDirection};
use super::trade::{PortfolioState, Transaction, TransactionKind};

/// Configuration for backtest execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Capital allocated to the hedge.
    pub total_capital: Decimal,

    /// Span of the fast EMA.
    pub short_span: usize,

    /// Span of the slow EMA.
    pub long_span: usize,

    /// Strike as a multiple of the first test-day price.
    pub strike_ratio: f64,

    /// Time to expiry at the start of the test window, in years.
    pub time_to_expiry: f64,

    /// Annualized risk-free rate.
    pub risk_free_rate: f64,

    /// Overrides the data source's dividend yield when set.
    pub dividend_yield: Option<f64>,

    /// Years of history requested before the as-of date.
    pub history_years: u32,

    /// Observations at the end of the history used as the test window.
    pub test_days: usize,

    /// Observations the EMAs are computed over (ends on the last test day).
    pub signal_lookback: usize,

    /// Annualization factor for volatility.
    pub trading_days_per_year: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            total_capital: Decimal::from(100_000),
            short_span: 20,
            long_span: 35,
            strike_ratio: 1.05,
            time_to_expiry: 1.0,
            risk_free_rate: 0.05,
            dividend_yield: None,
            history_years: 5,
            test_days: 250,
            signal_lookback: 252,
            trading_days_per_year: 252.0,
        }
    }
}

impl BacktestConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Capital as a float for the simulation arithmetic.
    pub fn capital(&self) -> Result<f64> {
        let capital: f64 = self.total_capital.try_into().map_err(|_| {
            BacktestError::InvalidParameters(format!(
                "capital {} is not representable",
                self.total_capital
            ))
        })?;
        Ok(capital)
    }

    /// Spans and lookback are configuration errors; the remaining checks
    /// raise the same error kinds the pricer and the split would.
    pub fn validate(&self) -> Result<()> {
        if self.short_span == 0 || self.short_span >= self.long_span {
            return Err(BacktestError::Config(format!(
                "spans must satisfy 0 < short ({}) < long ({})",
                self.short_span, self.long_span
            )));
        }
        if self.history_years == 0 {
            return Err(BacktestError::Config(
                "history_years must be at least 1".to_string(),
            ));
        }
        if self.total_capital <= Decimal::ZERO {
            return Err(BacktestError::InvalidParameters(format!(
                "total_capital must be positive, got {}",
                self.total_capital
            )));
        }
        if !(self.strike_ratio > 0.0) {
            return Err(BacktestError::InvalidParameters(format!(
                "strike_ratio must be positive, got {}",
                self.strike_ratio
            )));
        }
        if !(self.time_to_expiry > 0.0) {
            return Err(BacktestError::InvalidParameters(format!(
                "time_to_expiry must be positive, got {}",
                self.time_to_expiry
            )));
        }
        if !(self.trading_days_per_year > 0.0) {
            return Err(BacktestError::InvalidParameters(format!(
                "trading_days_per_year must be positive, got {}",
                self.trading_days_per_year
            )));
        }
        if self.test_days < 2 {
            return Err(BacktestError::InsufficientData(format!(
                "test window must hold at least 2 days, got {}",
                self.test_days
            )));
        }
        if self.signal_lookback < self.test_days + 1 {
            return Err(BacktestError::Config(format!(
                "signal_lookback ({}) must cover the test window plus one day ({})",
                self.signal_lookback,
                self.test_days + 1
            )));
        }
        Ok(())
    }
}

/// End-of-day snapshot of the hedge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRecord {
    pub day: usize,
    pub date: NaiveDate,
    pub price: f64,
    pub short_ema: f64,
    pub long_ema: f64,
    pub signal: SignalState,
    pub time_to_expiry: f64,
    pub greeks: GreeksSnapshot,
    pub stock_leg: f64,
    pub option_leg: f64,
    pub cash: f64,
    /// Realized P&L booked this day (scaled by quantity).
    pub daily_pnl: f64,
    /// Running P&L per unit of underlying, offset by the initial spot.
    pub cumulative_return: f64,
}

/// Result of a completed backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub ticker: String,
    pub config: BacktestConfig,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Annualized volatility from the training window.
    pub volatility: f64,
    pub dividend_yield: f64,
    pub initial_price: f64,
    pub strike: f64,
    /// Units of underlying the capital buys at the initial price.
    pub quantity: f64,
    pub initial_greeks: GreeksSnapshot,
    pub daily: Vec<DailyRecord>,
    pub transactions: Vec<Transaction>,
    pub final_state: PortfolioState,
}

impl BacktestResult {
    pub fn trading_days(&self) -> usize {
        self.daily.len()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.daily.iter().map(|d| d.price).collect()
    }

    pub fn short_ema(&self) -> Vec<f64> {
        self.daily.iter().map(|d| d.short_ema).collect()
    }

    pub fn long_ema(&self) -> Vec<f64> {
        self.daily.iter().map(|d| d.long_ema).collect()
    }

    pub fn stock_leg(&self) -> Vec<f64> {
        self.daily.iter().map(|d| d.stock_leg).collect()
    }

    pub fn option_leg(&self) -> Vec<f64> {
        self.daily.iter().map(|d| d.option_leg).collect()
    }

    pub fn daily_pnl(&self) -> Vec<f64> {
        self.daily.iter().map(|d| d.daily_pnl).collect()
    }

    pub fn cumulative_returns(&self) -> Vec<f64> {
        self.daily.iter().map(|d| d.cumulative_return).collect()
    }

    pub fn total_realized_pnl(&self) -> f64 {
        self.final_state.realized_pnl
    }

    /// Rebalances triggered by crossovers (settlement excluded).
    pub fn crossover_count(&self) -> usize {
        self.transactions
            .iter()
            .filter(|t| t.kind == TransactionKind::Crossover)
            .count()
    }

    /// Return on investment in percent of the initial spot.
    pub fn roi_pct(&self) -> f64 {
        match self.daily.last() {
            Some(last) => 100.0 * (last.cumulative_return - self.initial_price) / self.initial_price,
            None => 0.0,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Generate summary string.
    pub fn summary(&self) -> String {
        format!(
            "{} Backtest ({} to {})\n\
             ----------------------------------------\n\
             Volatility: {:.2}%\n\
             Strike: {:.2} (spot {:.2})\n\
             Initial Put: {:.2}, Delta: {:.2}, Gamma: {:.4}, Vega: {:.2}, Theta: {:.2}, Rho: {:.2}\n\
             \n\
             Rebalances: {} (+ {} settlement)\n\
             Realized P&L: ${:.2}\n\
             ROI: {:.2}%",
            self.ticker,
            self.start_date,
            self.end_date,
            self.volatility * 100.0,
            self.strike,
            self.initial_price,
            self.initial_greeks.price,
            self.initial_greeks.delta,
            self.initial_greeks.gamma,
            self.initial_greeks.vega,
            self.initial_greeks.theta,
            self.initial_greeks.rho,
            self.crossover_count(),
            self.transactions.len() - self.crossover_count(),
            self.total_realized_pnl(),
            self.roi_pct(),
        )
    }
}

/// Aligned inputs for one simulation.
///
/// The EMA series hold one more value than the test window: index 0 is the
/// day before the window and index `i + 1` is test day `i`.
#[derive(Debug, Clone, Copy)]
pub struct SimulationInputs<'a> {
    pub prices: &'a PriceSeries,
    pub short_ema: &'a [f64],
    pub long_ema: &'a [f64],
    pub volatility: f64,
    pub dividend_yield: f64,
}

/// Hedge bookkeeping carried across days.
struct Ledger<'a> {
    ticker: &'a str,
    capital: f64,
    quantity: f64,
    state: PortfolioState,
    last_mark: HedgeMark,
    transactions: Vec<Transaction>,
}

impl Ledger<'_> {
    /// Rebalance against the last traded mark; returns the scaled P&L.
    fn rebalance(
        &mut self,
        day: usize,
        date: NaiveDate,
        kind: TransactionKind,
        direction: TradeDirection,
        greeks: &GreeksSnapshot,
        price: f64,
    ) -> f64 {
        let now = HedgeMark::new(price, greeks);
        let outcome = rebalance(direction, &now, &self.last_mark);
        let pnl = outcome.realized_pnl * self.quantity;

        info!(
            ticker = self.ticker,
            kind = ?kind,
            direction = direction.as_str(),
            delta = greeks.delta,
            price,
            prev_price = self.last_mark.price,
            pnl,
            "rebalance"
        );

        self.state.apply(&outcome, pnl, self.capital);
        self.transactions.push(Transaction {
            day,
            date,
            kind,
            direction,
            greeks: *greeks,
            price,
            prev_price: self.last_mark.price,
            prev_delta: self.last_mark.delta,
            pnl,
            stock_leg: outcome.stock_leg,
            option_leg: outcome.option_leg,
        });
        self.last_mark = now;
        pnl
    }
}

/// Day-by-day delta-hedge simulator.
pub struct PortfolioSimulator {
    config: BacktestConfig,
    pricer: OptionPricer,
}

impl PortfolioSimulator {
    pub fn new(config: BacktestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            pricer: OptionPricer::new()?,
        })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn simulate(&self, ticker: &str, inputs: SimulationInputs<'_>) -> Result<BacktestResult> {
        let points = inputs.prices.points();
        let n = points.len();
        if n < 2 {
            return Err(BacktestError::InsufficientData(format!(
                "test window must hold at least 2 days, got {}",
                n
            )));
        }
        if inputs.short_ema.len() != n + 1 || inputs.long_ema.len() != n + 1 {
            return Err(BacktestError::InvalidInput(format!(
                "EMA series must hold {} values (test window + 1), got {} and {}",
                n + 1,
                inputs.short_ema.len(),
                inputs.long_ema.len()
            )));
        }

        let signals = SignalDetector::detect(inputs.short_ema, inputs.long_ema)?;
        let mut events = vec![None; n + 1];
        for crossover in &signals.crossovers {
            events[crossover.index] = Some(crossover.to);
        }

        let capital = self.config.capital()?;
        let initial_price = points[0].price;
        let strike = initial_price * self.config.strike_ratio;
        let quantity = capital / initial_price;
        let base = OptionParameters::new(
            initial_price,
            strike,
            self.config.time_to_expiry,
            self.config.risk_free_rate,
            inputs.volatility,
        )
        .with_dividend_yield(inputs.dividend_yield);

        let initial_greeks = self.pricer.put_greeks(&base)?;
        info!(
            ticker,
            put_price = initial_greeks.price,
            delta = initial_greeks.delta,
            gamma = initial_greeks.gamma,
            vega = initial_greeks.vega,
            theta = initial_greeks.theta,
            rho = initial_greeks.rho,
            "Greeks at initiation"
        );

        let mut ledger = Ledger {
            ticker,
            capital,
            quantity,
            state: PortfolioState::initial(capital, &initial_greeks),
            last_mark: HedgeMark::new(initial_price, &initial_greeks),
            transactions: Vec::new(),
        };

        let mut daily = Vec::with_capacity(n);
        let mut cumulative_pnl = 0.0;

        for (day, point) in points.iter().enumerate() {
            let signal_index = day + 1;
            let time_to_expiry = self.config.time_to_expiry - day as f64 / n as f64;
            let greeks = self.pricer.put_greeks(
                &base
                    .with_spot(point.price)
                    .with_time_to_expiry(time_to_expiry),
            )?;
            debug!(
                ticker,
                day,
                price = point.price,
                time_to_expiry,
                put_price = greeks.price,
                delta = greeks.delta,
                "repriced"
            );

            let mut day_pnl = 0.0;
            if let Some(direction) = events[signal_index].and_then(TradeDirection::from_state) {
                day_pnl += ledger.rebalance(
                    day,
                    point.date,
                    TransactionKind::Crossover,
                    direction,
                    &greeks,
                    point.price,
                );
            }

            let signal = signals.states[signal_index];
            if day == n - 1 {
                match TradeDirection::from_state(signal) {
                    Some(direction) => {
                        day_pnl += ledger.rebalance(
                            day,
                            point.date,
                            TransactionKind::Settlement,
                            direction,
                            &greeks,
                            point.price,
                        );
                    }
                    None => info!(ticker, "final signal neutral, no settlement"),
                }
            }

            cumulative_pnl += day_pnl;
            daily.push(DailyRecord {
                day,
                date: point.date,
                price: point.price,
                short_ema: inputs.short_ema[signal_index],
                long_ema: inputs.long_ema[signal_index],
                signal,
                time_to_expiry,
                greeks,
                stock_leg: ledger.state.stock_leg,
                option_leg: ledger.state.option_leg,
                cash: ledger.state.cash,
                daily_pnl: day_pnl,
                cumulative_return: cumulative_pnl / quantity + initial_price,
            });
        }

        let result = BacktestResult {
            ticker: ticker.to_string(),
            config: self.config.clone(),
            start_date: points[0].date,
            end_date: points[n - 1].date,
            volatility: inputs.volatility,
            dividend_yield: inputs.dividend_yield,
            initial_price,
            strike,
            quantity,
            initial_greeks,
            daily,
            transactions: ledger.transactions,
            final_state: ledger.state,
        };
        info!(
            ticker,
            roi_pct = result.roi_pct(),
            realized_pnl = result.total_realized_pnl(),
            rebalances = result.transactions.len(),
            "backtest complete"
        );
        Ok(result)
    }
}

/// Run one backtest for `ticker` with history ending at `as_of`.
pub fn run_backtest(
    ticker: &str,
    as_of: NaiveDate,
    config: &BacktestConfig,
    source: &dyn PriceDataSource,
) -> Result<BacktestResult> {
    config.validate()?;

    let start = as_of - Duration::days(i64::from(config.history_years) * 365);
    info!(ticker, %start, %as_of, "loading price history");
    let history = source.price_history(ticker, start, as_of)?;

    let split = history.split(config.test_days)?;
    let volatility = VolatilityEstimator::new(config.trading_days_per_year)
        .annualized_vol(&split.training.closes())?;

    if history.len() < config.signal_lookback {
        return Err(BacktestError::InsufficientData(format!(
            "{} has {} observations, signal lookback needs {}",
            ticker,
            history.len(),
            config.signal_lookback
        )));
    }
    let signal_prices: Vec<f64> = history
        .tail(config.signal_lookback)
        .iter()
        .map(|p| p.price)
        .collect();
    let short_ema = ema(&signal_prices, config.short_span)?;
    let long_ema = ema(&signal_prices, config.long_span)?;
    let aligned = short_ema.len() - (config.test_days + 1);

    let dividend_yield = match config.dividend_yield {
        Some(q) => q,
        None => match source.dividend_yield(ticker)? {
            Some(q) => q,
            None => {
                warn!(ticker, "dividend yield unavailable, using 0");
                0.0
            }
        },
    };

    let simulator = PortfolioSimulator::new(config.clone())?;
    simulator.simulate(
        ticker,
        SimulationInputs {
            prices: &split.testing,
            short_ema: &short_ema[aligned..],
            long_ema: &long_ema[aligned..],
            volatility,
            dividend_yield,
        },
    )
}

/// Run independent backtests in parallel; results keep the input order.
pub fn run_batch(
    tickers: &[&str],
    as_of: NaiveDate,
    config: &BacktestConfig,
    source: &dyn PriceDataSource,
) -> Vec<(String, Result<BacktestResult>)> {
    tickers
        .par_iter()
        .map(|&ticker| {
            let result = run_backtest(ticker, as_of, config, source);
            if let Err(e) = &result {
                warn!(ticker, error = %e, "backtest aborted");
            }
            (ticker.to_string(), result)
        })
        .collect()
}
