//! Incremental indicator series.
//!
//! Every kind folds one bar at a time into its own rolling state through the
//! `Indicator` trait. `step(.., is_new_bar = true)` appends a bar (push into
//! the windows, evicting the oldest), `step(.., is_new_bar = false)` revises
//! the newest bar in place. Revising a bar any number of times must end in the
//! same state as stepping it once with its final values.
//!
//! The kinds form a closed set (`IndicatorState`), so dispatch is a `match`
//! rather than a trait object.

pub mod atr;
pub mod bollinger;
pub mod cci;
pub mod config;
pub mod heikin_ashi;
pub mod macd;
pub mod money_flow;
pub mod moving_average;
pub mod oscillator;
pub mod pivot;
pub mod rsi;
pub mod series;
pub mod smoothing;
pub mod stochastic;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::series::BarSeries;

pub use atr::Atr;
pub use bollinger::Bollinger;
pub use cci::Cci;
pub use config::{IndicatorConfig, MovingAverageKind, PivotBias, Smoothing};
pub use heikin_ashi::HeikinAshi;
pub use macd::Macd;
pub use money_flow::MoneyFlow;
pub use moving_average::MovingAverage;
pub use oscillator::Oscillator;
pub use pivot::{Pivot, PivotSide};
pub use rsi::Rsi;
pub use series::{IndicatorSeries, IndicatorState};
pub use smoothing::{RecursiveAverage, Smoother};
pub use stochastic::Stochastic;

/// Errors raised when an indicator is configured.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndicatorError {
    #[error("{indicator}: invalid parameter `{parameter}`: {reason}")]
    InvalidParameter {
        indicator: &'static str,
        parameter: &'static str,
        reason: String,
    },
}

impl IndicatorError {
    pub(crate) fn invalid(
        indicator: &'static str,
        parameter: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        IndicatorError::InvalidParameter {
            indicator,
            parameter,
            reason: reason.into(),
        }
    }
}

/// One computed value. Multi-line indicators carry all their lines together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum IndicatorValue {
    Single(f64),
    Macd {
        macd: f64,
        signal: f64,
        histogram: f64,
    },
    Bands {
        upper: f64,
        middle: f64,
        lower: f64,
    },
    Stochastic {
        k: f64,
        d: f64,
    },
    Candle {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
    Pivot {
        side: PivotSide,
        /// Bar index of the pivot itself (earlier than the confirming bar).
        pivot_index: usize,
        price: f64,
    },
}

impl IndicatorValue {
    /// The headline number of the value: the line itself, the MACD line,
    /// the middle band, %K, the synthetic close, or the pivot price.
    pub fn primary(&self) -> f64 {
        match *self {
            IndicatorValue::Single(v) => v,
            IndicatorValue::Macd { macd, .. } => macd,
            IndicatorValue::Bands { middle, .. } => middle,
            IndicatorValue::Stochastic { k, .. } => k,
            IndicatorValue::Candle { close, .. } => close,
            IndicatorValue::Pivot { price, .. } => price,
        }
    }
}

/// Output point aligned with a bar of the owning series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub bar_index: usize,
    pub time: DateTime<Utc>,
    pub value: IndicatorValue,
}

/// Incremental indicator over a `BarSeries`.
pub trait Indicator: Send + Sync {
    /// Index of the first bar that can produce an output point.
    fn lookback(&self) -> usize;

    /// Fold bar `index` of `bars` into the rolling state and return the
    /// output for that bar, if any.
    fn step(&mut self, bars: &BarSeries, index: usize, is_new_bar: bool) -> Option<IndicatorValue>;

    /// Drop all rolling state.
    fn reset(&mut self);
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLCV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000,
/// vwap = typical price. Bars are one minute apart from the session open.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> BarSeries {
    use crate::domain::Instrument;
    use crate::series::BarUpdate;
    use chrono::TimeZone;

    let base = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
    let mut series = BarSeries::new(Instrument::us_equity("TEST"), 60);
    for (i, &close) in closes.iter().enumerate() {
        let open = if i == 0 { close } else { closes[i - 1] };
        let high = open.max(close) + 1.0;
        let low = open.min(close) - 1.0;
        series.ingest(
            &BarUpdate {
                time: base + chrono::Duration::minutes(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000,
                vwap: (high + low + close) / 3.0,
                trade_count: 1,
            },
            1,
        );
    }
    series
}

/// Run an indicator over every bar of `bars` as new bars.
#[cfg(test)]
pub fn run_all(indicator: &mut dyn Indicator, bars: &BarSeries) -> Vec<Option<IndicatorValue>> {
    (0..bars.len()).map(|i| indicator.step(bars, i, true)).collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
