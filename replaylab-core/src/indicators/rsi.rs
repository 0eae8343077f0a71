//! Relative Strength Index (RSI).
//!
//! Uses Wilder smoothing of average gains and average losses.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period (the first bar has no change).
//! Edge cases: avg_loss == 0 → RSI = 100; both averages 0 → RSI = 50.

use super::smoothing::RecursiveAverage;
use super::{Indicator, IndicatorValue};
use crate::series::BarSeries;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    gains: RecursiveAverage,
    losses: RecursiveAverage,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            gains: RecursiveAverage::wilder(period),
            losses: RecursiveAverage::wilder(period),
        }
    }
}

pub(crate) fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

impl Indicator for Rsi {
    fn lookback(&self) -> usize {
        self.period
    }

    fn step(&mut self, bars: &BarSeries, index: usize, is_new_bar: bool) -> Option<IndicatorValue> {
        if index == 0 {
            return None;
        }
        let change = bars.get(index)?.close - bars.get(index - 1)?.close;
        let gain = self.gains.update(change.max(0.0), is_new_bar);
        let loss = self.losses.update((-change).max(0.0), is_new_bar);
        match (gain, loss) {
            (Some(g), Some(l)) => Some(IndicatorValue::Single(rsi_from_averages(g, l))),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.gains.reset();
        self.losses.reset();
    }
}
