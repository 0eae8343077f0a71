//! Bollinger Bands.
//!
//! Middle = SMA(close, period)
//! Upper  = middle + multiplier × sample std-dev (N-1 divisor)
//! Lower  = middle - multiplier × sample std-dev
//! Lookback: period - 1.

use super::{Indicator, IndicatorValue};
use crate::series::{BarSeries, RollingWindow};

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    closes: RollingWindow,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64) -> Self {
        Self {
            period,
            multiplier,
            closes: RollingWindow::new(period),
        }
    }
}

impl Indicator for Bollinger {
    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn step(&mut self, bars: &BarSeries, index: usize, is_new_bar: bool) -> Option<IndicatorValue> {
        self.closes.update(bars.get(index)?.close, is_new_bar);
        if !self.closes.is_full() {
            return None;
        }
        let middle = self.closes.mean();
        let width = self.multiplier * self.closes.sample_variance().sqrt();
        Some(IndicatorValue::Bands {
            upper: middle + width,
            middle,
            lower: middle - width,
        })
    }

    fn reset(&mut self) {
        self.closes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, run_all};

    #[test]
    fn bollinger_known_values() {
        // closes 2,4,4,5: mean 3.75, sample var 4.75/3
        let bars = make_bars(&[2.0, 4.0, 4.0, 5.0]);
        let mut bb = Bollinger::new(4, 2.0);
        let out = run_all(&mut bb, &bars);
        assert!(out[2].is_none());
        let sd = (4.75f64 / 3.0).sqrt();
        match out[3].unwrap() {
            IndicatorValue::Bands { upper, middle, lower } => {
                assert_approx(middle, 3.75, 1e-12);
                assert_approx(upper, 3.75 + 2.0 * sd, 1e-9);
                assert_approx(lower, 3.75 - 2.0 * sd, 1e-9);
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn flat_prices_collapse_bands() {
        let bars = make_bars(&[7.0; 5]);
        let mut bb = Bollinger::new(3, 2.0);
        let out = run_all(&mut bb, &bars);
        match out[4].unwrap() {
            IndicatorValue::Bands { upper, lower, .. } => {
                assert_approx(upper, 7.0, 1e-9);
                assert_approx(lower, 7.0, 1e-9);
            }
            other => panic!("unexpected value {other:?}"),
        }
    }
}
