//! Commodity Channel Index.
//!
//! CCI = (tp - SMA(tp, N)) / (0.015 × mean absolute deviation of tp)
//! with tp the typical price (H+L+C)/3. Zero mean deviation gives 0.
//! Lookback: N - 1.

use super::{Indicator, IndicatorValue};
use crate::series::{BarSeries, RollingWindow};

const LAMBERT: f64 = 0.015;

#[derive(Debug, Clone)]
pub struct Cci {
    period: usize,
    typical: RollingWindow,
}

impl Cci {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            typical: RollingWindow::new(period),
        }
    }
}

impl Indicator for Cci {
    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn step(&mut self, bars: &BarSeries, index: usize, is_new_bar: bool) -> Option<IndicatorValue> {
        let tp = bars.get(index)?.typical_price();
        self.typical.update(tp, is_new_bar);
        if !self.typical.is_full() {
            return None;
        }
        let mean = self.typical.mean();
        let mean_dev =
            self.typical.iter().map(|v| (v - mean).abs()).sum::<f64>() / self.typical.len() as f64;
        let cci = if mean_dev == 0.0 {
            0.0
        } else {
            (tp - mean) / (LAMBERT * mean_dev)
        };
        Some(IndicatorValue::Single(cci))
    }

    fn reset(&mut self) {
        self.typical.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, run_all};

    #[test]
    fn flat_typical_price_is_zero() {
        let bars = make_bars(&[20.0; 5]);
        let mut cci = Cci::new(3);
        let out = run_all(&mut cci, &bars);
        assert_eq!(out[4].unwrap().primary(), 0.0);
    }

    #[test]
    fn cci_known_value() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let tps: Vec<f64> = bars.bars().iter().map(|b| b.typical_price()).collect();
        let mean = tps.iter().sum::<f64>() / 3.0;
        let md = tps.iter().map(|t| (t - mean).abs()).sum::<f64>() / 3.0;
        let mut cci = Cci::new(3);
        let out = run_all(&mut cci, &bars);
        assert_approx(out[2].unwrap().primary(), (tps[2] - mean) / (0.015 * md), 1e-9);
    }
}
