//! Percentage price oscillator over two simple averages of the close.
//!
//! PPO = 100 × (SMA(fast) - SMA(slow)) / SMA(slow), 0 when SMA(slow) is 0.
//! Lookback: slow - 1.

use super::{Indicator, IndicatorValue};
use crate::series::{BarSeries, RollingWindow};

#[derive(Debug, Clone)]
pub struct Oscillator {
    slow_length: usize,
    fast: RollingWindow,
    slow: RollingWindow,
}

impl Oscillator {
    pub fn new(fast: usize, slow: usize) -> Self {
        Self {
            slow_length: slow,
            fast: RollingWindow::new(fast),
            slow: RollingWindow::new(slow),
        }
    }
}

impl Indicator for Oscillator {
    fn lookback(&self) -> usize {
        self.slow_length.saturating_sub(1)
    }

    fn step(&mut self, bars: &BarSeries, index: usize, is_new_bar: bool) -> Option<IndicatorValue> {
        let close = bars.get(index)?.close;
        self.fast.update(close, is_new_bar);
        self.slow.update(close, is_new_bar);
        if !self.slow.is_full() {
            return None;
        }
        let slow = self.slow.mean();
        let ppo = if slow == 0.0 {
            0.0
        } else {
            100.0 * (self.fast.mean() - slow) / slow
        };
        Some(IndicatorValue::Single(ppo))
    }

    fn reset(&mut self) {
        self.fast.clear();
        self.slow.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, run_all};

    #[test]
    fn ppo_known_value() {
        let bars = make_bars(&[10.0, 10.0, 10.0, 14.0]);
        let mut osc = Oscillator::new(2, 4);
        let out = run_all(&mut osc, &bars);
        assert!(out[2].is_none());
        // fast mean 12, slow mean 11
        assert_approx(out[3].unwrap().primary(), 100.0 / 11.0, 1e-9);
    }

    #[test]
    fn zero_slow_mean_is_zero() {
        let bars = make_bars(&[0.0, 0.0, 0.0]);
        let mut osc = Oscillator::new(1, 3);
        let out = run_all(&mut osc, &bars);
        assert_eq!(out[2].unwrap().primary(), 0.0);
    }
}
