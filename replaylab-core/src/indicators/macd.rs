//! Moving Average Convergence/Divergence.
//!
//! MACD = EMA(fast) - EMA(slow); signal = simple or exponential average of the
//! MACD line; histogram = MACD - signal. A point is emitted once the signal
//! line exists.
//! Lookback: (slow - 1) + (signal - 1).

use super::config::Smoothing;
use super::smoothing::{RecursiveAverage, Smoother};
use super::{Indicator, IndicatorValue};
use crate::series::BarSeries;

#[derive(Debug, Clone)]
pub struct Macd {
    slow_length: usize,
    signal_length: usize,
    fast: RecursiveAverage,
    slow: RecursiveAverage,
    signal: Smoother,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize, smoothing: Smoothing) -> Self {
        Self {
            slow_length: slow,
            signal_length: signal,
            fast: RecursiveAverage::exponential(fast),
            slow: RecursiveAverage::exponential(slow),
            signal: Smoother::new(smoothing, signal),
        }
    }
}

impl Indicator for Macd {
    fn lookback(&self) -> usize {
        self.slow_length.saturating_sub(1) + self.signal_length.saturating_sub(1)
    }

    fn step(&mut self, bars: &BarSeries, index: usize, is_new_bar: bool) -> Option<IndicatorValue> {
        let close = bars.get(index)?.close;
        let fast = self.fast.update(close, is_new_bar);
        let slow = self.slow.update(close, is_new_bar);
        let macd = fast? - slow?;
        let signal = self.signal.update(macd, is_new_bar)?;
        Some(IndicatorValue::Macd {
            macd,
            signal,
            histogram: macd - signal,
        })
    }

    fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
        self.signal.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, run_all};

    #[test]
    fn first_point_at_lookback() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let bars = make_bars(&closes);
        let mut macd = Macd::new(12, 26, 9, Smoothing::Exponential);
        let out = run_all(&mut macd, &bars);
        assert_eq!(macd.lookback(), 33);
        assert!(out[..33].iter().all(|v| v.is_none()));
        assert!(out[33].is_some());
    }

    #[test]
    fn linear_trend_has_constant_macd() {
        // For a linear ramp both EMAs lag by a constant, so MACD settles and
        // the histogram goes to zero.
        let closes: Vec<f64> = (0..200).map(|i| 10.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let mut macd = Macd::new(3, 6, 3, Smoothing::Simple);
        let out = run_all(&mut macd, &bars);
        match out[199].unwrap() {
            IndicatorValue::Macd { macd, histogram, .. } => {
                // lag of EMA(n) on a unit ramp is (n-1)/2
                assert_approx(macd, 2.5 - 1.0, 1e-6);
                assert_approx(histogram, 0.0, 1e-6);
            }
            other => panic!("unexpected value {other:?}"),
        }
    }
}
