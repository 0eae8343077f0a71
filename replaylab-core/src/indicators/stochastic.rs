//! Stochastic oscillator.
//!
//! %K = 100 × (close - LL) / (HH - LL) over N bars, 50 when HH == LL.
//! %D = SMA(%K, smoothing).
//! Lookback: (N - 1) + (smoothing - 1).

use super::config::Smoothing;
use super::smoothing::Smoother;
use super::{Indicator, IndicatorValue};
use crate::series::{BarSeries, RollingWindow};

#[derive(Debug, Clone)]
pub struct Stochastic {
    period: usize,
    smoothing: usize,
    highs: RollingWindow,
    lows: RollingWindow,
    d: Smoother,
}

impl Stochastic {
    pub fn new(period: usize, smoothing: usize) -> Self {
        Self {
            period,
            smoothing,
            highs: RollingWindow::new(period),
            lows: RollingWindow::new(period),
            d: Smoother::new(Smoothing::Simple, smoothing),
        }
    }
}

impl Indicator for Stochastic {
    fn lookback(&self) -> usize {
        self.period.saturating_sub(1) + self.smoothing.saturating_sub(1)
    }

    fn step(&mut self, bars: &BarSeries, index: usize, is_new_bar: bool) -> Option<IndicatorValue> {
        let bar = bars.get(index)?;
        self.highs.update(bar.high, is_new_bar);
        self.lows.update(bar.low, is_new_bar);
        if !self.highs.is_full() {
            return None;
        }
        let hh = self.highs.max()?;
        let ll = self.lows.min()?;
        let k = if hh == ll {
            50.0
        } else {
            100.0 * (bar.close - ll) / (hh - ll)
        };
        let d = self.d.update(k, is_new_bar)?;
        Some(IndicatorValue::Stochastic { k, d })
    }

    fn reset(&mut self) {
        self.highs.clear();
        self.lows.clear();
        self.d.reset();
    }
}
