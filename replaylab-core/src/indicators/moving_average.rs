//! Moving averages of the close: simple, exponential, weighted, volume-weighted.
//!
//! Simple: mean of the last N closes.
//! Exponential: prev + (close - prev) * 2/(N+1), seeded with the simple mean.
//! Weighted: triangular weights 1..N, newest heaviest, kept in O(1) per update.
//! Volume-weighted: Σ(close × volume) / Σvolume, simple mean when Σvolume = 0.
//! Lookback: N - 1 for every kind.

use super::config::MovingAverageKind;
use super::smoothing::RecursiveAverage;
use super::{Indicator, IndicatorValue};
use crate::series::{BarSeries, RollingWindow};

#[derive(Debug, Clone)]
pub struct MovingAverage {
    kind: MovingAverageKind,
    length: usize,
    closes: RollingWindow,
    /// close × volume, only used by the volume-weighted kind.
    flows: RollingWindow,
    volumes: RollingWindow,
    ema: RecursiveAverage,
    /// Σ weight_j × close_j over the current window, oldest weight 1.
    weighted_sum: f64,
}

impl MovingAverage {
    pub fn new(kind: MovingAverageKind, length: usize) -> Self {
        Self {
            kind,
            length,
            closes: RollingWindow::new(length),
            flows: RollingWindow::new(length),
            volumes: RollingWindow::new(length),
            ema: RecursiveAverage::exponential(length),
            weighted_sum: 0.0,
        }
    }

    pub fn kind(&self) -> MovingAverageKind {
        self.kind
    }

    fn update_weighted(&mut self, close: f64, is_new_bar: bool) {
        if is_new_bar {
            let window_sum = self.closes.sum();
            match self.closes.push(close) {
                // Every surviving value drops one weight step, the new one enters at N.
                Some(_) => self.weighted_sum += self.length as f64 * close - window_sum,
                None => self.weighted_sum += self.closes.len() as f64 * close,
            }
        } else {
            let len = self.closes.len().max(1) as f64;
            if let Some(old) = self.closes.replace_newest(close) {
                self.weighted_sum += len * (close - old);
            } else {
                self.weighted_sum = close;
            }
        }
    }
}

impl Indicator for MovingAverage {
    fn lookback(&self) -> usize {
        self.length.saturating_sub(1)
    }

    fn step(&mut self, bars: &BarSeries, index: usize, is_new_bar: bool) -> Option<IndicatorValue> {
        let bar = bars.get(index)?;
        let value = match self.kind {
            MovingAverageKind::Simple => {
                self.closes.update(bar.close, is_new_bar);
                self.closes.is_full().then(|| self.closes.mean())
            }
            MovingAverageKind::Exponential => self.ema.update(bar.close, is_new_bar),
            MovingAverageKind::Weighted => {
                self.update_weighted(bar.close, is_new_bar);
                let n = self.length as f64;
                self.closes
                    .is_full()
                    .then(|| self.weighted_sum / (n * (n + 1.0) / 2.0))
            }
            MovingAverageKind::VolumeWeighted => {
                let volume = bar.volume as f64;
                self.closes.update(bar.close, is_new_bar);
                self.volumes.update(volume, is_new_bar);
                self.flows.update(bar.close * volume, is_new_bar);
                if !self.closes.is_full() {
                    None
                } else if self.volumes.sum() > 0.0 {
                    Some(self.flows.sum() / self.volumes.sum())
                } else {
                    Some(self.closes.mean())
                }
            }
        };
        value.map(IndicatorValue::Single)
    }

    fn reset(&mut self) {
        self.closes.clear();
        self.flows.clear();
        self.volumes.clear();
        self.ema.reset();
        self.weighted_sum = 0.0;
    }
}
