//! Heikin-Ashi synthetic candles.
//!
//! close = (O + H + L + C) / 4 of the real bar
//! open  = (prev HA open + prev HA close) / 2, first bar (O + C) / 2
//! high/low = extremes of the real high/low, the synthetic open/close and
//! the previous synthetic open/close.
//! Lookback: 0.

use super::{Indicator, IndicatorValue};
use crate::series::BarSeries;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Candle {
    open: f64,
    close: f64,
}

#[derive(Debug, Clone, Default)]
pub struct HeikinAshi {
    /// Synthetic candle of the bar before the newest one.
    prev: Option<Candle>,
    current: Option<Candle>,
}

impl HeikinAshi {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indicator for HeikinAshi {
    fn lookback(&self) -> usize {
        0
    }

    fn step(&mut self, bars: &BarSeries, index: usize, is_new_bar: bool) -> Option<IndicatorValue> {
        let bar = bars.get(index)?;
        if is_new_bar {
            self.prev = self.current;
        }
        let close = (bar.open + bar.high + bar.low + bar.close) / 4.0;
        let open = match self.prev {
            Some(p) => (p.open + p.close) / 2.0,
            None => (bar.open + bar.close) / 2.0,
        };
        let mut high = bar.high.max(open).max(close);
        let mut low = bar.low.min(open).min(close);
        if let Some(p) = self.prev {
            high = high.max(p.open).max(p.close);
            low = low.min(p.open).min(p.close);
        }
        self.current = Some(Candle { open, close });
        Some(IndicatorValue::Candle {
            open,
            high,
            low,
            close,
        })
    }

    fn reset(&mut self) {
        self.prev = None;
        self.current = None;
    }
}
