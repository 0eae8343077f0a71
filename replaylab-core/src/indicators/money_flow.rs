//! Money Flow Index.
//!
//! Raw flow = typical price × volume, counted as positive when the typical
//! price rose from the prior bar and negative when it fell (unchanged counts
//! as neither). MFI = 100 - 100 / (1 + Σpos / max(Σneg, 1)) over N flows.
//! Lookback: N.

use super::{Indicator, IndicatorValue};
use crate::series::{BarSeries, RollingWindow};

#[derive(Debug, Clone)]
pub struct MoneyFlow {
    period: usize,
    positive: RollingWindow,
    negative: RollingWindow,
}

impl MoneyFlow {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            positive: RollingWindow::new(period),
            negative: RollingWindow::new(period),
        }
    }
}

impl Indicator for MoneyFlow {
    fn lookback(&self) -> usize {
        self.period
    }

    fn step(&mut self, bars: &BarSeries, index: usize, is_new_bar: bool) -> Option<IndicatorValue> {
        if index == 0 {
            return None;
        }
        let bar = bars.get(index)?;
        let tp = bar.typical_price();
        let prev_tp = bars.get(index - 1)?.typical_price();
        let flow = tp * bar.volume as f64;
        let (pos, neg) = if tp > prev_tp {
            (flow, 0.0)
        } else if tp < prev_tp {
            (0.0, flow)
        } else {
            (0.0, 0.0)
        };
        self.positive.update(pos, is_new_bar);
        self.negative.update(neg, is_new_bar);
        if !self.positive.is_full() {
            return None;
        }
        let ratio = self.positive.sum() / self.negative.sum().max(1.0);
        Some(IndicatorValue::Single(100.0 - 100.0 / (1.0 + ratio)))
    }

    fn reset(&mut self) {
        self.positive.clear();
        self.negative.clear();
    }
}
