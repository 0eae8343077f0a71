//! Average True Range (ATR).
//!
//! True Range = max(high - low, |high - prev_close|, |low - prev_close|),
//! taken from the second bar onwards. Wilder smoothing over `period` values.
//! Lookback: period.

use super::smoothing::RecursiveAverage;
use super::{Indicator, IndicatorValue};
use crate::domain::Bar;
use crate::series::BarSeries;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    average: RecursiveAverage,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            average: RecursiveAverage::wilder(period),
        }
    }
}

pub(crate) fn true_range(bar: &Bar, prev_close: f64) -> f64 {
    (bar.high - bar.low)
        .max((bar.high - prev_close).abs())
        .max((bar.low - prev_close).abs())
}

impl Indicator for Atr {
    fn lookback(&self) -> usize {
        self.period
    }

    fn step(&mut self, bars: &BarSeries, index: usize, is_new_bar: bool) -> Option<IndicatorValue> {
        if index == 0 {
            return None;
        }
        let tr = true_range(bars.get(index)?, bars.get(index - 1)?.close);
        self.average.update(tr, is_new_bar).map(IndicatorValue::Single)
    }

    fn reset(&mut self) {
        self.average.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, run_all};

    #[test]
    fn true_range_uses_gap_from_prev_close() {
        let bars = make_bars(&[10.0, 10.0]);
        let mut bar = bars.get(1).unwrap().clone();
        bar.high = 15.0;
        bar.low = 14.0;
        assert_approx(true_range(&bar, 10.0), 5.0, 1e-12);
        bar.high = 7.0;
        bar.low = 6.0;
        assert_approx(true_range(&bar, 10.0), 4.0, 1e-12);
    }

    #[test]
    fn atr_14_wilder_fixture() {
        let closes = [
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ];
        let bars = make_bars(&closes);
        let mut atr = Atr::new(14);
        let out = run_all(&mut atr, &bars);
        assert!(out[..14].iter().all(|v| v.is_none()));
        let expected = [
            2.338571428571428,
            2.3343877551020404,
            2.312645772594752,
            2.317456788837984,
            2.308352732492413,
            2.3277561087429555,
        ];
        for (k, exp) in expected.iter().enumerate() {
            assert_approx(out[14 + k].unwrap().primary(), *exp, 1e-9);
        }
    }

    #[test]
    fn atr_constant_range() {
        // make_bars: TR = |close - prev_close| + 2; flat closes give TR = 2.
        let bars = make_bars(&[10.0; 6]);
        let mut atr = Atr::new(3);
        let out = run_all(&mut atr, &bars);
        assert_approx(out[3].unwrap().primary(), 2.0, 1e-12);
        assert_approx(out[5].unwrap().primary(), 2.0, 1e-12);
    }

    #[test]
    fn atr_lookback() {
        assert_eq!(Atr::new(14).lookback(), 14);
    }
}
