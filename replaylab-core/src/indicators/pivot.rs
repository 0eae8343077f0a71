//! Pivot detector over bar VWAP.
//!
//! Looks at an odd window of W VWAP values and tests the centre bar. A pivot
//! high needs a strictly rising run into the centre and a non-rising run out
//! of it (lows mirror this), so on equal values the earlier bar is the pivot.
//! With `fit_curve` the run test is done on a least-squares quadratic fitted
//! to the window instead of the raw values. The raw excursion between the
//! centre and the opposite window extreme must exceed the minimum range,
//! which defaults to the instrument tier's. A new pivot cannot be confirmed
//! within W bars of the previous one.
//!
//! Points are emitted on the confirming bar (the newest bar of the window);
//! the value carries the index of the pivot bar itself.
//! Lookback: W - 1.

use serde::{Deserialize, Serialize};

use super::config::PivotBias;
use super::{Indicator, IndicatorValue};
use crate::series::{BarSeries, RollingWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotSide {
    High,
    Low,
}

#[derive(Debug, Clone)]
pub struct Pivot {
    window: usize,
    fit_curve: bool,
    bias: PivotBias,
    min_range: Option<f64>,
    vwaps: RollingWindow,
    /// Centre index of the last pivot confirmed before the newest bar.
    committed_last: Option<usize>,
    last: Option<usize>,
}

impl Pivot {
    pub fn new(window: usize, fit_curve: bool, bias: PivotBias, min_range: Option<f64>) -> Self {
        Self {
            window,
            fit_curve,
            bias,
            min_range,
            vwaps: RollingWindow::new(window),
            committed_last: None,
            last: None,
        }
    }

    fn sides(&self) -> &'static [PivotSide] {
        match self.bias {
            PivotBias::Highs => &[PivotSide::High],
            PivotBias::Lows => &[PivotSide::Low],
            PivotBias::Both => &[PivotSide::High, PivotSide::Low],
        }
    }
}

/// Least-squares quadratic through the window, evaluated at each sample.
///
/// x runs over -h..=h, so Σx and Σx³ vanish and the normal equations split
/// into the slope and a 2×2 system for the intercept and curvature.
fn quadratic_fit(values: &[f64]) -> Vec<f64> {
    let half = (values.len() / 2) as f64;
    let xs: Vec<f64> = (0..values.len()).map(|i| i as f64 - half).collect();
    let s0 = values.len() as f64;
    let s2: f64 = xs.iter().map(|x| x * x).sum();
    let s4: f64 = xs.iter().map(|x| x.powi(4)).sum();
    let sy: f64 = values.iter().sum();
    let sxy: f64 = xs.iter().zip(values).map(|(x, y)| x * y).sum();
    let sx2y: f64 = xs.iter().zip(values).map(|(x, y)| x * x * y).sum();

    let det = s0 * s4 - s2 * s2;
    if s2 == 0.0 || det == 0.0 {
        return values.to_vec();
    }
    let b = sxy / s2;
    let a = (s4 * sy - s2 * sx2y) / det;
    let c = (s0 * sx2y - s2 * sy) / det;
    xs.iter().map(|x| a + b * x + c * x * x).collect()
}

fn has_shape(values: &[f64], side: PivotSide) -> bool {
    let half = values.len() / 2;
    let (left, right) = (&values[..=half], &values[half..]);
    match side {
        PivotSide::High => {
            left.windows(2).all(|w| w[0] < w[1]) && right.windows(2).all(|w| w[0] >= w[1])
        }
        PivotSide::Low => {
            left.windows(2).all(|w| w[0] > w[1]) && right.windows(2).all(|w| w[0] <= w[1])
        }
    }
}

fn excursion(raw: &[f64], side: PivotSide) -> f64 {
    let centre = raw[raw.len() / 2];
    match side {
        PivotSide::High => centre - raw.iter().copied().fold(f64::INFINITY, f64::min),
        PivotSide::Low => raw.iter().copied().fold(f64::NEG_INFINITY, f64::max) - centre,
    }
}

impl Indicator for Pivot {
    fn lookback(&self) -> usize {
        self.window.saturating_sub(1)
    }

    fn step(&mut self, bars: &BarSeries, index: usize, is_new_bar: bool) -> Option<IndicatorValue> {
        let bar = bars.get(index)?;
        if is_new_bar {
            self.committed_last = self.last;
        }
        self.last = self.committed_last;
        self.vwaps.update(bar.vwap, is_new_bar);
        if !self.vwaps.is_full() {
            return None;
        }

        let half = self.window / 2;
        let centre_index = index.checked_sub(half)?;
        if let Some(prev) = self.committed_last {
            if centre_index < prev + self.window {
                return None;
            }
        }

        let raw: Vec<f64> = self.vwaps.iter().collect();
        let shaped = if self.fit_curve {
            quadratic_fit(&raw)
        } else {
            raw.clone()
        };
        let min_range = self
            .min_range
            .unwrap_or_else(|| bars.instrument().tier.min_pivot_range());

        for &side in self.sides() {
            if has_shape(&shaped, side) && excursion(&raw, side) > min_range {
                self.last = Some(centre_index);
                return Some(IndicatorValue::Pivot {
                    side,
                    pivot_index: centre_index,
                    price: raw[half],
                });
            }
        }
        None
    }

    fn reset(&mut self) {
        self.vwaps.clear();
        self.committed_last = None;
        self.last = None;
    }
}
