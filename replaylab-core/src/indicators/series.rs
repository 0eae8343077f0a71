//! Indicator series: one indicator's rolling state plus its output points.

use tracing::debug;

use super::config::IndicatorConfig;
use super::{
    Atr, Bollinger, Cci, HeikinAshi, Indicator, IndicatorError, IndicatorPoint, IndicatorValue,
    Macd, MoneyFlow, MovingAverage, Oscillator, Pivot, Rsi, Stochastic,
};
use crate::series::BarSeries;

/// Closed set of indicator kinds.
#[derive(Debug, Clone)]
pub enum IndicatorState {
    MovingAverage(MovingAverage),
    Macd(Macd),
    Rsi(Rsi),
    Atr(Atr),
    Bollinger(Bollinger),
    Cci(Cci),
    MoneyFlow(MoneyFlow),
    Stochastic(Stochastic),
    HeikinAshi(HeikinAshi),
    Pivot(Pivot),
    Oscillator(Oscillator),
}

impl IndicatorState {
    fn as_indicator(&self) -> &dyn Indicator {
        match self {
            IndicatorState::MovingAverage(i) => i,
            IndicatorState::Macd(i) => i,
            IndicatorState::Rsi(i) => i,
            IndicatorState::Atr(i) => i,
            IndicatorState::Bollinger(i) => i,
            IndicatorState::Cci(i) => i,
            IndicatorState::MoneyFlow(i) => i,
            IndicatorState::Stochastic(i) => i,
            IndicatorState::HeikinAshi(i) => i,
            IndicatorState::Pivot(i) => i,
            IndicatorState::Oscillator(i) => i,
        }
    }

    fn as_indicator_mut(&mut self) -> &mut dyn Indicator {
        match self {
            IndicatorState::MovingAverage(i) => i,
            IndicatorState::Macd(i) => i,
            IndicatorState::Rsi(i) => i,
            IndicatorState::Atr(i) => i,
            IndicatorState::Bollinger(i) => i,
            IndicatorState::Cci(i) => i,
            IndicatorState::MoneyFlow(i) => i,
            IndicatorState::Stochastic(i) => i,
            IndicatorState::HeikinAshi(i) => i,
            IndicatorState::Pivot(i) => i,
            IndicatorState::Oscillator(i) => i,
        }
    }
}

impl Indicator for IndicatorState {
    fn lookback(&self) -> usize {
        self.as_indicator().lookback()
    }

    fn step(&mut self, bars: &BarSeries, index: usize, is_new_bar: bool) -> Option<IndicatorValue> {
        self.as_indicator_mut().step(bars, index, is_new_bar)
    }

    fn reset(&mut self) {
        self.as_indicator_mut().reset()
    }
}

/// Computed points of one indicator, aligned with bar indices of the series
/// it is fed from.
#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    name: String,
    config: IndicatorConfig,
    state: IndicatorState,
    points: Vec<IndicatorPoint>,
    /// Last bar index folded into `state`.
    last_index: Option<usize>,
}

impl IndicatorSeries {
    /// Validate the configuration and build an empty series.
    pub fn new(config: IndicatorConfig) -> Result<Self, IndicatorError> {
        let state = config.build()?;
        Ok(Self {
            name: config.label(),
            config,
            state,
            points: Vec::new(),
            last_index: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind_name(&self) -> &'static str {
        self.config.kind_name()
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    pub fn lookback(&self) -> usize {
        self.state.lookback()
    }

    pub fn points(&self) -> &[IndicatorPoint] {
        &self.points
    }

    pub fn last(&self) -> Option<&IndicatorPoint> {
        self.points.last()
    }

    /// Point stamped with `bar_index`, if one exists.
    pub fn point_at(&self, bar_index: usize) -> Option<&IndicatorPoint> {
        self.points
            .binary_search_by_key(&bar_index, |p| p.bar_index)
            .ok()
            .map(|i| &self.points[i])
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.last_index
    }

    /// Recompute over every bar currently in `bars`.
    pub fn create_series(&mut self, bars: &BarSeries) {
        self.clear();
        for index in 0..bars.len() {
            self.update_series(bars, index, true);
        }
    }

    /// Fold in one bar. A new bar must directly follow the last folded
    /// index; a revision must target it. Anything else is ignored.
    ///
    /// Returns true when the output changed.
    pub fn update_series(&mut self, bars: &BarSeries, index: usize, is_new_bar: bool) -> bool {
        let Some(bar) = bars.get(index) else {
            debug!(series = %self.name, index, "bar index out of range");
            return false;
        };
        let in_order = if is_new_bar {
            index == self.last_index.map_or(0, |last| last + 1)
        } else {
            self.last_index == Some(index)
        };
        if !in_order {
            debug!(
                series = %self.name,
                index,
                is_new_bar,
                last_index = ?self.last_index,
                "out-of-order update ignored"
            );
            return false;
        }

        let time = bar.start;
        let value = self.state.step(bars, index, is_new_bar);
        self.last_index = Some(index);

        let newest_is_this_bar = self.points.last().is_some_and(|p| p.bar_index == index);
        match (value, newest_is_this_bar) {
            (Some(value), true) => {
                if let Some(last) = self.points.last_mut() {
                    last.value = value;
                }
                true
            }
            (Some(value), false) => {
                self.points.push(IndicatorPoint {
                    bar_index: index,
                    time,
                    value,
                });
                true
            }
            (None, true) => {
                self.points.pop();
                true
            }
            (None, false) => false,
        }
    }

    /// Drop all points and rolling state.
    pub fn clear(&mut self) {
        self.state.reset();
        self.points.clear();
        self.last_index = None;
    }
}
