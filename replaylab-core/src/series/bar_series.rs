//! Bar Series: time-ordered bars for one instrument and bar size.
//!
//! Owns the incremental aggregation of sub-bar updates into bars and the
//! rolling VWAP window. Only the newest bar is ever revised; once a later
//! bucket is touched the previous bar is frozen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bucket::bucket_start;
use super::vwap::VwapWindow;
use crate::domain::{Bar, Instrument};

/// One incoming (sub-)bar observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarUpdate {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// Zero means "not reported"; close is used instead.
    pub vwap: f64,
    pub trade_count: u64,
}

impl From<&Bar> for BarUpdate {
    fn from(bar: &Bar) -> Self {
        Self {
            time: bar.start,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            vwap: bar.vwap,
            trade_count: bar.trade_count,
        }
    }
}

/// What an `ingest` call did to the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new bucket was appended at this index.
    NewBar(usize),
    /// The last bucket (at this index) was revised.
    Updated(usize),
    /// The update belongs to a bucket older than the last one and was dropped.
    Stale,
}

impl IngestOutcome {
    pub fn index(self) -> Option<usize> {
        match self {
            IngestOutcome::NewBar(i) | IngestOutcome::Updated(i) => Some(i),
            IngestOutcome::Stale => None,
        }
    }

    pub fn is_new_bar(self) -> bool {
        matches!(self, IngestOutcome::NewBar(_))
    }
}

#[derive(Debug, Clone)]
pub struct BarSeries {
    instrument: Instrument,
    bar_size_secs: i64,
    bars: Vec<Bar>,
    vwap: VwapWindow,
}

impl BarSeries {
    pub fn new(instrument: Instrument, bar_size_secs: i64) -> Self {
        Self {
            instrument,
            bar_size_secs: bar_size_secs.max(1),
            bars: Vec::new(),
            vwap: VwapWindow::new(1),
        }
    }

    /// Series pre-filled with already-closed bars (ratio 1).
    pub fn from_bars(instrument: Instrument, bar_size_secs: i64, bars: &[Bar]) -> Self {
        let mut series = Self::new(instrument, bar_size_secs);
        for bar in bars {
            series.ingest(&BarUpdate::from(bar), 1);
        }
        series
    }

    /// Fold one update into the series.
    pub fn ingest(&mut self, update: &BarUpdate, rollup_ratio: u32) -> IngestOutcome {
        let start = bucket_start(update.time, self.bar_size_secs, self.instrument.session_open);

        if let Some(last) = self.bars.last() {
            if start < last.start {
                debug!(
                    instrument = %self.instrument.id,
                    update_time = %update.time,
                    last_bucket = %last.start,
                    "dropping update for a closed bucket"
                );
                return IngestOutcome::Stale;
            }
        }

        let ratio = rollup_ratio.max(1);
        let price = if update.vwap == 0.0 { update.close } else { update.vwap };
        self.vwap.observe(update.volume, price, ratio);
        let session_vwap = self.vwap.vwap();
        let bar_vwap = if session_vwap == 0.0 { update.close } else { session_vwap };

        match self.bars.last_mut() {
            Some(last) if last.start == start => {
                last.high = last.high.max(update.high);
                last.low = last.low.min(update.low);
                last.close = update.close;
                if ratio > 1 {
                    last.volume = last.volume.saturating_add(update.volume);
                    last.trade_count = last.trade_count.saturating_add(update.trade_count);
                } else {
                    last.volume = update.volume;
                    last.trade_count = update.trade_count;
                }
                last.vwap = bar_vwap;
                IngestOutcome::Updated(self.bars.len() - 1)
            }
            _ => {
                let mut bar = Bar::new(
                    start,
                    self.bar_size_secs,
                    update.open,
                    update.high,
                    update.low,
                    update.close,
                    update.volume,
                    bar_vwap,
                );
                bar.trade_count = update.trade_count;
                self.bars.push(bar);
                IngestOutcome::NewBar(self.bars.len() - 1)
            }
        }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn bar_size_secs(&self) -> i64 {
        self.bar_size_secs
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Current rolling VWAP (0 before any volume).
    pub fn current_vwap(&self) -> f64 {
        self.vwap.vwap()
    }

    /// Rollup ratio the VWAP window is currently sized for.
    pub fn rollup_ratio(&self) -> u32 {
        self.vwap.ratio()
    }

    /// Drop every bar and the rolling VWAP state.
    pub fn clear(&mut self) {
        self.bars.clear();
        self.vwap.reset(1);
    }
}
