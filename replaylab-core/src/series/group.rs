//! Series Group: one Bar Series plus the indicator series fed from it.
//!
//! Indicator series live in an arena owned by the group and are addressed by
//! `SeriesHandle`. A consumer that wants an indicator another consumer has
//! already attached chooses explicitly: `share` hands back the same handle
//! (one series, updated once per bar), `copy` clones it into a new slot that
//! is updated independently from then on.
//!
//! `ingest` cascades in a fixed order: base series first, then every
//! indicator in registration order. Listeners are notified after the
//! cascade has settled.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;

use super::bar_series::{BarSeries, BarUpdate, IngestOutcome};
use crate::indicators::{IndicatorConfig, IndicatorError, IndicatorSeries};

/// Index of an indicator series inside its group's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesHandle(pub usize);

impl fmt::Display for SeriesHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "series-{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SeriesError {
    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error("unknown series handle {0}")]
    UnknownHandle(SeriesHandle),
}

/// Indicator series of one kind, in attachment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorDataset {
    pub kind: &'static str,
    pub handles: Vec<SeriesHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesChange {
    BarAdded,
    BarUpdated,
}

/// Fired once per applied update, after base and indicators are current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesEvent {
    pub group: String,
    pub bar_index: usize,
    pub change: SeriesChange,
}

/// Receiver of series change notifications.
pub trait SeriesListener: Send + Sync {
    fn on_series_changed(&self, event: &SeriesEvent);
}

impl SeriesListener for crossbeam_channel::Sender<SeriesEvent> {
    fn on_series_changed(&self, event: &SeriesEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.send(event.clone());
    }
}

pub struct SeriesGroup {
    name: String,
    bars: BarSeries,
    arena: Vec<IndicatorSeries>,
    datasets: Vec<IndicatorDataset>,
    listeners: Vec<Arc<dyn SeriesListener>>,
}

impl fmt::Debug for SeriesGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeriesGroup")
            .field("name", &self.name)
            .field("bars", &self.bars.len())
            .field("series", &self.arena.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl SeriesGroup {
    pub fn new(name: impl Into<String>, bars: BarSeries) -> Self {
        Self {
            name: name.into(),
            bars,
            arena: Vec::new(),
            datasets: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bars(&self) -> &BarSeries {
        &self.bars
    }

    pub fn series(&self, handle: SeriesHandle) -> Option<&IndicatorSeries> {
        self.arena.get(handle.0)
    }

    /// All attached series, in registration order.
    pub fn all_series(&self) -> impl Iterator<Item = (SeriesHandle, &IndicatorSeries)> {
        self.arena.iter().enumerate().map(|(i, s)| (SeriesHandle(i), s))
    }

    pub fn dataset(&self, kind: &str) -> Option<&IndicatorDataset> {
        self.datasets.iter().find(|d| d.kind == kind)
    }

    pub fn datasets(&self) -> &[IndicatorDataset] {
        &self.datasets
    }

    /// Datasets keyed by kind name.
    pub fn dataset_map(&self) -> HashMap<&'static str, Vec<SeriesHandle>> {
        self.datasets
            .iter()
            .map(|d| (d.kind, d.handles.clone()))
            .collect()
    }

    fn register(&mut self, series: IndicatorSeries) -> SeriesHandle {
        let handle = SeriesHandle(self.arena.len());
        let kind = series.kind_name();
        match self.datasets.iter_mut().find(|d| d.kind == kind) {
            Some(dataset) => dataset.handles.push(handle),
            None => self.datasets.push(IndicatorDataset {
                kind,
                handles: vec![handle],
            }),
        }
        debug!(group = %self.name, series = series.name(), %handle, "indicator attached");
        self.arena.push(series);
        handle
    }

    /// Build a new indicator series and compute it over the bars already
    /// present. Configuration errors surface here and nowhere later.
    pub fn attach(&mut self, config: IndicatorConfig) -> Result<SeriesHandle, SeriesError> {
        let mut series = IndicatorSeries::new(config)?;
        series.create_series(&self.bars);
        Ok(self.register(series))
    }

    /// Attach several series, computing their history in parallel.
    /// Nothing is attached if any configuration is invalid.
    pub fn attach_many(&mut self, configs: &[IndicatorConfig]) -> Result<Vec<SeriesHandle>, SeriesError> {
        let mut built = configs
            .iter()
            .cloned()
            .map(IndicatorSeries::new)
            .collect::<Result<Vec<_>, _>>()?;
        let bars = &self.bars;
        built.par_iter_mut().for_each(|series| series.create_series(bars));
        Ok(built.into_iter().map(|s| self.register(s)).collect())
    }

    /// Reuse an attached series as-is.
    pub fn share(&self, handle: SeriesHandle) -> Result<SeriesHandle, SeriesError> {
        if handle.0 < self.arena.len() {
            Ok(handle)
        } else {
            Err(SeriesError::UnknownHandle(handle))
        }
    }

    /// Clone an attached series into a new, independently updated slot.
    pub fn copy(&mut self, handle: SeriesHandle) -> Result<SeriesHandle, SeriesError> {
        let series = self
            .arena
            .get(handle.0)
            .cloned()
            .ok_or(SeriesError::UnknownHandle(handle))?;
        Ok(self.register(series))
    }

    pub fn subscribe(&mut self, listener: Arc<dyn SeriesListener>) {
        self.listeners.push(listener);
    }

    pub fn listeners(&self) -> Vec<Arc<dyn SeriesListener>> {
        self.listeners.clone()
    }

    /// Apply one update: base series, then each indicator in registration
    /// order. Does not notify listeners.
    pub fn ingest(&mut self, update: &BarUpdate, rollup_ratio: u32) -> IngestOutcome {
        let outcome = self.bars.ingest(update, rollup_ratio);
        if let Some(index) = outcome.index() {
            let is_new_bar = outcome.is_new_bar();
            let bars = &self.bars;
            for series in &mut self.arena {
                series.update_series(bars, index, is_new_bar);
            }
        }
        outcome
    }

    /// Event describing an ingest outcome, if it changed anything.
    pub fn change_event(&self, outcome: IngestOutcome) -> Option<SeriesEvent> {
        let change = match outcome {
            IngestOutcome::NewBar(_) => SeriesChange::BarAdded,
            IngestOutcome::Updated(_) => SeriesChange::BarUpdated,
            IngestOutcome::Stale => return None,
        };
        Some(SeriesEvent {
            group: self.name.clone(),
            bar_index: outcome.index()?,
            change,
        })
    }

    /// `ingest` followed by listener notification.
    pub fn ingest_and_notify(&mut self, update: &BarUpdate, rollup_ratio: u32) -> IngestOutcome {
        let outcome = self.ingest(update, rollup_ratio);
        if let Some(event) = self.change_event(outcome) {
            for listener in &self.listeners {
                listener.on_series_changed(&event);
            }
        }
        outcome
    }

    /// Drop every bar and all indicator state; attachments stay in place.
    pub fn clear(&mut self) {
        self.bars.clear();
        for series in &mut self.arena {
            series.clear();
        }
    }
}

/// A group shared between the feeding coordinator and reading strategies.
#[derive(Debug, Clone)]
pub struct SharedSeriesGroup(Arc<RwLock<SeriesGroup>>);

impl SharedSeriesGroup {
    pub fn new(group: SeriesGroup) -> Self {
        Self(Arc::new(RwLock::new(group)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, SeriesGroup> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, SeriesGroup> {
        self.0.write()
    }

    /// Ingest under the write lock, then notify listeners with the lock
    /// released so they may take read locks themselves.
    pub fn feed(&self, update: &BarUpdate, rollup_ratio: u32) -> IngestOutcome {
        let (outcome, event, listeners) = {
            let mut group = self.0.write();
            let outcome = group.ingest(update, rollup_ratio);
            let event = group.change_event(outcome);
            (outcome, event, group.listeners())
        };
        if let Some(event) = event {
            for listener in &listeners {
                listener.on_series_changed(&event);
            }
        }
        outcome
    }
}
