//! In-memory store for tests and batch runs.

use std::collections::HashMap;
use std::ops::Range;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{BarStore, OrderStatusRecord, StoreError};
use crate::domain::{Bar, Fill, Instrument, InstrumentId};
use crate::indicators::IndicatorPoint;

#[derive(Debug, Default)]
pub struct MemoryStore {
    bars: RwLock<HashMap<(InstrumentId, i64), Vec<Bar>>>,
    series: RwLock<HashMap<(InstrumentId, String), Vec<IndicatorPoint>>>,
    fills: RwLock<Vec<Fill>>,
    statuses: RwLock<Vec<OrderStatusRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert bars, keeping them sorted by start time.
    pub fn insert_bars(&self, instrument: &InstrumentId, bar_size_secs: i64, bars: impl IntoIterator<Item = Bar>) {
        let mut map = self.bars.write();
        let stored = map.entry((instrument.clone(), bar_size_secs)).or_default();
        stored.extend(bars);
        stored.sort_by_key(|b| b.start);
    }

    pub fn series(&self, instrument: &InstrumentId, series: &str) -> Option<Vec<IndicatorPoint>> {
        self.series
            .read()
            .get(&(instrument.clone(), series.to_string()))
            .cloned()
    }

    pub fn fills(&self) -> Vec<Fill> {
        self.fills.read().clone()
    }

    pub fn order_statuses(&self) -> Vec<OrderStatusRecord> {
        self.statuses.read().clone()
    }
}

impl BarStore for MemoryStore {
    fn load_bars(
        &self,
        instrument: &Instrument,
        range: Range<DateTime<Utc>>,
        bar_size_secs: i64,
    ) -> Result<Vec<Bar>, StoreError> {
        let map = self.bars.read();
        let stored = map
            .get(&(instrument.id.clone(), bar_size_secs))
            .ok_or_else(|| StoreError::NoBars {
                instrument: instrument.id.clone(),
                bar_size_secs,
            })?;
        Ok(stored
            .iter()
            .filter(|b| range.contains(&b.start))
            .cloned()
            .collect())
    }

    fn save_series(
        &self,
        instrument: &InstrumentId,
        series: &str,
        points: &[IndicatorPoint],
    ) -> Result<(), StoreError> {
        self.series
            .write()
            .insert((instrument.clone(), series.to_string()), points.to_vec());
        Ok(())
    }

    fn save_fill(&self, fill: &Fill) -> Result<(), StoreError> {
        self.fills.write().push(fill.clone());
        Ok(())
    }

    fn save_order_status(&self, record: &OrderStatusRecord) -> Result<(), StoreError> {
        self.statuses.write().push(record.clone());
        Ok(())
    }
}
