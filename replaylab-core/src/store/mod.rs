//! Persistence seam: historical bars in, indicator series, fills and order
//! statuses out.

pub mod csv_store;
pub mod memory;

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Bar, Fill, Instrument, InstrumentId, OrderId, OrderStatus};
use crate::indicators::IndicatorPoint;

pub use csv_store::CsvBarStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no bars stored for {instrument} at {bar_size_secs}s")]
    NoBars {
        instrument: InstrumentId,
        bar_size_secs: i64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid row {row} in {path}: {reason}")]
    InvalidRow {
        path: String,
        row: usize,
        reason: String,
    },
}

/// Status change of one order, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusRecord {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub time: DateTime<Utc>,
}

pub trait BarStore: Send + Sync {
    /// Bars of `instrument` at `bar_size_secs` whose start lies in `range`,
    /// in chronological order.
    fn load_bars(
        &self,
        instrument: &Instrument,
        range: Range<DateTime<Utc>>,
        bar_size_secs: i64,
    ) -> Result<Vec<Bar>, StoreError>;

    /// Replace the stored points of one indicator series.
    fn save_series(
        &self,
        instrument: &InstrumentId,
        series: &str,
        points: &[IndicatorPoint],
    ) -> Result<(), StoreError>;

    fn save_fill(&self, fill: &Fill) -> Result<(), StoreError>;

    fn save_order_status(&self, record: &OrderStatusRecord) -> Result<(), StoreError>;
}
