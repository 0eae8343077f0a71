//! CSV-backed store.
//!
//! Layout under the root directory:
//! - `{instrument}_{bar_size}s.csv`: bars (`time,open,high,low,close,volume,vwap,trade_count`)
//! - `{instrument}_{series}.series.csv`: indicator points, rewritten on every save
//! - `fills.csv`, `orders.csv`: append-only logs
//!
//! Times are RFC 3339.

use std::fs::{self, OpenOptions};
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{BarStore, OrderStatusRecord, StoreError};
use crate::domain::{Bar, Fill, Instrument, InstrumentId, OrderSide};
use crate::indicators::IndicatorPoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BarRecord {
    time: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
    vwap: f64,
    trade_count: u64,
}

impl BarRecord {
    fn into_bar(self, bar_size_secs: i64) -> Bar {
        let mut bar = Bar::new(
            self.time,
            bar_size_secs,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
            self.vwap,
        );
        bar.trade_count = self.trade_count;
        bar
    }
}

impl From<&Bar> for BarRecord {
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

#[derive(Debug, Serialize)]
struct PointRecord {
    bar_index: usize,
    time: DateTime<Utc>,
    /// JSON-encoded `IndicatorValue`.
    value: String,
}

#[derive(Debug, Serialize)]
struct FillRecord<'a> {
    fill_id: u64,
    order_id: u64,
    instrument: &'a str,
    bar_time: DateTime<Utc>,
    side: &'static str,
    price: f64,
    quantity: f64,
    commission: f64,
    is_opening: bool,
}

#[derive(Debug, Serialize)]
struct StatusRecord {
    order_id: u64,
    status: String,
    time: DateTime<Utc>,
}

#[derive(Debug)]
pub struct CsvBarStore {
    root: PathBuf,
    /// Serializes appends to the shared log files.
    write_lock: Mutex<()>,
}

impl CsvBarStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bars_path(&self, instrument: &InstrumentId, bar_size_secs: i64) -> PathBuf {
        self.root.join(format!("{instrument}_{bar_size_secs}s.csv"))
    }

    pub fn series_path(&self, instrument: &InstrumentId, series: &str) -> PathBuf {
        self.root.join(format!("{instrument}_{series}.series.csv"))
    }

    /// Overwrite the bar file of `instrument` at `bar_size_secs`.
    pub fn write_bars(&self, instrument: &InstrumentId, bar_size_secs: i64, bars: &[Bar]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let mut wtr = csv::Writer::from_path(self.bars_path(instrument, bar_size_secs))?;
        for bar in bars {
            wtr.serialize(BarRecord::from(bar))?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn append<T: Serialize>(&self, file: &str, record: &T) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let path = self.root.join(file);
        let fresh = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        let handle = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut wtr = csv::WriterBuilder::new().has_headers(fresh).from_writer(handle);
        wtr.serialize(record)?;
        wtr.flush()?;
        Ok(())
    }
}

/// Read every bar row from a CSV file.
pub fn read_bars_csv(path: &Path, bar_size_secs: i64) -> Result<Vec<Bar>, StoreError> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut bars = Vec::new();
    for (row, record) in rdr.deserialize::<BarRecord>().enumerate() {
        let record = record.map_err(|e| StoreError::InvalidRow {
            path: path.display().to_string(),
            row: row + 1,
            reason: e.to_string(),
        })?;
        let bar = record.into_bar(bar_size_secs);
        if !bar.is_sane() {
            warn!(path = %path.display(), row = row + 1, "insane bar skipped");
            continue;
        }
        bars.push(bar);
    }
    bars.sort_by_key(|b| b.start);
    debug!(path = %path.display(), bars = bars.len(), "bars loaded");
    Ok(bars)
}

impl BarStore for CsvBarStore {
    fn load_bars(
        &self,
        instrument: &Instrument,
        range: Range<DateTime<Utc>>,
        bar_size_secs: i64,
    ) -> Result<Vec<Bar>, StoreError> {
        let path = self.bars_path(&instrument.id, bar_size_secs);
        if !path.exists() {
            return Err(StoreError::NoBars {
                instrument: instrument.id.clone(),
                bar_size_secs,
            });
        }
        let bars = read_bars_csv(&path, bar_size_secs)?;
        Ok(bars.into_iter().filter(|b| range.contains(&b.start)).collect())
    }

    fn save_series(
        &self,
        instrument: &InstrumentId,
        series: &str,
        points: &[IndicatorPoint],
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let mut wtr = csv::Writer::from_path(self.series_path(instrument, series))?;
        for point in points {
            let value = serde_json::to_string(&point.value).map_err(io::Error::other)?;
            wtr.serialize(PointRecord {
                bar_index: point.bar_index,
                time: point.time,
                value,
            })?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn save_fill(&self, fill: &Fill) -> Result<(), StoreError> {
        let side = match fill.side {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        };
        self.append(
            "fills.csv",
            &FillRecord {
                fill_id: fill.id.0,
                order_id: fill.order_id.0,
                instrument: fill.instrument.as_str(),
                bar_time: fill.bar_time,
                side,
                price: fill.price,
                quantity: fill.quantity,
                commission: fill.commission,
                is_opening: fill.is_opening,
            },
        )
    }

    fn save_order_status(&self, record: &OrderStatusRecord) -> Result<(), StoreError> {
        self.append(
            "orders.csv",
            &StatusRecord {
                order_id: record.order_id.0,
                status: record.status.to_string(),
                time: record.time,
            },
        )
    }
}
