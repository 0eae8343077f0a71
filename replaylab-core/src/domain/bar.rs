//! Bar: the fundamental market data unit.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar for one time bucket of one instrument.
///
/// Mutable only while it is the newest bar of its series; once a later bucket
/// arrives the bar is frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub vwap: f64,
    pub trade_count: u64,
}

impl Bar {
    /// Build a bar covering `[start, start + bar_size_secs)`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        start: DateTime<Utc>,
        bar_size_secs: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
        vwap: f64,
    ) -> Self {
        Self {
            start,
            end: start + Duration::seconds(bar_size_secs),
            open,
            high,
            low,
            close,
            volume,
            vwap,
            trade_count: 0,
        }
    }

    /// Returns true if any price field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.vwap.is_nan()
    }

    /// OHLC sanity check: low <= open, close <= high.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }

    /// Close strictly above open.
    pub fn is_up(&self) -> bool {
        self.close > self.open
    }

    /// Typical price `(high + low + close) / 3`.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Whether `price` lies inside `[low, high]`, both ends inclusive.
    pub fn contains(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_bar() -> Bar {
        Bar::new(
            Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap(),
            60,
            100.0,
            105.0,
            98.0,
            103.0,
            50_000,
            101.5,
        )
    }

    #[test]
    fn bar_end_follows_bar_size() {
        let bar = sample_bar();
        assert_eq!(bar.end - bar.start, Duration::seconds(60));
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.open = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut bar = sample_bar();
        bar.high = 97.0;
        assert!(!bar.is_sane());
    }

    #[test]
    fn contains_is_inclusive() {
        let bar = sample_bar();
        assert!(bar.contains(98.0));
        assert!(bar.contains(105.0));
        assert!(!bar.contains(105.01));
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = sample_bar();
        let json = serde_json::to_string(&bar).unwrap();
        let deser: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, deser);
    }
}
