//! Time-bucket anchoring for bar aggregation.
//!
//! Buckets are fixed-width and anchored to the instrument's session open on
//! the day of the update, not to midnight. Hourly bars are anchored half an
//! hour earlier so they line up with charts that start hourly bars on the
//! half-hour before the open.

use chrono::{DateTime, Duration, NaiveTime, Utc};

const HOURLY_SECS: i64 = 3600;
const HOURLY_SHIFT_SECS: i64 = 1800;

/// Anchor for a given bar size on the day of `time`.
pub fn session_anchor(time: DateTime<Utc>, bar_size_secs: i64, session_open: NaiveTime) -> DateTime<Utc> {
    let anchor = time.date_naive().and_time(session_open).and_utc();
    if bar_size_secs == HOURLY_SECS {
        anchor - Duration::seconds(HOURLY_SHIFT_SECS)
    } else {
        anchor
    }
}

/// Start of the bucket containing `time`.
pub fn bucket_start(time: DateTime<Utc>, bar_size_secs: i64, session_open: NaiveTime) -> DateTime<Utc> {
    let size = bar_size_secs.max(1);
    let anchor = session_anchor(time, size, session_open);
    let offset = (time - anchor).num_seconds();
    anchor + Duration::seconds(offset.div_euclid(size) * size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn open() -> NaiveTime {
        NaiveTime::from_hms_opt(14, 30, 0).unwrap()
    }

    fn t(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, s).unwrap()
    }

    #[test]
    fn five_minute_buckets_anchor_on_open() {
        assert_eq!(bucket_start(t(14, 30, 0), 300, open()), t(14, 30, 0));
        assert_eq!(bucket_start(t(14, 34, 59), 300, open()), t(14, 30, 0));
        assert_eq!(bucket_start(t(14, 35, 0), 300, open()), t(14, 35, 0));
    }

    #[test]
    fn non_divisor_sizes_follow_the_open_not_midnight() {
        // 7-minute bars: 14:30, 14:37, 14:44 ...
        assert_eq!(bucket_start(t(14, 40, 0), 420, open()), t(14, 37, 0));
    }

    #[test]
    fn hourly_buckets_start_half_hour_earlier() {
        assert_eq!(bucket_start(t(14, 30, 0), 3600, open()), t(14, 0, 0));
        assert_eq!(bucket_start(t(15, 10, 0), 3600, open()), t(15, 0, 0));
    }

    #[test]
    fn updates_before_the_open_land_in_earlier_buckets() {
        assert_eq!(bucket_start(t(14, 29, 0), 300, open()), t(14, 25, 0));
    }
}
