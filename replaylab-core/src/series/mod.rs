//! Bar series, rolling windows and series groups.

pub mod bar_series;
pub mod bucket;
pub mod group;
pub mod vwap;
pub mod window;

pub use bar_series::{BarSeries, BarUpdate, IngestOutcome};
pub use bucket::{bucket_start, session_anchor};
pub use group::{
    IndicatorDataset, SeriesChange, SeriesError, SeriesEvent, SeriesGroup, SeriesHandle,
    SeriesListener, SharedSeriesGroup,
};
pub use vwap::VwapWindow;
pub use window::RollingWindow;
