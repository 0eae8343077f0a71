//! ReplayLab Core: bar series, incremental indicators and backtest replay.
//!
//! This crate contains:
//! - Domain types (bars, instruments, orders, fills, positions)
//! - Bar series with sub-bar aggregation and a rolling VWAP
//! - Incremental indicator series sharing one update contract
//! - Series groups that cascade each bar through their indicators
//! - A backtest fill engine with OCA groups
//! - A replay coordinator that drives strategy threads bar by bar
//! - Persistence seams for bars, series, fills and order statuses

pub mod config;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod series;
pub mod store;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared between the coordinator and
    /// strategy threads is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Order>();
        require_sync::<domain::Order>();
        require_send::<domain::Fill>();
        require_sync::<domain::Fill>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::Instrument>();
        require_sync::<domain::Instrument>();
        require_send::<domain::RunId>();
        require_sync::<domain::RunId>();

        // Series
        require_send::<series::BarSeries>();
        require_sync::<series::BarSeries>();
        require_send::<series::SeriesGroup>();
        require_sync::<series::SeriesGroup>();
        require_send::<series::SharedSeriesGroup>();
        require_sync::<series::SharedSeriesGroup>();
        require_send::<indicators::IndicatorSeries>();
        require_sync::<indicators::IndicatorSeries>();

        // Engine
        require_send::<engine::OrderBook>();
        require_sync::<engine::OrderBook>();
        require_send::<engine::Handshake>();
        require_sync::<engine::Handshake>();
        require_send::<engine::RequestRegistry>();
        require_sync::<engine::RequestRegistry>();
        require_send::<engine::BacktestGateway>();
        require_sync::<engine::BacktestGateway>();
        require_send::<engine::StrategyEvent>();
        require_send::<engine::BacktestReport>();
        require_sync::<engine::BacktestReport>();
        require_send::<engine::BacktestCoordinator>();

        // Stores
        require_send::<store::MemoryStore>();
        require_sync::<store::MemoryStore>();
        require_send::<store::CsvBarStore>();
        require_sync::<store::CsvBarStore>();
    }

    /// Strategies see the series through a shared borrow only; a callback
    /// that places orders leaves bars and indicator points untouched.
    #[test]
    fn strategy_callbacks_leave_series_unchanged() {
        use chrono::{Duration, TimeZone, Utc};
        use engine::Strategy;

        let instrument = domain::Instrument::us_equity("ES");
        let mut group = series::SeriesGroup::new("ES", series::BarSeries::new(instrument.clone(), 60));
        let sma = group
            .attach(indicators::IndicatorConfig::MovingAverage {
                average: indicators::MovingAverageKind::Simple,
                length: 2,
            })
            .unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        for (i, close) in [10.0, 10.5, 11.0].into_iter().enumerate() {
            let bar = domain::Bar::new(t0 + Duration::minutes(i as i64), 60, close, close, close, close, 100, close);
            group.ingest(&series::BarUpdate::from(&bar), 1);
        }
        let bars_before = group.bars().bars().to_vec();
        let points_before = group.series(sma).unwrap().points().to_vec();

        let mut strategy = engine::ScriptedStrategy::new(engine::OrderPlan {
            name: "read-only".into(),
            entries: vec![engine::PlannedEntry {
                bar_index: 2,
                side: domain::OrderSide::Buy,
                order: engine::EntryOrder::Market,
                quantity: 1.0,
                target_offset: None,
                stop_offset: None,
            }],
            stop_when_done: true,
        });
        let gateway = engine::BacktestGateway::default();
        let ctx = engine::StrategyContext {
            group: &group,
            gateway: &gateway,
            instrument: &instrument.id,
        };
        let event = series::SeriesEvent {
            group: "ES".into(),
            bar_index: 2,
            change: series::SeriesChange::BarAdded,
        };
        assert_eq!(strategy.on_bar(&ctx, &event), engine::StrategyAction::Continue);

        assert_eq!(gateway.book().lock().len(), 1);
        assert_eq!(group.bars().bars(), bars_before.as_slice());
        assert_eq!(group.series(sma).unwrap().points(), points_before.as_slice());
        assert_eq!(points_before.len(), 2);
    }
}
