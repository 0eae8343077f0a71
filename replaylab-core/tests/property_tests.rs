//! Property tests for indicator and fill invariants.
//!
//! Uses proptest to verify:
//! 1. Revision convergence: revising the newest bar through any number of
//!    partial states ends where a single pass over the final bars ends
//! 2. Lookback: no output before the kind's lookback, never more points
//!    than bars
//! 3. Bulk and incremental construction agree
//! 4. OCO: at most one member of a group fills per bar

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use replaylab_core::domain::{Bar, Instrument, InstrumentId, OcaGroupId, Order, OrderSide, OrderStatus};
use replaylab_core::engine::{candidate_price, CommissionModel, FillEngine, OrderBook};
use replaylab_core::indicators::config::{MovingAverageKind, PivotBias, Smoothing};
use replaylab_core::indicators::{IndicatorConfig, IndicatorPoint, IndicatorSeries, IndicatorValue};
use replaylab_core::series::{BarSeries, BarUpdate, SeriesGroup};

// ── Helpers ──────────────────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap()
}

fn instrument() -> Instrument {
    Instrument::us_equity("TEST")
}

/// Every indicator kind, with short windows so small inputs reach them.
fn all_configs() -> Vec<IndicatorConfig> {
    vec![
        IndicatorConfig::MovingAverage {
            average: MovingAverageKind::Simple,
            length: 3,
        },
        IndicatorConfig::MovingAverage {
            average: MovingAverageKind::Exponential,
            length: 4,
        },
        IndicatorConfig::MovingAverage {
            average: MovingAverageKind::Weighted,
            length: 3,
        },
        IndicatorConfig::MovingAverage {
            average: MovingAverageKind::VolumeWeighted,
            length: 3,
        },
        IndicatorConfig::Macd {
            fast: 3,
            slow: 6,
            signal: 3,
            signal_smoothing: Smoothing::Exponential,
        },
        IndicatorConfig::Macd {
            fast: 2,
            slow: 5,
            signal: 2,
            signal_smoothing: Smoothing::Simple,
        },
        IndicatorConfig::Rsi { length: 4 },
        IndicatorConfig::Atr { length: 4 },
        IndicatorConfig::Bollinger {
            length: 4,
            multiplier: 2.0,
        },
        IndicatorConfig::Cci { length: 4 },
        IndicatorConfig::MoneyFlow { length: 4 },
        IndicatorConfig::Stochastic {
            length: 4,
            smoothing: 2,
        },
        IndicatorConfig::HeikinAshi,
        IndicatorConfig::Pivot {
            window: 3,
            fit_curve: false,
            bias: PivotBias::Both,
            min_range: Some(0.0),
        },
        IndicatorConfig::Oscillator { fast: 2, slow: 4 },
    ]
}

fn components(value: &IndicatorValue) -> Vec<f64> {
    match *value {
        IndicatorValue::Single(v) => vec![v],
        IndicatorValue::Macd {
            macd,
            signal,
            histogram,
        } => vec![macd, signal, histogram],
        IndicatorValue::Bands { upper, middle, lower } => vec![upper, middle, lower],
        IndicatorValue::Stochastic { k, d } => vec![k, d],
        IndicatorValue::Candle {
            open,
            high,
            low,
            close,
        } => vec![open, high, low, close],
        IndicatorValue::Pivot {
            pivot_index, price, ..
        } => vec![pivot_index as f64, price],
    }
}

fn assert_points_close(name: &str, actual: &[IndicatorPoint], expected: &[IndicatorPoint]) -> Result<(), TestCaseError> {
    prop_assert_eq!(actual.len(), expected.len(), "{}: point count", name);
    for (a, e) in actual.iter().zip(expected) {
        prop_assert_eq!(a.bar_index, e.bar_index, "{}: bar index", name);
        prop_assert_eq!(
            std::mem::discriminant(&a.value),
            std::mem::discriminant(&e.value),
            "{}: value shape",
            name
        );
        for (x, y) in components(&a.value).into_iter().zip(components(&e.value)) {
            let tolerance = 1e-6 * y.abs().max(1.0);
            prop_assert!((x - y).abs() <= tolerance, "{}: {} vs {} at bar {}", name, x, y, a.bar_index);
        }
    }
    Ok(())
}

// ── Strategies (proptest) ────────────────────────────────────────────

/// One final bar plus the partial states it passes through before closing.
#[derive(Debug, Clone)]
struct EvolvingBar {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
    /// (close, volume) of each intermediate state.
    partials: Vec<(f64, u64)>,
}

fn arb_evolving_bar() -> impl Strategy<Value = EvolvingBar> {
    (
        50.0..150.0_f64,
        -3.0..3.0_f64,
        0.0..2.0_f64,
        0.0..2.0_f64,
        1u64..10_000,
        prop::collection::vec((0.0..1.0_f64, 1u64..10_000), 0..3),
    )
        .prop_map(|(open, change, up, down, volume, raw)| {
            let close = open + change;
            let high = open.max(close) + up;
            let low = open.min(close) - down;
            let partials = raw
                .into_iter()
                .map(|(frac, v)| (low + frac * (high - low), v))
                .collect();
            EvolvingBar {
                open,
                high,
                low,
                close,
                volume,
                partials,
            }
        })
}

fn arb_path() -> impl Strategy<Value = Vec<EvolvingBar>> {
    prop::collection::vec(arb_evolving_bar(), 1..30)
}

fn final_bars(path: &[EvolvingBar]) -> Vec<Bar> {
    path.iter()
        .enumerate()
        .map(|(i, b)| {
            let vwap = (b.high + b.low + b.close) / 3.0;
            Bar::new(t0() + Duration::minutes(i as i64), 60, b.open, b.high, b.low, b.close, b.volume, vwap)
        })
        .collect()
}

fn partial_bar(final_bar: &Bar, close: f64, volume: u64) -> Bar {
    let high = final_bar.open.max(close);
    let low = final_bar.open.min(close);
    Bar::new(final_bar.start, 60, final_bar.open, high, low, close, volume, (high + low + close) / 3.0)
}

// ── 1. Revision Convergence ──────────────────────────────────────────

proptest! {
    /// Revisions of the newest bar leave no trace once it is revised to
    /// its final values.
    #[test]
    fn revisions_converge_to_a_single_pass(path in arb_path()) {
        let bars = final_bars(&path);
        for config in all_configs() {
            let mut incremental = IndicatorSeries::new(config.clone()).unwrap();
            for (i, step) in path.iter().enumerate() {
                let mut is_new_bar = true;
                for &(close, volume) in &step.partials {
                    let mut prefix = bars[..i].to_vec();
                    prefix.push(partial_bar(&bars[i], close, volume));
                    let series = BarSeries::from_bars(instrument(), 60, &prefix);
                    incremental.update_series(&series, i, is_new_bar);
                    is_new_bar = false;
                }
                let series = BarSeries::from_bars(instrument(), 60, &bars[..=i]);
                incremental.update_series(&series, i, is_new_bar);
            }

            let mut single_pass = IndicatorSeries::new(config).unwrap();
            single_pass.create_series(&BarSeries::from_bars(instrument(), 60, &bars));
            assert_points_close(single_pass.name(), incremental.points(), single_pass.points())?;
        }
    }

    /// The same holds when revisions arrive as same-bucket updates
    /// through a series group.
    #[test]
    fn group_revisions_converge(path in arb_path()) {
        let bars = final_bars(&path);
        let mut group = SeriesGroup::new("revised", BarSeries::new(instrument(), 60));
        let handles = group.attach_many(&all_configs()).unwrap();
        for (i, step) in path.iter().enumerate() {
            for &(close, volume) in &step.partials {
                group.ingest(&BarUpdate::from(&partial_bar(&bars[i], close, volume)), 1);
            }
            group.ingest(&BarUpdate::from(&bars[i]), 1);
        }

        let mut reference = SeriesGroup::new("reference", BarSeries::new(instrument(), 60));
        reference.attach_many(&all_configs()).unwrap();
        for bar in &bars {
            reference.ingest(&BarUpdate::from(bar), 1);
        }

        prop_assert_eq!(group.bars().len(), bars.len());
        for handle in handles {
            let revised = group.series(handle).unwrap();
            let expected = reference.series(handle).unwrap();
            assert_points_close(revised.name(), revised.points(), expected.points())?;
        }
    }
}

// ── 2. Lookback ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn no_output_before_lookback(path in arb_path()) {
        let bars = BarSeries::from_bars(instrument(), 60, &final_bars(&path));
        for config in all_configs() {
            let mut series = IndicatorSeries::new(config).unwrap();
            series.create_series(&bars);
            prop_assert!(series.len() <= bars.len());
            if let Some(first) = series.points().first() {
                prop_assert!(
                    first.bar_index >= series.lookback(),
                    "{} emitted at {} before lookback {}",
                    series.name(),
                    first.bar_index,
                    series.lookback()
                );
            }
            prop_assert!(series.points().windows(2).all(|w| w[0].bar_index < w[1].bar_index));
        }
    }
}

// ── 3. Bulk vs Incremental ───────────────────────────────────────────

proptest! {
    /// Attaching after the bars exist gives the same points as attaching
    /// first and feeding bar by bar.
    #[test]
    fn late_attach_matches_incremental(path in arb_path()) {
        let bars = final_bars(&path);
        let mut early = SeriesGroup::new("early", BarSeries::new(instrument(), 60));
        let handles = early.attach_many(&all_configs()).unwrap();
        for bar in &bars {
            early.ingest(&BarUpdate::from(bar), 1);
        }

        let mut late = SeriesGroup::new("late", BarSeries::from_bars(instrument(), 60, &bars));
        let late_handles = late.attach_many(&all_configs()).unwrap();

        for (a, b) in handles.into_iter().zip(late_handles) {
            let incremental = early.series(a).unwrap();
            let bulk = late.series(b).unwrap();
            assert_points_close(bulk.name(), incremental.points(), bulk.points())?;
        }
    }
}

// ── 4. OCO Single Fill ───────────────────────────────────────────────

fn arb_bar() -> impl Strategy<Value = Bar> {
    (90.0..110.0_f64, -5.0..5.0_f64, 0.0..5.0_f64, 0.0..5.0_f64).prop_map(|(open, change, up, down)| {
        let close = open + change;
        let high = open.max(close) + up;
        let low = open.min(close) - down;
        Bar::new(t0(), 60, open, high, low, close, 1_000, (high + low + close) / 3.0)
    })
}

proptest! {
    /// A protective bracket never fills both legs on one bar; when one
    /// leg fills the other is cancelled, and when both were marketable
    /// the bar direction picks the price.
    #[test]
    fn oco_group_fills_at_most_once(
        bar in arb_bar(),
        target in 95.0..115.0_f64,
        stop in 85.0..105.0_f64,
    ) {
        let es = InstrumentId::new("ES");
        let mut book = OrderBook::new();
        let group: OcaGroupId = book.next_group_id();
        let target_id = book.next_order_id();
        let target_order = Order::limit(target_id, es.clone(), OrderSide::Sell, 1.0, target).in_group(group);
        let stop_id = book.next_order_id();
        let stop_order = Order::stop(stop_id, es.clone(), OrderSide::Sell, 1.0, stop).in_group(group);

        let target_price = candidate_price(&target_order, &bar);
        let stop_price = candidate_price(&stop_order, &bar);
        book.submit(target_order).unwrap();
        book.submit(stop_order).unwrap();

        let mut engine = FillEngine::new(CommissionModel::free());
        let report = engine.evaluate(&bar, &es, &mut book);

        let statuses = [
            book.get(target_id).unwrap().status.clone(),
            book.get(stop_id).unwrap().status.clone(),
        ];
        let filled = statuses.iter().filter(|s| **s == OrderStatus::Filled).count();
        prop_assert!(filled <= 1);
        prop_assert_eq!(report.fills.len(), filled);

        match (target_price, stop_price) {
            (None, None) => {
                prop_assert_eq!(filled, 0);
                prop_assert!(statuses.iter().all(|s| *s == OrderStatus::Submitted));
            }
            (Some(t), Some(s)) => {
                prop_assert_eq!(filled, 1);
                let expected = if bar.is_up() { t.max(s) } else { t.min(s) };
                prop_assert_eq!(report.fills[0].price, expected);
                prop_assert!(statuses.iter().any(|s| matches!(s, OrderStatus::Cancelled { .. })), "expected a Cancelled status");
            }
            _ => {
                prop_assert_eq!(filled, 1);
                prop_assert!(statuses.iter().any(|s| matches!(s, OrderStatus::Cancelled { .. })), "expected a Cancelled status");
            }
        }
    }
}
