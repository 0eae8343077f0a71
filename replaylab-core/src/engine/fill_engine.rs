//! Backtest fill engine: evaluates working orders against one completed bar.
//!
//! A pass runs in three steps:
//! 1. every `Unsubmitted` order is accepted,
//! 2. legs of consumed OCA groups are cancelled, held or not; each other
//!    transmitted order gets a candidate price (or none),
//! 3. candidates are resolved per OCA group and filled in id order.
//!
//! Price rules:
//! - market: the bar's open
//! - opening limit/stop: the order price, when it lies inside [low, high]
//! - closing limit: the limit, when high (sell) or low (buy) reaches it, or
//!   the open when the bar gapped through it
//! - closing stop: the stop, or the open when the bar gapped through it
//! - stop-limit: triggers like a stop, then fills at the limit if it is inside [low, high]
//!
//! When two or more members of a group are candidates, an up bar picks the
//! highest price and a down or flat bar the lowest; equal prices go to the
//! earlier order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::commission::CommissionModel;
use super::events::OrderEvent;
use super::order_book::{OrderBook, OCA_GROUP_FILLED, OCA_SIBLING_FILLED};
use crate::domain::{
    Bar, Fill, FillId, InstrumentId, OcaGroupId, Order, OrderId, OrderKind, OrderSide, OrderStatus,
};

/// Outcome of one fill pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FillReport {
    pub events: Vec<OrderEvent>,
    pub fills: Vec<Fill>,
    /// Set when a filled order was flagged as opening a position.
    pub opened_position: bool,
}

impl FillReport {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FillEngine {
    commission: CommissionModel,
    next_fill_id: u64,
}

impl Default for FillEngine {
    fn default() -> Self {
        Self::new(CommissionModel::default())
    }
}

impl FillEngine {
    pub fn new(commission: CommissionModel) -> Self {
        Self {
            commission,
            next_fill_id: 0,
        }
    }

    pub fn commission_model(&self) -> &CommissionModel {
        &self.commission
    }

    /// Evaluate every working order of `instrument` against `bar`.
    pub fn evaluate(&mut self, bar: &Bar, instrument: &InstrumentId, book: &mut OrderBook) -> FillReport {
        let mut report = FillReport::default();
        let bar_time = Some(bar.start);
        if bar.is_void() {
            warn!(instrument = %instrument, time = %bar.start, "void bar, fill pass skipped");
            return report;
        }

        // Step 1: accept.
        for id in book.working_orders(instrument) {
            let unsubmitted = book
                .get(id)
                .is_some_and(|o| o.status == OrderStatus::Unsubmitted);
            if unsubmitted && book.accept(id, bar_time).is_ok() {
                report.events.push(OrderEvent::Submitted(id));
            }
        }

        // Step 2: candidates.
        let mut ungrouped: Vec<(OrderId, f64)> = Vec::new();
        let mut grouped: BTreeMap<OcaGroupId, Vec<(OrderId, f64)>> = BTreeMap::new();
        for id in book.working_orders(instrument) {
            let Some(order) = book.get(id) else {
                continue;
            };
            if let Some(group) = order.oca_group {
                if book.is_group_consumed(group) {
                    if book.cancel(id, OCA_GROUP_FILLED, bar_time).is_ok() {
                        report.events.push(OrderEvent::Cancelled {
                            order_id: id,
                            reason: OCA_GROUP_FILLED.to_string(),
                        });
                    }
                    continue;
                }
            }
            if !order.transmit {
                continue;
            }
            let Some(price) = candidate_price(order, bar) else {
                continue;
            };
            match order.oca_group {
                Some(group) => grouped.entry(group).or_default().push((id, price)),
                None => ungrouped.push((id, price)),
            }
        }

        // Step 3: resolve groups, then fill in id order.
        let mut winners = ungrouped;
        for (group, candidates) in grouped {
            if let Some(winner) = pick_group_winner(&candidates, bar.is_up()) {
                debug!(group = %group, order = %winner.0, price = winner.1, "OCA group resolved");
                winners.push(winner);
            }
        }
        winners.sort_by_key(|(id, _)| *id);

        for (id, price) in winners {
            self.fill(id, price, bar, book, &mut report);
        }
        report
    }

    fn fill(&mut self, id: OrderId, price: f64, bar: &Bar, book: &mut OrderBook, report: &mut FillReport) {
        let Some(order) = book.get(id).cloned() else {
            warn!(order = %id, "order vanished before fill, skipped");
            return;
        };
        let siblings = match book.mark_filled(id, Some(bar.start)) {
            Ok(siblings) => siblings,
            Err(err) => {
                warn!(order = %id, error = %err, "fill rejected by order book");
                return;
            }
        };

        self.next_fill_id += 1;
        let fill = Fill {
            id: FillId(self.next_fill_id),
            order_id: id,
            instrument: order.instrument.clone(),
            bar_time: bar.start,
            side: order.side,
            price,
            quantity: order.quantity,
            commission: self.commission.commission(order.quantity),
            is_opening: order.is_opening,
        };
        debug!(order = %id, side = ?order.side, price, qty = order.quantity, "order filled");

        if order.is_opening {
            report.opened_position = true;
        }
        report.fills.push(fill.clone());
        report.events.push(OrderEvent::Filled(fill));
        for sibling in siblings {
            report.events.push(OrderEvent::Cancelled {
                order_id: sibling,
                reason: OCA_SIBLING_FILLED.to_string(),
            });
        }
    }
}

/// Price at which `order` would fill on `bar`, if it is marketable.
pub fn candidate_price(order: &Order, bar: &Bar) -> Option<f64> {
    match order.kind {
        OrderKind::Market => Some(bar.open),
        OrderKind::Limit | OrderKind::Stop if order.is_opening => {
            let price = order.order_price()?;
            bar.contains(price).then_some(price)
        }
        OrderKind::Limit => {
            let limit = order.limit_price;
            match order.side {
                OrderSide::Sell if bar.high >= limit => Some(limit.max(bar.open)),
                OrderSide::Buy if bar.low <= limit => Some(limit.min(bar.open)),
                _ => None,
            }
        }
        OrderKind::Stop => stop_trigger(order.side, order.aux_price, bar),
        OrderKind::StopLimit => {
            stop_trigger(order.side, order.aux_price, bar)?;
            bar.contains(order.limit_price).then_some(order.limit_price)
        }
    }
}

fn stop_trigger(side: OrderSide, stop: f64, bar: &Bar) -> Option<f64> {
    match side {
        OrderSide::Sell if bar.low <= stop => Some(stop.min(bar.open)),
        OrderSide::Buy if bar.high >= stop => Some(stop.max(bar.open)),
        _ => None,
    }
}

fn pick_group_winner(candidates: &[(OrderId, f64)], up_bar: bool) -> Option<(OrderId, f64)> {
    candidates.iter().copied().reduce(|best, next| {
        let better = if up_bar { next.1 > best.1 } else { next.1 < best.1 };
        let tie_to_earlier = next.1 == best.1 && next.0 < best.0;
        if better || tie_to_earlier {
            next
        } else {
            best
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn es() -> InstrumentId {
        InstrumentId::new("ES")
    }

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Bar {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        Bar::new(start, 60, o, h, l, c, 1_000, (h + l + c) / 3.0)
    }

    fn engine() -> FillEngine {
        FillEngine::new(CommissionModel::free())
    }

    fn submit(book: &mut OrderBook, build: impl FnOnce(OrderId) -> Order) -> OrderId {
        let id = book.next_order_id();
        book.submit(build(id)).unwrap()
    }

    // ─── Single orders ───

    #[test]
    fn market_fills_at_open() {
        let mut book = OrderBook::new();
        let id = submit(&mut book, |id| Order::market(id, es(), OrderSide::Buy, 2.0).opening());
        let report = engine().evaluate(&bar(10.0, 12.0, 9.0, 11.0), &es(), &mut book);
        assert_eq!(report.fills.len(), 1);
        assert_eq!(report.fills[0].price, 10.0);
        assert!(report.opened_position);
        assert_eq!(book.get(id).unwrap().status, OrderStatus::Filled);
        assert_eq!(report.events[0], OrderEvent::Submitted(id));
    }

    #[test]
    fn opening_limit_needs_price_inside_range() {
        let mut book = OrderBook::new();
        let inside = submit(&mut book, |id| Order::limit(id, es(), OrderSide::Buy, 1.0, 9.5).opening());
        let outside = submit(&mut book, |id| Order::limit(id, es(), OrderSide::Buy, 1.0, 8.0).opening());
        let report = engine().evaluate(&bar(10.0, 12.0, 9.0, 11.0), &es(), &mut book);
        assert_eq!(report.fills.len(), 1);
        assert_eq!(report.fills[0].order_id, inside);
        assert_eq!(report.fills[0].price, 9.5);
        assert_eq!(book.get(outside).unwrap().status, OrderStatus::Submitted);
    }

    #[test]
    fn closing_stop_gap_fills_at_open() {
        let mut book = OrderBook::new();
        submit(&mut book, |id| Order::stop(id, es(), OrderSide::Sell, 1.0, 9.5));
        // Gapped down through the stop.
        let report = engine().evaluate(&bar(9.0, 9.2, 8.5, 8.8), &es(), &mut book);
        assert_eq!(report.fills[0].price, 9.0);
    }

    #[test]
    fn closing_buy_stop_gap_fills_at_open() {
        let mut book = OrderBook::new();
        submit(&mut book, |id| Order::stop(id, es(), OrderSide::Buy, 1.0, 10.5));
        let report = engine().evaluate(&bar(11.0, 11.5, 10.8, 11.2), &es(), &mut book);
        assert_eq!(report.fills[0].price, 11.0);
    }

    #[test]
    fn closing_limit_fills_at_the_limit_when_reached() {
        let mut book = OrderBook::new();
        submit(&mut book, |id| Order::limit(id, es(), OrderSide::Sell, 1.0, 11.5));
        submit(&mut book, |id| Order::limit(id, es(), OrderSide::Buy, 1.0, 9.5));
        let report = engine().evaluate(&bar(10.0, 12.0, 9.0, 11.0), &es(), &mut book);
        let prices: Vec<f64> = report.fills.iter().map(|f| f.price).collect();
        assert_eq!(prices, vec![11.5, 9.5]);
    }

    #[test]
    fn closing_sell_limit_gap_fills_at_open() {
        let mut book = OrderBook::new();
        submit(&mut book, |id| Order::limit(id, es(), OrderSide::Sell, 1.0, 10.5));
        // Gapped up over the limit.
        let report = engine().evaluate(&bar(11.0, 11.5, 10.8, 11.2), &es(), &mut book);
        assert_eq!(report.fills[0].price, 11.0);
    }

    #[test]
    fn closing_buy_limit_gap_fills_at_open() {
        let mut book = OrderBook::new();
        submit(&mut book, |id| Order::limit(id, es(), OrderSide::Buy, 1.0, 9.5));
        let report = engine().evaluate(&bar(9.0, 9.2, 8.5, 8.8), &es(), &mut book);
        assert_eq!(report.fills[0].price, 9.0);
    }

    #[test]
    fn stop_limit_needs_trigger_and_limit() {
        let mut book = OrderBook::new();
        let filled = submit(&mut book, |id| Order::stop_limit(id, es(), OrderSide::Buy, 1.0, 11.0, 11.5));
        let untriggered = submit(&mut book, |id| Order::stop_limit(id, es(), OrderSide::Buy, 1.0, 13.0, 13.5));
        let report = engine().evaluate(&bar(10.0, 12.0, 9.0, 11.0), &es(), &mut book);
        assert_eq!(report.fills.len(), 1);
        assert_eq!(report.fills[0].order_id, filled);
        assert_eq!(report.fills[0].price, 11.5);
        assert!(book.get(untriggered).unwrap().is_working());
    }

    #[test]
    fn held_orders_are_accepted_but_not_filled() {
        let mut book = OrderBook::new();
        let id = submit(&mut book, |id| Order::market(id, es(), OrderSide::Buy, 1.0).held());
        let report = engine().evaluate(&bar(10.0, 12.0, 9.0, 11.0), &es(), &mut book);
        assert!(report.fills.is_empty());
        assert_eq!(book.get(id).unwrap().status, OrderStatus::Submitted);
    }

    #[test]
    fn commission_is_charged() {
        let mut book = OrderBook::new();
        submit(&mut book, |id| Order::market(id, es(), OrderSide::Buy, 1000.0));
        let mut engine = FillEngine::new(CommissionModel::new(0.005, 1.0));
        let report = engine.evaluate(&bar(10.0, 12.0, 9.0, 11.0), &es(), &mut book);
        assert!((report.fills[0].commission - 5.0).abs() < 1e-12);
    }

    // ─── OCA groups ───

    fn bracket(book: &mut OrderBook) -> (OrderId, OrderId, OcaGroupId) {
        let group = book.next_group_id();
        let target = submit(book, |id| Order::limit(id, es(), OrderSide::Sell, 1.0, 10.5).in_group(group));
        let stop = submit(book, |id| Order::stop(id, es(), OrderSide::Sell, 1.0, 9.5).in_group(group));
        (target, stop, group)
    }

    #[test]
    fn up_bar_picks_highest_price() {
        let mut book = OrderBook::new();
        let (target, stop, _) = bracket(&mut book);
        let report = engine().evaluate(&bar(10.0, 12.0, 9.0, 11.0), &es(), &mut book);
        assert_eq!(report.fills.len(), 1);
        assert_eq!(report.fills[0].order_id, target);
        assert_eq!(report.fills[0].price, 10.5);
        assert!(report.events.contains(&OrderEvent::Cancelled {
            order_id: stop,
            reason: OCA_SIBLING_FILLED.into(),
        }));
    }

    #[test]
    fn down_bar_picks_lowest_price() {
        let mut book = OrderBook::new();
        let (_, stop, _) = bracket(&mut book);
        let report = engine().evaluate(&bar(11.0, 12.0, 9.0, 10.0), &es(), &mut book);
        assert_eq!(report.fills[0].order_id, stop);
        assert_eq!(report.fills[0].price, 9.5);
    }

    #[test]
    fn single_marketable_member_cancels_the_rest() {
        let mut book = OrderBook::new();
        let (target, stop, _) = bracket(&mut book);
        let report = engine().evaluate(&bar(10.0, 11.0, 9.8, 10.9), &es(), &mut book);
        assert_eq!(report.fills[0].order_id, target);
        assert!(!book.get(stop).unwrap().is_working());
    }

    #[test]
    fn untouched_group_stays_working() {
        let mut book = OrderBook::new();
        let (target, stop, group) = bracket(&mut book);
        let report = engine().evaluate(&bar(10.0, 10.2, 9.8, 10.1), &es(), &mut book);
        assert!(report.fills.is_empty());
        assert!(book.get(target).unwrap().is_working());
        assert!(book.get(stop).unwrap().is_working());
        assert!(!book.is_group_consumed(group));
    }

    #[test]
    fn late_leg_of_consumed_group_is_cancelled() {
        let mut book = OrderBook::new();
        let (_, _, group) = bracket(&mut book);
        let mut engine = engine();
        engine.evaluate(&bar(10.0, 12.0, 9.0, 11.0), &es(), &mut book);

        let late = submit(&mut book, |id| Order::market(id, es(), OrderSide::Sell, 1.0).in_group(group));
        let report = engine.evaluate(&bar(10.0, 12.0, 9.0, 11.0), &es(), &mut book);
        assert!(report.fills.is_empty());
        assert_eq!(
            book.get(late).unwrap().status,
            OrderStatus::Cancelled {
                reason: OCA_GROUP_FILLED.into()
            }
        );
    }

    #[test]
    fn held_leg_of_consumed_group_is_cancelled() {
        let mut book = OrderBook::new();
        let (_, _, group) = bracket(&mut book);
        let mut engine = engine();
        engine.evaluate(&bar(10.0, 12.0, 9.0, 11.0), &es(), &mut book);

        let held = submit(&mut book, |id| Order::stop(id, es(), OrderSide::Sell, 1.0, 9.0).in_group(group).held());
        let report = engine.evaluate(&bar(10.0, 12.0, 9.0, 11.0), &es(), &mut book);
        assert!(report.fills.is_empty());
        assert!(report.events.contains(&OrderEvent::Cancelled {
            order_id: held,
            reason: OCA_GROUP_FILLED.into(),
        }));
        assert!(!book.get(held).unwrap().is_working());
    }

    #[test]
    fn equal_prices_go_to_the_earlier_order() {
        let candidates = [(OrderId(5), 10.0), (OrderId(3), 10.0), (OrderId(4), 9.0)];
        assert_eq!(pick_group_winner(&candidates, true), Some((OrderId(3), 10.0)));
        assert_eq!(pick_group_winner(&candidates, false), Some((OrderId(4), 9.0)));
        assert_eq!(pick_group_winner(&[], true), None);
    }

    #[test]
    fn other_instruments_are_ignored() {
        let mut book = OrderBook::new();
        let id = submit(&mut book, |id| Order::market(id, InstrumentId::new("NQ"), OrderSide::Buy, 1.0));
        let report = engine().evaluate(&bar(10.0, 12.0, 9.0, 11.0), &es(), &mut book);
        assert!(report.is_empty());
        assert_eq!(book.get(id).unwrap().status, OrderStatus::Unsubmitted);
    }
}
