//! Strategy that replays a fixed plan of entries with bracket exits.
//!
//! Each entry fires on a given bar index. When its fill opens a position,
//! a one-cancels-all bracket (profit target limit + protective stop) is
//! placed around the entry price so it can be evaluated on the same bar.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::gateway::OrderGateway;
use super::strategy::{Strategy, StrategyAction, StrategyContext};
use crate::domain::{Fill, InstrumentId, Order, OrderId, OrderSide, Position};
use crate::series::{SeriesChange, SeriesEvent};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryOrder {
    Market,
    Limit { price: f64 },
    Stop { price: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedEntry {
    /// Bar whose close triggers the entry.
    pub bar_index: usize,
    pub side: OrderSide,
    #[serde(default = "default_entry_order")]
    pub order: EntryOrder,
    pub quantity: f64,
    /// Distance of the profit target from the entry price.
    pub target_offset: Option<f64>,
    /// Distance of the protective stop from the entry price.
    pub stop_offset: Option<f64>,
}

fn default_entry_order() -> EntryOrder {
    EntryOrder::Market
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlan {
    pub name: String,
    pub entries: Vec<PlannedEntry>,
    /// Stop once the last entry's position has closed.
    #[serde(default = "default_true")]
    pub stop_when_done: bool,
}

fn default_true() -> bool {
    true
}

impl OrderPlan {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug)]
pub struct ScriptedStrategy {
    plan: OrderPlan,
    next_entry: usize,
    /// Entry whose opening order is working or whose position is open.
    active: Option<usize>,
    /// Opening order of the active entry until it fills.
    entry_order: Option<OrderId>,
}

impl ScriptedStrategy {
    pub fn new(mut plan: OrderPlan) -> Self {
        plan.entries.sort_by_key(|e| e.bar_index);
        Self {
            plan,
            next_entry: 0,
            active: None,
            entry_order: None,
        }
    }

    fn done(&self) -> bool {
        self.active.is_none() && self.next_entry >= self.plan.entries.len()
    }

    fn place_entry(
        &self,
        entry: &PlannedEntry,
        gateway: &dyn OrderGateway,
        instrument: &InstrumentId,
    ) -> Option<OrderId> {
        let id = gateway.next_order_id();
        let order = match entry.order {
            EntryOrder::Market => Order::market(id, instrument.clone(), entry.side, entry.quantity),
            EntryOrder::Limit { price } => {
                Order::limit(id, instrument.clone(), entry.side, entry.quantity, price)
            }
            EntryOrder::Stop { price } => {
                Order::stop(id, instrument.clone(), entry.side, entry.quantity, price)
            }
        };
        match gateway.place_order(order.opening()) {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(strategy = %self.plan.name, error = %err, "entry rejected");
                None
            }
        }
    }
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        &self.plan.name
    }

    fn on_bar(&mut self, ctx: &StrategyContext<'_>, event: &SeriesEvent) -> StrategyAction {
        if event.change != SeriesChange::BarAdded || self.active.is_some() {
            return StrategyAction::Continue;
        }
        // Entries scheduled for bars already behind us are dropped.
        while let Some(entry) = self.plan.entries.get(self.next_entry) {
            if entry.bar_index >= event.bar_index {
                break;
            }
            debug!(strategy = %self.plan.name, bar = entry.bar_index, "missed entry dropped");
            self.next_entry += 1;
        }
        if let Some(entry) = self.plan.entries.get(self.next_entry) {
            if entry.bar_index == event.bar_index {
                self.entry_order = self.place_entry(entry, ctx.gateway, ctx.instrument);
                if self.entry_order.is_some() {
                    self.active = Some(self.next_entry);
                }
                self.next_entry += 1;
            }
        }
        StrategyAction::Continue
    }

    fn on_position_opened(&mut self, ctx: &StrategyContext<'_>, position: &Position) {
        let Some(entry) = self.active.and_then(|i| self.plan.entries.get(i)) else {
            return;
        };
        let exit_side = entry.side.opposite();
        let direction = entry.side.sign();
        let quantity = position.quantity.abs();
        let entry_price = position.avg_entry_price;
        let group = ctx.gateway.next_group_id();

        let mut exits = Vec::new();
        if let Some(offset) = entry.target_offset {
            let id = ctx.gateway.next_order_id();
            let price = entry_price + direction * offset;
            exits.push(Order::limit(id, ctx.instrument.clone(), exit_side, quantity, price).in_group(group));
        }
        if let Some(offset) = entry.stop_offset {
            let id = ctx.gateway.next_order_id();
            let price = entry_price - direction * offset;
            exits.push(Order::stop(id, ctx.instrument.clone(), exit_side, quantity, price).in_group(group));
        }
        for order in exits {
            if let Err(err) = ctx.gateway.place_order(order) {
                warn!(strategy = %self.plan.name, error = %err, "exit order rejected");
            }
        }
    }

    fn on_order_filled(&mut self, _ctx: &StrategyContext<'_>, fill: &Fill) {
        if self.entry_order == Some(fill.order_id) {
            self.entry_order = None;
        }
    }

    fn on_order_cancelled(&mut self, _ctx: &StrategyContext<'_>, order: OrderId, reason: &str) {
        debug!(strategy = %self.plan.name, order = %order, reason, "order cancelled");
        if self.entry_order == Some(order) {
            // The entry never filled; the next planned entry may fire.
            self.entry_order = None;
            self.active = None;
        }
    }

    fn on_position_closed(&mut self, _ctx: &StrategyContext<'_>, _position: &Position) -> StrategyAction {
        self.active = None;
        if self.plan.stop_when_done && self.done() {
            StrategyAction::Stop
        } else {
            StrategyAction::Continue
        }
    }
}
