//! Order book state machine: order lifecycle, OCA groups and audit trail.
//!
//! The order book is the registry for every order of a run. It manages:
//! - Order storage and lookup, ordered by id (submission order)
//! - State transitions (Unsubmitted → Submitted → Filled / Cancelled)
//! - OCA enforcement: a fill consumes the group and cancels every sibling
//! - Audit trail for every state transition
//!
//! The order book does NOT compute fill prices; that is the fill engine's job.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{InstrumentId, OcaGroupId, Order, OrderId, OrderStatus};

pub const OCA_SIBLING_FILLED: &str = "OCA sibling filled";
pub const OCA_GROUP_FILLED: &str = "OCA group already filled";

/// Errors from order book operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrderBookError {
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("order {0} already exists")]
    DuplicateOrder(OrderId),

    #[error("order {0} is not active (status: {1})")]
    OrderNotActive(OrderId, String),

    #[error("invalid transition for order {0}: {1} → {2}")]
    InvalidTransition(OrderId, String, String),
}

/// One recorded state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAuditEntry {
    pub order_id: OrderId,
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    /// Start of the bar being evaluated, when the transition happened in a fill pass.
    pub bar_time: Option<DateTime<Utc>>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct OrderBook {
    orders: BTreeMap<OrderId, Order>,
    /// Groups in which an order has filled.
    consumed_groups: HashSet<OcaGroupId>,
    audit_trail: Vec<OrderAuditEntry>,
    next_order_id: u64,
    next_group_id: u64,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Public API ─────────────────────────────────────────────────────

    pub fn next_order_id(&mut self) -> OrderId {
        self.next_order_id += 1;
        OrderId(self.next_order_id)
    }

    pub fn next_group_id(&mut self) -> OcaGroupId {
        self.next_group_id += 1;
        OcaGroupId(self.next_group_id)
    }

    /// Add an order. It must be `Unsubmitted` and its id unused.
    pub fn submit(&mut self, order: Order) -> Result<OrderId, OrderBookError> {
        if self.orders.contains_key(&order.id) {
            return Err(OrderBookError::DuplicateOrder(order.id));
        }
        if order.status != OrderStatus::Unsubmitted {
            return Err(OrderBookError::InvalidTransition(
                order.id,
                order.status.to_string(),
                OrderStatus::Unsubmitted.to_string(),
            ));
        }
        let id = order.id;
        // Keep generated ids ahead of caller-chosen ones.
        self.next_order_id = self.next_order_id.max(id.0);
        self.orders.insert(id, order);
        Ok(id)
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Unsubmitted → Submitted.
    pub fn accept(&mut self, id: OrderId, bar_time: Option<DateTime<Utc>>) -> Result<(), OrderBookError> {
        self.transition(id, OrderStatus::Submitted, bar_time, "accepted", |from| {
            *from == OrderStatus::Unsubmitted
        })
    }

    /// Submitted → Filled. Consumes the order's OCA group and cancels every
    /// other working member; returns the cancelled sibling ids.
    pub fn mark_filled(
        &mut self,
        id: OrderId,
        bar_time: Option<DateTime<Utc>>,
    ) -> Result<Vec<OrderId>, OrderBookError> {
        self.transition(id, OrderStatus::Filled, bar_time, "filled", |from| {
            *from == OrderStatus::Submitted
        })?;
        let group = match self.orders.get(&id).and_then(|o| o.oca_group) {
            Some(group) => group,
            None => return Ok(Vec::new()),
        };
        self.consumed_groups.insert(group);

        let siblings: Vec<OrderId> = self
            .orders
            .values()
            .filter(|o| o.id != id && o.oca_group == Some(group) && o.is_working())
            .map(|o| o.id)
            .collect();
        for sibling in &siblings {
            self.cancel(*sibling, OCA_SIBLING_FILLED, bar_time)?;
        }
        Ok(siblings)
    }

    /// Cancel a working order with a reason.
    pub fn cancel(
        &mut self,
        id: OrderId,
        reason: &str,
        bar_time: Option<DateTime<Utc>>,
    ) -> Result<(), OrderBookError> {
        let order = self.orders.get(&id).ok_or(OrderBookError::OrderNotFound(id))?;
        if !order.is_working() {
            return Err(OrderBookError::OrderNotActive(id, order.status.to_string()));
        }
        let to = OrderStatus::Cancelled {
            reason: reason.to_string(),
        };
        self.transition(id, to, bar_time, reason, |_| true)
    }

    /// Working orders of one instrument, in id order.
    pub fn working_orders(&self, instrument: &InstrumentId) -> Vec<OrderId> {
        self.orders
            .values()
            .filter(|o| o.is_working() && &o.instrument == instrument)
            .map(|o| o.id)
            .collect()
    }

    pub fn has_working_orders(&self, instrument: &InstrumentId) -> bool {
        self.orders
            .values()
            .any(|o| o.is_working() && &o.instrument == instrument)
    }

    /// Ids of every order in a group, in id order.
    pub fn group_members(&self, group: OcaGroupId) -> Vec<OrderId> {
        self.orders
            .values()
            .filter(|o| o.oca_group == Some(group))
            .map(|o| o.id)
            .collect()
    }

    /// Whether an order of this group has already filled.
    pub fn is_group_consumed(&self, group: OcaGroupId) -> bool {
        self.consumed_groups.contains(&group)
    }

    pub fn audit_trail(&self) -> &[OrderAuditEntry] {
        &self.audit_trail
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    // ── Internal helpers ───────────────────────────────────────────────

    fn transition(
        &mut self,
        id: OrderId,
        to: OrderStatus,
        bar_time: Option<DateTime<Utc>>,
        reason: &str,
        allowed_from: impl Fn(&OrderStatus) -> bool,
    ) -> Result<(), OrderBookError> {
        let order = self.orders.get_mut(&id).ok_or(OrderBookError::OrderNotFound(id))?;
        if !allowed_from(&order.status) {
            return Err(OrderBookError::InvalidTransition(
                id,
                order.status.to_string(),
                to.to_string(),
            ));
        }
        let from = std::mem::replace(&mut order.status, to.clone());
        self.audit_trail.push(OrderAuditEntry {
            order_id: id,
            from_status: from,
            to_status: to,
            bar_time,
            reason: reason.to_string(),
        });
        Ok(())
    }
}
