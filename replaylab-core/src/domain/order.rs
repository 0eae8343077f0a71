//! Order types and the backtest order lifecycle.

use super::ids::{InstrumentId, OcaGroupId, OrderId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

/// What kind of order. Prices live on the order itself (`limit_price`,
/// `aux_price`), mirroring the broker order shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Market,
    Limit,
    Stop,
    StopLimit,
}

/// Order lifecycle: Unsubmitted → Submitted → Filled | Cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Unsubmitted,
    Submitted,
    Filled,
    Cancelled { reason: String },
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled { .. })
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Unsubmitted => write!(f, "Unsubmitted"),
            OrderStatus::Submitted => write!(f, "Submitted"),
            OrderStatus::Filled => write!(f, "Filled"),
            OrderStatus::Cancelled { reason } => write!(f, "Cancelled ({reason})"),
        }
    }
}

/// A single order as seen by the fill engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub instrument: InstrumentId,
    pub side: OrderSide,
    pub kind: OrderKind,
    /// Limit price (limit and stop-limit orders).
    pub limit_price: f64,
    /// Auxiliary (stop trigger) price (stop and stop-limit orders).
    pub aux_price: f64,
    pub quantity: f64,
    pub status: OrderStatus,
    /// One-cancels-all group this order belongs to.
    pub oca_group: Option<OcaGroupId>,
    /// Whether a fill of this order opens a position (entry) rather than
    /// closing one (protective exit).
    pub is_opening: bool,
    /// Held orders (`transmit == false`) are accepted but never fill.
    pub transmit: bool,
}

impl Order {
    fn base(id: OrderId, instrument: InstrumentId, side: OrderSide, kind: OrderKind, qty: f64) -> Self {
        Self {
            id,
            instrument,
            side,
            kind,
            limit_price: 0.0,
            aux_price: 0.0,
            quantity: qty,
            status: OrderStatus::Unsubmitted,
            oca_group: None,
            is_opening: false,
            transmit: true,
        }
    }

    pub fn market(id: OrderId, instrument: InstrumentId, side: OrderSide, qty: f64) -> Self {
        Self::base(id, instrument, side, OrderKind::Market, qty)
    }

    pub fn limit(
        id: OrderId,
        instrument: InstrumentId,
        side: OrderSide,
        qty: f64,
        limit_price: f64,
    ) -> Self {
        let mut order = Self::base(id, instrument, side, OrderKind::Limit, qty);
        order.limit_price = limit_price;
        order
    }

    pub fn stop(
        id: OrderId,
        instrument: InstrumentId,
        side: OrderSide,
        qty: f64,
        stop_price: f64,
    ) -> Self {
        let mut order = Self::base(id, instrument, side, OrderKind::Stop, qty);
        order.aux_price = stop_price;
        order
    }

    pub fn stop_limit(
        id: OrderId,
        instrument: InstrumentId,
        side: OrderSide,
        qty: f64,
        stop_price: f64,
        limit_price: f64,
    ) -> Self {
        let mut order = Self::base(id, instrument, side, OrderKind::StopLimit, qty);
        order.aux_price = stop_price;
        order.limit_price = limit_price;
        order
    }

    /// Mark as a position-opening (entry) order.
    pub fn opening(mut self) -> Self {
        self.is_opening = true;
        self
    }

    /// Attach to a one-cancels-all group.
    pub fn in_group(mut self, group: OcaGroupId) -> Self {
        self.oca_group = Some(group);
        self
    }

    /// Accept the order but hold it back from execution.
    pub fn held(mut self) -> Self {
        self.transmit = false;
        self
    }

    /// Price that defines this order's own fill level: the limit for limit
    /// and stop-limit orders, the stop for stops, none for market orders.
    pub fn order_price(&self) -> Option<f64> {
        match self.kind {
            OrderKind::Market => None,
            OrderKind::Limit | OrderKind::StopLimit => Some(self.limit_price),
            OrderKind::Stop => Some(self.aux_price),
        }
    }

    /// Still able to fill (Unsubmitted or Submitted).
    pub fn is_working(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Signed quantity: positive for buys.
    pub fn signed_quantity(&self) -> f64 {
        self.side.sign() * self.quantity
    }
}
