//! Notifications delivered to strategies.
//!
//! The backtest fill engine and a live gateway emit the same shapes, so
//! strategy code does not know which one is active.

use serde::{Deserialize, Serialize};

use crate::domain::{Fill, OrderId, Position};
use crate::series::{SeriesChange, SeriesEvent};

/// Order status change produced by a fill pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderEvent {
    Submitted(OrderId),
    Filled(Fill),
    Cancelled { order_id: OrderId, reason: String },
}

/// Everything a strategy task can be told.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyEvent {
    SeriesChanged(SeriesEvent),
    OrderSubmitted(OrderId),
    OrderFilled(Fill),
    OrderCancelled { order_id: OrderId, reason: String },
    PositionOpened(Position),
    PositionClosed(Position),
}

impl From<OrderEvent> for StrategyEvent {
    fn from(event: OrderEvent) -> Self {
        match event {
            OrderEvent::Submitted(id) => StrategyEvent::OrderSubmitted(id),
            OrderEvent::Filled(fill) => StrategyEvent::OrderFilled(fill),
            OrderEvent::Cancelled { order_id, reason } => {
                StrategyEvent::OrderCancelled { order_id, reason }
            }
        }
    }
}

impl StrategyEvent {
    /// Whether the coordinator waits for an acknowledgement after sending it.
    pub fn needs_ack(&self) -> bool {
        matches!(
            self,
            StrategyEvent::SeriesChanged(_)
                | StrategyEvent::PositionOpened(_)
                | StrategyEvent::PositionClosed(_)
        )
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            StrategyEvent::SeriesChanged(SeriesEvent {
                change: SeriesChange::BarAdded,
                ..
            }) => "bar_added",
            StrategyEvent::SeriesChanged(_) => "bar_updated",
            StrategyEvent::OrderSubmitted(_) => "order_submitted",
            StrategyEvent::OrderFilled(_) => "order_filled",
            StrategyEvent::OrderCancelled { .. } => "order_cancelled",
            StrategyEvent::PositionOpened(_) => "position_opened",
            StrategyEvent::PositionClosed(_) => "position_closed",
        }
    }
}
