use super::fill::Fill;
use super::ids::InstrumentId;
use serde::{Deserialize, Serialize};

const QTY_EPSILON: f64 = 1e-9;

/// What a fill did to a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionChange {
    Opened,
    Increased,
    Reduced,
    Closed,
    /// Closed and re-opened on the other side in one fill.
    Reversed,
}

/// Position tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instrument: InstrumentId,
    /// Signed quantity: positive long, negative short.
    pub quantity: f64,
    pub avg_entry_price: f64,
    pub realized_pnl: f64,
}

impl Position {
    pub fn flat(instrument: InstrumentId) -> Self {
        Self {
            instrument,
            quantity: 0.0,
            avg_entry_price: 0.0,
            realized_pnl: 0.0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.abs() < QTY_EPSILON
    }

    pub fn is_long(&self) -> bool {
        self.quantity > QTY_EPSILON
    }

    pub fn is_short(&self) -> bool {
        self.quantity < -QTY_EPSILON
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.quantity * (current_price - self.avg_entry_price)
    }

    /// Fold a fill into the position. Commission is charged to realized PnL.
    pub fn apply_fill(&mut self, fill: &Fill) -> PositionChange {
        let delta = fill.signed_quantity();
        let before = self.quantity;
        self.realized_pnl -= fill.commission;

        if self.is_flat() {
            self.quantity = delta;
            self.avg_entry_price = fill.price;
            return PositionChange::Opened;
        }

        if before.signum() == delta.signum() {
            let total = before + delta;
            self.avg_entry_price =
                (self.avg_entry_price * before.abs() + fill.price * delta.abs()) / total.abs();
            self.quantity = total;
            return PositionChange::Increased;
        }

        let closed_qty = delta.abs().min(before.abs());
        self.realized_pnl += closed_qty * (fill.price - self.avg_entry_price) * before.signum();
        let after = before + delta;

        if after.abs() < QTY_EPSILON {
            self.quantity = 0.0;
            self.avg_entry_price = 0.0;
            PositionChange::Closed
        } else if after.signum() == before.signum() {
            self.quantity = after;
            PositionChange::Reduced
        } else {
            self.quantity = after;
            self.avg_entry_price = fill.price;
            PositionChange::Reversed
        }
    }
}
