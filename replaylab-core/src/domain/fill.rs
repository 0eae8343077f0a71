use crate::domain::ids::{FillId, InstrumentId, OrderId};
use crate::domain::order::OrderSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fill record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub id: FillId,
    pub order_id: OrderId,
    pub instrument: InstrumentId,
    /// Start time of the bar the fill was simulated against.
    pub bar_time: DateTime<Utc>,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: f64,
    pub commission: f64,
    pub is_opening: bool,
}

impl Fill {
    /// Signed quantity: positive for buys.
    pub fn signed_quantity(&self) -> f64 {
        self.side.sign() * self.quantity
    }
}
