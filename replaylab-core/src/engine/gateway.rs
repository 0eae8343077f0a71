//! Order gateway: the seam strategies place and cancel orders through.
//!
//! A live broker adapter and the backtest both implement `OrderGateway`.
//! The backtest version writes straight into the shared `OrderBook`; the
//! fill engine picks new orders up on its next pass.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use super::order_book::{OrderBook, OrderBookError};
use crate::domain::{OcaGroupId, Order, OrderId};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error(transparent)]
    Book(#[from] OrderBookError),

    #[error("gateway is closed")]
    Closed,
}

pub trait OrderGateway: Send + Sync {
    fn next_order_id(&self) -> OrderId;
    fn next_group_id(&self) -> OcaGroupId;
    fn place_order(&self, order: Order) -> Result<OrderId, GatewayError>;
    fn cancel_order(&self, id: OrderId, reason: &str) -> Result<(), GatewayError>;
}

/// Gateway over the coordinator's in-memory order book.
#[derive(Debug, Clone, Default)]
pub struct BacktestGateway {
    book: Arc<Mutex<OrderBook>>,
}

impl BacktestGateway {
    pub fn new(book: Arc<Mutex<OrderBook>>) -> Self {
        Self { book }
    }

    pub fn book(&self) -> &Arc<Mutex<OrderBook>> {
        &self.book
    }
}

impl OrderGateway for BacktestGateway {
    fn next_order_id(&self) -> OrderId {
        self.book.lock().next_order_id()
    }

    fn next_group_id(&self) -> OcaGroupId {
        self.book.lock().next_group_id()
    }

    fn place_order(&self, order: Order) -> Result<OrderId, GatewayError> {
        debug!(order = %order.id, kind = ?order.kind, side = ?order.side, "order placed");
        Ok(self.book.lock().submit(order)?)
    }

    fn cancel_order(&self, id: OrderId, reason: &str) -> Result<(), GatewayError> {
        Ok(self.book.lock().cancel(id, reason, None)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InstrumentId, OrderSide, OrderStatus};

    #[test]
    fn orders_land_in_the_shared_book() {
        let gateway = BacktestGateway::default();
        let id = gateway.next_order_id();
        gateway
            .place_order(Order::market(id, InstrumentId::new("ES"), OrderSide::Buy, 1.0))
            .unwrap();
        assert_eq!(gateway.book().lock().get(id).unwrap().status, OrderStatus::Unsubmitted);

        gateway.cancel_order(id, "changed my mind").unwrap();
        assert!(!gateway.book().lock().get(id).unwrap().is_working());
    }

    #[test]
    fn book_errors_are_wrapped() {
        let gateway = BacktestGateway::default();
        assert_eq!(
            gateway.cancel_order(OrderId(9), "x"),
            Err(GatewayError::Book(OrderBookError::OrderNotFound(OrderId(9))))
        );
    }
}
