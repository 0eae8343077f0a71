//! Backtest engine: order book, fill engine and the replay coordinator.
//!
//! A coordinator replays historical bars for one instrument. For each bar it
//! runs the series cascade, lets every strategy thread evaluate its rules,
//! then simulates fills against the bar:
//!
//! 1. Feed: bar series and indicators are updated, strategies notified
//! 2. Rules: strategies place orders through an `OrderGateway`
//! 3. Fills: working orders are evaluated against the bar (OCA aware)
//! 4. Cover: a newly opened position gets its protective orders, which are
//!    evaluated against the same bar

pub mod batch;
pub mod commission;
pub mod coordinator;
pub mod events;
pub mod fill_engine;
pub mod gateway;
pub mod handshake;
pub mod order_book;
pub mod position_book;
pub mod registry;
pub mod scripted;
pub mod strategy;

pub use batch::{BatchCanceller, BatchError, BatchJob, BatchRunner};
pub use commission::CommissionModel;
pub use coordinator::{BacktestCoordinator, BacktestReport, StopReason};
pub use events::{OrderEvent, StrategyEvent};
pub use fill_engine::{candidate_price, FillEngine, FillReport};
pub use gateway::{BacktestGateway, GatewayError, OrderGateway};
pub use handshake::{CancelToken, Handshake, Stage, WaitOutcome};
pub use order_book::{OrderAuditEntry, OrderBook, OrderBookError, OCA_GROUP_FILLED, OCA_SIBLING_FILLED};
pub use position_book::PositionBook;
pub use registry::RequestRegistry;
pub use scripted::{EntryOrder, OrderPlan, PlannedEntry, ScriptedStrategy};
pub use strategy::{spawn_strategy, Strategy, StrategyAction, StrategyContext, StrategyHandle};
