//! Domain types for ReplayLab

pub mod bar;
pub mod fill;
pub mod ids;
pub mod instrument;
pub mod order;
pub mod position;

pub use bar::Bar;
pub use fill::Fill;
pub use ids::{FillId, InstrumentId, OcaGroupId, OrderId, RequestId, RunId};
pub use instrument::{Instrument, PriceTier};
pub use order::{Order, OrderKind, OrderSide, OrderStatus};
pub use position::{Position, PositionChange};
