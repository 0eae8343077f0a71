//! Strategy consumers and the thread that drives each one.
//!
//! A strategy reacts to bar notifications by placing orders through an
//! `OrderGateway`. It runs on its own thread and receives `StrategyEvent`s
//! over a bounded channel; after every event that needs one it acknowledges
//! through the shared `Handshake`, which releases the coordinator.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use tracing::{debug, info, warn};

use super::events::StrategyEvent;
use super::gateway::OrderGateway;
use super::handshake::Handshake;
use crate::domain::{Fill, InstrumentId, OrderId, Position};
use crate::series::{SeriesEvent, SeriesGroup, SharedSeriesGroup};

/// What a strategy wants the driver to do after a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyAction {
    Continue,
    Stop,
}

/// Everything a callback may read or act on.
pub struct StrategyContext<'a> {
    pub group: &'a SeriesGroup,
    pub gateway: &'a dyn OrderGateway,
    pub instrument: &'a InstrumentId,
}

pub trait Strategy: Send {
    fn name(&self) -> &str;

    fn on_start(&mut self, _ctx: &StrategyContext<'_>) {}

    /// Called after a bar has been added or revised and every indicator
    /// has been updated.
    fn on_bar(&mut self, ctx: &StrategyContext<'_>, event: &SeriesEvent) -> StrategyAction;

    fn on_order_submitted(&mut self, _ctx: &StrategyContext<'_>, _order: OrderId) {}

    fn on_order_filled(&mut self, _ctx: &StrategyContext<'_>, _fill: &Fill) {}

    fn on_order_cancelled(&mut self, _ctx: &StrategyContext<'_>, _order: OrderId, _reason: &str) {}

    /// A fill opened a position. Protective orders placed here are evaluated
    /// against the same bar.
    fn on_position_opened(&mut self, _ctx: &StrategyContext<'_>, _position: &Position) {}

    fn on_position_closed(&mut self, _ctx: &StrategyContext<'_>, _position: &Position) -> StrategyAction {
        StrategyAction::Continue
    }
}

/// Running strategy thread.
#[derive(Debug)]
pub struct StrategyHandle {
    name: String,
    sender: Sender<StrategyEvent>,
    join: JoinHandle<()>,
}

impl StrategyHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sender(&self) -> &Sender<StrategyEvent> {
        &self.sender
    }

    /// Close the channel and wait for the thread to exit.
    pub fn shutdown(self) {
        let Self { name, sender, join } = self;
        drop(sender);
        if join.join().is_err() {
            warn!(strategy = %name, "strategy thread panicked");
        }
    }
}

/// Spawn `strategy` on a named thread.
pub fn spawn_strategy(
    mut strategy: Box<dyn Strategy>,
    group: SharedSeriesGroup,
    gateway: Arc<dyn OrderGateway>,
    handshake: Arc<Handshake>,
    capacity: usize,
) -> std::io::Result<StrategyHandle> {
    let name = strategy.name().to_string();
    let (sender, receiver) = bounded::<StrategyEvent>(capacity.max(1));
    let instrument = group.read().bars().instrument().id.clone();

    let join = thread::Builder::new()
        .name(format!("strategy-{name}"))
        .spawn(move || {
            {
                let guard = group.read();
                let ctx = StrategyContext {
                    group: &guard,
                    gateway: gateway.as_ref(),
                    instrument: &instrument,
                };
                strategy.on_start(&ctx);
            }
            handshake.strategy_started();
            info!(strategy = strategy.name(), "strategy started");

            for event in receiver.iter() {
                let needs_ack = event.needs_ack();
                let action = {
                    let guard = group.read();
                    let ctx = StrategyContext {
                        group: &guard,
                        gateway: gateway.as_ref(),
                        instrument: &instrument,
                    };
                    dispatch(strategy.as_mut(), &ctx, &event)
                };
                if action == StrategyAction::Stop {
                    debug!(strategy = strategy.name(), event = event.label(), "strategy requested stop");
                    break;
                }
                if needs_ack {
                    handshake.ack();
                }
            }

            handshake.strategy_stopped();
            info!(strategy = strategy.name(), "strategy stopped");
        })?;

    Ok(StrategyHandle { name, sender, join })
}

fn dispatch(strategy: &mut dyn Strategy, ctx: &StrategyContext<'_>, event: &StrategyEvent) -> StrategyAction {
    match event {
        StrategyEvent::SeriesChanged(series_event) => strategy.on_bar(ctx, series_event),
        StrategyEvent::OrderSubmitted(id) => {
            strategy.on_order_submitted(ctx, *id);
            StrategyAction::Continue
        }
        StrategyEvent::OrderFilled(fill) => {
            strategy.on_order_filled(ctx, fill);
            StrategyAction::Continue
        }
        StrategyEvent::OrderCancelled { order_id, reason } => {
            strategy.on_order_cancelled(ctx, *order_id, reason);
            StrategyAction::Continue
        }
        StrategyEvent::PositionOpened(position) => {
            strategy.on_position_opened(ctx, position);
            StrategyAction::Continue
        }
        StrategyEvent::PositionClosed(position) => strategy.on_position_closed(ctx, position),
    }
}
