//! Backtest coordinator: replays historical bars for one instrument.
//!
//! Per bar:
//! 1. feed the bar into the series group (cascade, then notify strategies)
//! 2. wait until every running strategy has evaluated its rules
//! 3. run a fill pass against the bar just fed
//! 4. if a fill opened a position, notify and wait for protective orders,
//!    then run one more fill pass on the same bar
//! 5. if a fill closed a position, notify and wait; stop once no
//!    strategy is left running
//!
//! Every wait is bounded by a timeout and interrupted by cancellation, and
//! so is every send into a full strategy channel. A timeout or cancellation
//! ends the run normally with a `StopReason`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{SendTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::events::{OrderEvent, StrategyEvent};
use super::fill_engine::FillEngine;
use super::gateway::{BacktestGateway, OrderGateway};
use super::handshake::{CancelToken, Handshake, Stage, WaitOutcome};
use super::order_book::OrderBook;
use super::position_book::PositionBook;
use super::strategy::{spawn_strategy, Strategy, StrategyHandle};
use crate::config::{ConfigError, ReplayConfig, TimeoutConfig};
use crate::domain::{Bar, Fill, Instrument, OrderStatus, Position, PositionChange, RunId};
use crate::series::{
    BarSeries, BarUpdate, IngestOutcome, SeriesEvent, SeriesGroup, SeriesListener, SharedSeriesGroup,
};
use crate::store::{BarStore, OrderStatusRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    BarsExhausted,
    /// No strategy was registered.
    NoStrategies,
    /// Every strategy stopped and no position is open.
    StrategiesStopped,
    Cancelled,
    TimedOut(Stage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub run_id: RunId,
    pub instrument: Instrument,
    pub bars_fed: usize,
    pub fill_passes: usize,
    pub fills: Vec<Fill>,
    pub position: Position,
    pub stop_reason: StopReason,
}

/// Pause between cancellation checks while a strategy channel is full.
const SEND_SLICE: Duration = Duration::from_millis(25);

enum Delivery {
    Sent,
    Closed,
    Stalled,
    Cancelled,
}

/// Forwards series notifications to every strategy channel.
///
/// A full channel is retried until the stage timeout of the event runs out
/// or the run is cancelled. A strategy whose channel stays full is dropped
/// and the stage is recorded for the coordinator to report.
#[derive(Debug)]
struct StrategyFanout {
    senders: Mutex<Vec<Sender<StrategyEvent>>>,
    handshake: Arc<Handshake>,
    timeouts: TimeoutConfig,
    stalled: Mutex<Option<Stage>>,
}

impl StrategyFanout {
    fn new(handshake: Arc<Handshake>, timeouts: TimeoutConfig) -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
            handshake,
            timeouts,
            stalled: Mutex::new(None),
        }
    }

    fn add(&self, sender: Sender<StrategyEvent>) {
        self.senders.lock().push(sender);
    }

    /// Deliver to every strategy still listening; closed and stalled
    /// channels are dropped. Stops early once the run is cancelled.
    fn broadcast(&self, event: &StrategyEvent) {
        let stage = delivery_stage(event);
        let timeout = self.timeouts.for_stage(stage);
        let senders = self.senders.lock().clone();
        let mut dropped: Vec<&Sender<StrategyEvent>> = Vec::new();
        for sender in &senders {
            match self.deliver(sender, event.clone(), timeout) {
                Delivery::Sent => {}
                Delivery::Closed => dropped.push(sender),
                Delivery::Stalled => {
                    warn!(stage = ?stage, event = event.label(), "strategy channel stayed full, strategy dropped");
                    self.stalled.lock().get_or_insert(stage);
                    dropped.push(sender);
                }
                Delivery::Cancelled => break,
            }
        }
        if !dropped.is_empty() {
            self.senders
                .lock()
                .retain(|s| !dropped.iter().any(|d| d.same_channel(s)));
        }
    }

    fn deliver(&self, sender: &Sender<StrategyEvent>, mut event: StrategyEvent, timeout: Duration) -> Delivery {
        let deadline = Instant::now() + timeout;
        loop {
            if self.handshake.is_cancelled() {
                return Delivery::Cancelled;
            }
            let now = Instant::now();
            if now >= deadline {
                return Delivery::Stalled;
            }
            match sender.send_timeout(event, SEND_SLICE.min(deadline - now)) {
                Ok(()) => return Delivery::Sent,
                Err(SendTimeoutError::Disconnected(_)) => return Delivery::Closed,
                Err(SendTimeoutError::Timeout(back)) => event = back,
            }
        }
    }

    /// Stage of the first broadcast that dropped a stalled strategy.
    fn take_stalled(&self) -> Option<Stage> {
        self.stalled.lock().take()
    }

    fn close(&self) {
        self.senders.lock().clear();
    }
}

/// Stage whose timeout bounds delivery of `event`.
fn delivery_stage(event: &StrategyEvent) -> Stage {
    match event {
        StrategyEvent::PositionOpened(_) => Stage::PositionCovered,
        StrategyEvent::PositionClosed(_) => Stage::PositionClosed,
        _ => Stage::RuleComplete,
    }
}

impl SeriesListener for StrategyFanout {
    fn on_series_changed(&self, event: &SeriesEvent) {
        self.broadcast(&StrategyEvent::SeriesChanged(event.clone()));
    }
}

pub struct BacktestCoordinator {
    run_id: RunId,
    instrument: Instrument,
    group: SharedSeriesGroup,
    book: Arc<Mutex<OrderBook>>,
    gateway: Arc<BacktestGateway>,
    positions: PositionBook,
    fill_engine: FillEngine,
    handshake: Arc<Handshake>,
    fanout: Arc<StrategyFanout>,
    strategies: Vec<StrategyHandle>,
    store: Option<Arc<dyn BarStore>>,
    timeouts: TimeoutConfig,
    rollup_ratio: u32,
    channel_capacity: usize,
    bars_fed: usize,
    fill_passes: usize,
    fills: Vec<Fill>,
}

impl BacktestCoordinator {
    /// Build a coordinator with the configured indicators attached.
    pub fn new(config: &ReplayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let instrument = config.instrument();
        let mut group = SeriesGroup::new(
            instrument.id.to_string(),
            BarSeries::new(instrument.clone(), config.bar_size_secs),
        );
        group.attach_many(&config.indicators)?;

        let handshake = Handshake::new();
        let fanout = Arc::new(StrategyFanout::new(Arc::clone(&handshake), config.timeouts));
        group.subscribe(Arc::clone(&fanout) as Arc<dyn SeriesListener>);

        let book = Arc::new(Mutex::new(OrderBook::new()));
        let mut positions = PositionBook::new();
        positions.register(instrument.id.clone());

        Ok(Self {
            run_id: config.run_id()?,
            instrument,
            group: SharedSeriesGroup::new(group),
            gateway: Arc::new(BacktestGateway::new(Arc::clone(&book))),
            book,
            positions,
            fill_engine: FillEngine::new(config.commission),
            handshake,
            fanout,
            strategies: Vec::new(),
            store: None,
            timeouts: config.timeouts,
            rollup_ratio: config.rollup_ratio(),
            channel_capacity: config.channel_capacity,
            bars_fed: 0,
            fill_passes: 0,
            fills: Vec::new(),
        })
    }

    /// Persist fills, order statuses and final indicator series here.
    pub fn with_store(mut self, store: Arc<dyn BarStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn group(&self) -> &SharedSeriesGroup {
        &self.group
    }

    pub fn book(&self) -> &Arc<Mutex<OrderBook>> {
        &self.book
    }

    pub fn gateway(&self) -> Arc<dyn OrderGateway> {
        Arc::clone(&self.gateway) as Arc<dyn OrderGateway>
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.handshake.cancel_token()
    }

    /// Start `strategy` on its own thread.
    pub fn add_strategy(&mut self, strategy: Box<dyn Strategy>) -> std::io::Result<()> {
        let handle = spawn_strategy(
            strategy,
            self.group.clone(),
            self.gateway(),
            Arc::clone(&self.handshake),
            self.channel_capacity,
        )?;
        self.fanout.add(handle.sender().clone());
        self.strategies.push(handle);
        Ok(())
    }

    /// Replay `bars` (historical sub-bars, oldest first) and shut down.
    pub fn run(mut self, bars: &[Bar]) -> BacktestReport {
        info!(run = %self.run_id, instrument = %self.instrument.id, bars = bars.len(), "backtest started");
        let stop_reason = self.replay(bars);
        info!(
            run = %self.run_id,
            reason = ?stop_reason,
            bars_fed = self.bars_fed,
            fills = self.fills.len(),
            "backtest stopped"
        );
        self.shutdown();
        self.persist_series();

        let position = self
            .positions
            .get(&self.instrument.id)
            .cloned()
            .unwrap_or_else(|| Position::flat(self.instrument.id.clone()));
        BacktestReport {
            run_id: self.run_id,
            instrument: self.instrument,
            bars_fed: self.bars_fed,
            fill_passes: self.fill_passes,
            fills: self.fills,
            position,
            stop_reason,
        }
    }

    fn replay(&mut self, bars: &[Bar]) -> StopReason {
        if self.strategies.is_empty() {
            return StopReason::NoStrategies;
        }
        let started = self
            .handshake
            .wait_started(self.strategies.len(), self.timeouts.for_stage(Stage::Started));
        if let Err(reason) = self.settle(started, Stage::Started) {
            return reason;
        }

        for bar in bars {
            if self.handshake.is_cancelled() {
                return StopReason::Cancelled;
            }
            if self.handshake.running() == 0 && self.positions.is_flat(&self.instrument.id) {
                return StopReason::StrategiesStopped;
            }
            if let Err(reason) = self.step(bar) {
                return reason;
            }
        }
        StopReason::BarsExhausted
    }

    fn step(&mut self, bar: &Bar) -> Result<(), StopReason> {
        self.handshake.open_round();
        let outcome = self.group.feed(&BarUpdate::from(bar), self.rollup_ratio);
        self.bars_fed += 1;
        if outcome == IngestOutcome::Stale {
            return Ok(());
        }
        self.delivered()?;
        self.wait(Stage::RuleComplete)?;

        let first = self.fill_pass(bar);
        self.delivered()?;
        let mut closed = first.closed;
        if first.opened {
            if let Some(position) = self.current_position() {
                self.handshake.open_round();
                self.fanout.broadcast(&StrategyEvent::PositionOpened(position));
                self.delivered()?;
                self.wait(Stage::PositionCovered)?;
            }
            // Protective orders can fill on the bar that opened the position.
            let second = self.fill_pass(bar);
            self.delivered()?;
            closed = closed.or(second.closed);
        }

        if let Some(position) = closed {
            self.handshake.open_round();
            self.fanout.broadcast(&StrategyEvent::PositionClosed(position));
            self.delivered()?;
            self.wait(Stage::PositionClosed)?;
            if self.handshake.running() == 0 && self.positions.is_flat(&self.instrument.id) {
                return Err(StopReason::StrategiesStopped);
            }
        }
        Ok(())
    }

    /// Stop if the last broadcast was cut short by cancellation or a
    /// strategy that never drained its channel.
    fn delivered(&self) -> Result<(), StopReason> {
        if self.handshake.is_cancelled() {
            return Err(StopReason::Cancelled);
        }
        match self.fanout.take_stalled() {
            Some(stage) => {
                warn!(run = %self.run_id, stage = ?stage, "strategy stopped draining its events");
                Err(StopReason::TimedOut(stage))
            }
            None => Ok(()),
        }
    }

    fn wait(&self, stage: Stage) -> Result<(), StopReason> {
        let outcome = self.handshake.wait_acks(self.timeouts.for_stage(stage));
        self.settle(outcome, stage)
    }

    fn settle(&self, outcome: WaitOutcome, stage: Stage) -> Result<(), StopReason> {
        match outcome {
            WaitOutcome::Ready => Ok(()),
            WaitOutcome::Cancelled => Err(StopReason::Cancelled),
            WaitOutcome::TimedOut => {
                warn!(run = %self.run_id, stage = ?stage, "strategies did not respond in time");
                Err(StopReason::TimedOut(stage))
            }
        }
    }

    fn current_position(&self) -> Option<Position> {
        self.positions.get(&self.instrument.id).cloned()
    }

    fn fill_pass(&mut self, bar: &Bar) -> PassOutcome {
        let report = {
            let mut book = self.book.lock();
            self.fill_engine.evaluate(bar, &self.instrument.id, &mut book)
        };
        self.fill_passes += 1;

        let mut outcome = PassOutcome {
            opened: report.opened_position,
            closed: None,
        };
        for fill in &report.fills {
            match self.positions.apply_fill(fill) {
                Some(PositionChange::Opened) | Some(PositionChange::Reversed) => outcome.opened = true,
                Some(PositionChange::Closed) => {
                    outcome.closed = self.current_position();
                }
                _ => {}
            }
        }
        if outcome.opened && self.positions.is_flat(&self.instrument.id) {
            // Opened and closed again within the same pass.
            outcome.opened = false;
        }

        for event in &report.events {
            self.persist_event(event, bar);
            self.fanout.broadcast(&StrategyEvent::from(event.clone()));
        }
        self.fills.extend(report.fills);
        debug!(bar = %bar.start, pass = self.fill_passes, events = report.events.len(), "fill pass done");
        outcome
    }

    fn persist_event(&self, event: &OrderEvent, bar: &Bar) {
        let Some(store) = &self.store else {
            return;
        };
        let (order_id, status) = match event {
            OrderEvent::Submitted(id) => (*id, OrderStatus::Submitted),
            OrderEvent::Filled(fill) => {
                if let Err(err) = store.save_fill(fill) {
                    warn!(order = %fill.order_id, error = %err, "saving fill failed");
                }
                (fill.order_id, OrderStatus::Filled)
            }
            OrderEvent::Cancelled { order_id, reason } => (
                *order_id,
                OrderStatus::Cancelled {
                    reason: reason.clone(),
                },
            ),
        };
        let record = OrderStatusRecord {
            order_id,
            status,
            time: bar.start,
        };
        if let Err(err) = store.save_order_status(&record) {
            warn!(order = %order_id, error = %err, "saving order status failed");
        }
    }

    fn persist_series(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let group = self.group.read();
        for (_, series) in group.all_series() {
            if let Err(err) = store.save_series(&self.instrument.id, series.name(), series.points()) {
                warn!(series = series.name(), error = %err, "saving series failed");
            }
        }
    }

    fn shutdown(&mut self) {
        self.fanout.close();
        for handle in self.strategies.drain(..) {
            debug!(strategy = handle.name(), "joining strategy");
            handle.shutdown();
        }
    }
}

struct PassOutcome {
    opened: bool,
    /// Snapshot of the position right after it went flat.
    closed: Option<Position>,
}
