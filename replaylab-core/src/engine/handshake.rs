//! Rendezvous between a coordinator and its strategy threads.
//!
//! The coordinator opens a round before it notifies strategies, then waits
//! until every running strategy has acknowledged (or stopped). Strategies
//! register on start and deregister on exit, so a stopped strategy never
//! holds a round open. Every wait re-checks the cancellation flag on wake.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Suspension points of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Started,
    RuleComplete,
    PositionCovered,
    PositionClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Default)]
struct State {
    /// Strategies that have started and not yet stopped.
    running: usize,
    /// Strategies that have ever started.
    started: usize,
    acks: usize,
    round: u64,
    cancelled: bool,
}

#[derive(Debug, Default)]
pub struct Handshake {
    state: Mutex<State>,
    cond: Condvar,
}

impl Handshake {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn strategy_started(&self) {
        let mut state = self.state.lock();
        state.running += 1;
        state.started += 1;
        self.cond.notify_all();
    }

    pub fn strategy_stopped(&self) {
        let mut state = self.state.lock();
        state.running = state.running.saturating_sub(1);
        self.cond.notify_all();
    }

    pub fn running(&self) -> usize {
        self.state.lock().running
    }

    /// Reset the acknowledgement count. Returns the new round number.
    pub fn open_round(&self) -> u64 {
        let mut state = self.state.lock();
        state.acks = 0;
        state.round += 1;
        state.round
    }

    pub fn ack(&self) {
        let mut state = self.state.lock();
        state.acks += 1;
        self.cond.notify_all();
    }

    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        self.cond.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    pub fn cancel_token(self: &Arc<Self>) -> CancelToken {
        CancelToken(Arc::clone(self))
    }

    /// Block until `expected` strategies (at least one) have started.
    pub fn wait_started(&self, expected: usize, timeout: Duration) -> WaitOutcome {
        let expected = expected.max(1);
        self.wait_until(timeout, |s| s.started >= expected)
    }

    /// Block until every running strategy has acknowledged the current round.
    pub fn wait_acks(&self, timeout: Duration) -> WaitOutcome {
        self.wait_until(timeout, |s| s.acks >= s.running)
    }

    fn wait_until(&self, timeout: Duration, ready: impl Fn(&State) -> bool) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.cancelled {
                return WaitOutcome::Cancelled;
            }
            if ready(&state) {
                return WaitOutcome::Ready;
            }
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                // One last look: the notifier may have raced the deadline.
                if state.cancelled {
                    return WaitOutcome::Cancelled;
                }
                if ready(&state) {
                    return WaitOutcome::Ready;
                }
                debug!(round = state.round, acks = state.acks, running = state.running, "wait timed out");
                return WaitOutcome::TimedOut;
            }
        }
    }
}

/// Cloneable handle that can cancel a run from any thread.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<Handshake>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}
