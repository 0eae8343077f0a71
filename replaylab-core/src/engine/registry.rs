//! In-flight data request registry.
//!
//! Historical-data loads are throttled: callers register a request before
//! issuing it and complete it when the data arrives. Completion wakes every
//! thread waiting for the registry to drain or to fall below a limit.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::domain::{InstrumentId, RequestId};

#[derive(Debug, Default)]
struct Inner {
    in_flight: BTreeMap<RequestId, InstrumentId>,
    next_id: u64,
}

impl Inner {
    fn insert(&mut self, instrument: InstrumentId) -> RequestId {
        self.next_id += 1;
        let id = RequestId(self.next_id);
        debug!(request = %id, instrument = %instrument, "request registered");
        self.in_flight.insert(id, instrument);
        id
    }
}

#[derive(Debug, Default)]
pub struct RequestRegistry {
    inner: Mutex<Inner>,
    cond: Condvar,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, instrument: InstrumentId) -> RequestId {
        self.inner.lock().insert(instrument)
    }

    /// Wait for room below `limit`, then register. `None` on timeout.
    pub fn acquire(&self, instrument: InstrumentId, limit: usize, timeout: Duration) -> Option<RequestId> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while inner.in_flight.len() >= limit {
            if self.cond.wait_until(&mut inner, deadline).timed_out() && inner.in_flight.len() >= limit {
                return None;
            }
        }
        Some(inner.insert(instrument))
    }

    /// Remove a request. Returns its instrument, or `None` if it was unknown.
    pub fn complete(&self, id: RequestId) -> Option<InstrumentId> {
        let mut inner = self.inner.lock();
        let removed = inner.in_flight.remove(&id);
        if removed.is_some() {
            self.cond.notify_all();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the in-flight requests in id order.
    pub fn in_flight(&self) -> Vec<(RequestId, InstrumentId)> {
        self.inner
            .lock()
            .in_flight
            .iter()
            .map(|(id, instrument)| (*id, instrument.clone()))
            .collect()
    }

    /// Block until nothing is in flight. Returns false on timeout.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        self.wait_below(1, timeout)
    }

    /// Block until fewer than `limit` requests are in flight. Returns false on timeout.
    pub fn wait_below(&self, limit: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while inner.in_flight.len() >= limit {
            if self.cond.wait_until(&mut inner, deadline).timed_out() {
                return inner.in_flight.len() < limit;
            }
        }
        true
    }
}
