//! Multi-instrument batch runs: one coordinator thread per instrument.
//!
//! Bar loads go through the shared `RequestRegistry`, which caps how many
//! are in flight at once. A `BatchCanceller` stops every run, including
//! ones that have not started yet.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, warn};

use super::coordinator::{BacktestCoordinator, BacktestReport};
use super::handshake::CancelToken;
use super::registry::RequestRegistry;
use super::strategy::Strategy;
use crate::config::{ConfigError, ReplayConfig};
use crate::store::{BarStore, StoreError};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("spawn thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("too many requests in flight for {0}")]
    Throttled(String),

    #[error("batch cancelled before {0} started")]
    Cancelled(String),

    #[error("replay thread for {0} panicked")]
    Panicked(String),
}

/// One instrument to replay.
pub struct BatchJob {
    pub config: ReplayConfig,
    pub range: Range<DateTime<Utc>>,
    pub strategies: Vec<Box<dyn Strategy>>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    tokens: Mutex<Vec<CancelToken>>,
}

#[derive(Debug, Clone)]
pub struct BatchCanceller(Arc<CancelState>);

impl BatchCanceller {
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        for token in self.0.tokens.lock().iter() {
            token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Track a run; it is cancelled at once if the batch already was.
    fn track(&self, token: CancelToken) {
        let mut tokens = self.0.tokens.lock();
        if self.is_cancelled() {
            token.cancel();
        }
        tokens.push(token);
    }
}

pub struct BatchRunner {
    store: Arc<dyn BarStore>,
    registry: Arc<RequestRegistry>,
    cancel: BatchCanceller,
    load_timeout: Duration,
}

impl BatchRunner {
    pub fn new(store: Arc<dyn BarStore>) -> Self {
        Self {
            store,
            registry: Arc::new(RequestRegistry::new()),
            cancel: BatchCanceller(Arc::new(CancelState::default())),
            load_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<RequestRegistry> {
        &self.registry
    }

    pub fn canceller(&self) -> BatchCanceller {
        self.cancel.clone()
    }

    /// Run every job on its own thread; results come back in job order.
    pub fn run(&self, jobs: Vec<BatchJob>) -> Vec<Result<BacktestReport, BatchError>> {
        info!(jobs = jobs.len(), "batch started");
        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            let symbol = job.config.instrument.symbol.clone();
            let store = Arc::clone(&self.store);
            let registry = Arc::clone(&self.registry);
            let cancel = self.cancel.clone();
            let load_timeout = self.load_timeout;
            let spawned = thread::Builder::new()
                .name(format!("replay-{symbol}"))
                .spawn(move || run_job(job, store.as_ref(), &registry, &cancel, load_timeout));
            handles.push((symbol, spawned));
        }

        handles
            .into_iter()
            .map(|(symbol, spawned)| match spawned {
                Err(err) => Err(BatchError::Spawn(err)),
                Ok(handle) => handle.join().unwrap_or_else(|_| {
                    warn!(instrument = %symbol, "replay thread panicked");
                    Err(BatchError::Panicked(symbol))
                }),
            })
            .collect()
    }
}

fn run_job(
    job: BatchJob,
    store: &dyn BarStore,
    registry: &RequestRegistry,
    cancel: &BatchCanceller,
    load_timeout: Duration,
) -> Result<BacktestReport, BatchError> {
    let BatchJob {
        config,
        range,
        strategies,
    } = job;
    let symbol = config.instrument.symbol.clone();
    let instrument = config.instrument();

    let Some(request) = registry.acquire(instrument.id.clone(), config.max_concurrent_requests, load_timeout)
    else {
        return Err(BatchError::Throttled(symbol));
    };
    let loaded = store.load_bars(&instrument, range, config.sub_bar_secs());
    registry.complete(request);
    let bars = loaded?;

    if cancel.is_cancelled() {
        return Err(BatchError::Cancelled(symbol));
    }
    let mut coordinator = BacktestCoordinator::new(&config)?;
    for strategy in strategies {
        coordinator.add_strategy(strategy)?;
    }
    cancel.track(coordinator.cancel_token());
    Ok(coordinator.run(&bars))
}
