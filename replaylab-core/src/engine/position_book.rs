//! Signed position per instrument, folded from fills.

use std::collections::HashMap;

use tracing::warn;

use crate::domain::{Fill, InstrumentId, Position, PositionChange};

#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    positions: HashMap<InstrumentId, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an instrument (flat). Existing positions are kept.
    pub fn register(&mut self, instrument: InstrumentId) {
        self.positions
            .entry(instrument.clone())
            .or_insert_with(|| Position::flat(instrument));
    }

    pub fn get(&self, instrument: &InstrumentId) -> Option<&Position> {
        self.positions.get(instrument)
    }

    /// Flat or unknown.
    pub fn is_flat(&self, instrument: &InstrumentId) -> bool {
        self.positions.get(instrument).map_or(true, Position::is_flat)
    }

    /// Apply a fill. Fills for unknown instruments are logged and skipped.
    pub fn apply_fill(&mut self, fill: &Fill) -> Option<PositionChange> {
        match self.positions.get_mut(&fill.instrument) {
            Some(position) => Some(position.apply_fill(fill)),
            None => {
                warn!(
                    instrument = %fill.instrument,
                    order = %fill.order_id,
                    "fill for an untracked instrument skipped"
                );
                None
            }
        }
    }
}
