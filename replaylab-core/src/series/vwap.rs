//! Rolling VWAP over the last `rollup_ratio` sub-bar updates.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct VwapWindow {
    ratio: u32,
    /// (volume, volume * price), newest at the front.
    entries: VecDeque<(f64, f64)>,
    sum_volume: f64,
    sum_pv: f64,
}

impl VwapWindow {
    pub fn new(ratio: u32) -> Self {
        Self {
            ratio: ratio.max(1),
            entries: VecDeque::new(),
            sum_volume: 0.0,
            sum_pv: 0.0,
        }
    }

    /// Current window length.
    pub fn ratio(&self) -> u32 {
        self.ratio
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold in one update. A ratio different from the current one resets
    /// the window before the update is applied.
    pub fn observe(&mut self, volume: u64, price: f64, ratio: u32) {
        let ratio = ratio.max(1);
        if ratio != self.ratio {
            self.reset(ratio);
        }
        let volume = volume as f64;
        let pv = volume * price;
        self.entries.push_front((volume, pv));
        self.sum_volume += volume;
        self.sum_pv += pv;
        while self.entries.len() > self.ratio as usize {
            if let Some((old_volume, old_pv)) = self.entries.pop_back() {
                self.sum_volume -= old_volume;
                self.sum_pv -= old_pv;
            }
        }
    }

    /// Σ(volume × price) / Σvolume, or 0 while no volume has been seen.
    pub fn vwap(&self) -> f64 {
        if self.sum_volume > 0.0 {
            self.sum_pv / self.sum_volume
        } else {
            0.0
        }
    }

    pub fn reset(&mut self, ratio: u32) {
        self.ratio = ratio.max(1);
        self.entries.clear();
        self.sum_volume = 0.0;
        self.sum_pv = 0.0;
    }
}
