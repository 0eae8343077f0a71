//! Fixed-capacity rolling window of doubles with running sums.
//!
//! Every windowed indicator keeps one or more of these. The two mutation
//! paths mirror the indicator update contract: `push` appends a new bar's
//! value and evicts the oldest once full, `replace_newest` revises the value
//! of the in-progress bar without touching the rest of the window.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    values: VecDeque<f64>,
    sum: f64,
    sum_sq: f64,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity + 1),
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    /// Append the newest value; returns the evicted oldest value once full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.values.push_back(value);
        self.sum += value;
        self.sum_sq += value * value;
        if self.values.len() > self.capacity {
            let evicted = self.values.pop_front()?;
            self.sum -= evicted;
            self.sum_sq -= evicted * evicted;
            Some(evicted)
        } else {
            None
        }
    }

    /// Overwrite the newest value in place; pushes when the window is empty.
    /// Returns the value that was replaced.
    pub fn replace_newest(&mut self, value: f64) -> Option<f64> {
        match self.values.back_mut() {
            Some(newest) => {
                let old = *newest;
                *newest = value;
                self.sum += value - old;
                self.sum_sq += value * value - old * old;
                Some(old)
            }
            None => {
                self.push(value);
                None
            }
        }
    }

    /// `push` for a new bar, `replace_newest` for a revision.
    pub fn update(&mut self, value: f64, is_new_bar: bool) {
        if is_new_bar {
            self.push(value);
        } else {
            self.replace_newest(value);
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum / self.values.len() as f64
        }
    }

    /// Sample variance (N-1 divisor); 0 with fewer than two values.
    pub fn sample_variance(&self) -> f64 {
        let n = self.values.len();
        if n < 2 {
            return 0.0;
        }
        let n_f = n as f64;
        let var = (self.sum_sq - self.sum * self.sum / n_f) / (n_f - 1.0);
        var.max(0.0)
    }

    pub fn newest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn oldest(&self) -> Option<f64> {
        self.values.front().copied()
    }

    /// Values from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    pub fn min(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::min)
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.sum = 0.0;
        self.sum_sq = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_evicts_oldest_when_full() {
        let mut w = RollingWindow::new(3);
        assert_eq!(w.push(1.0), None);
        assert_eq!(w.push(2.0), None);
        assert_eq!(w.push(3.0), None);
        assert!(w.is_full());
        assert_eq!(w.push(4.0), Some(1.0));
        assert_eq!(w.sum(), 9.0);
        assert_eq!(w.oldest(), Some(2.0));
        assert_eq!(w.newest(), Some(4.0));
    }

    #[test]
    fn replace_newest_keeps_length() {
        let mut w = RollingWindow::new(3);
        w.push(1.0);
        w.push(2.0);
        assert_eq!(w.replace_newest(5.0), Some(2.0));
        assert_eq!(w.len(), 2);
        assert_eq!(w.sum(), 6.0);
    }

    #[test]
    fn replace_on_empty_pushes() {
        let mut w = RollingWindow::new(2);
        assert_eq!(w.replace_newest(7.0), None);
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn sample_variance_matches_direct() {
        let mut w = RollingWindow::new(4);
        for v in [2.0, 4.0, 4.0, 5.0] {
            w.push(v);
        }
        // mean 3.75, squared deviations 3.0625 + 0.0625 + 0.0625 + 1.5625 = 4.75
        assert!((w.sample_variance() - 4.75 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn min_max_and_clear() {
        let mut w = RollingWindow::new(3);
        for v in [3.0, 1.0, 2.0] {
            w.push(v);
        }
        assert_eq!(w.max(), Some(3.0));
        assert_eq!(w.min(), Some(1.0));
        w.clear();
        assert!(w.is_empty());
        assert_eq!(w.sum(), 0.0);
        assert_eq!(w.max(), None);
    }

    #[test]
    fn zero_capacity_is_one() {
        let mut w = RollingWindow::new(0);
        w.push(1.0);
        assert_eq!(w.push(2.0), Some(1.0));
        assert_eq!(w.capacity(), 1);
    }
}
