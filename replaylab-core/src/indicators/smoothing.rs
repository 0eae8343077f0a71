//! Smoothing primitives shared by several indicator kinds.
//!
//! `RecursiveAverage` covers both the EMA recursion (alpha = 2/(N+1)) and
//! Wilder's recursion (alpha = 1/N). It is seeded with the simple mean of the
//! first N samples and keeps the value as of the previous sample so that the
//! newest sample can be revised without replaying history.

use super::config::Smoothing;
use crate::series::RollingWindow;

#[derive(Debug, Clone)]
pub struct RecursiveAverage {
    length: usize,
    alpha: f64,
    seed: RollingWindow,
    /// Average as of the sample before the newest one.
    prev: Option<f64>,
    /// Average including the newest sample.
    current: Option<f64>,
}

impl RecursiveAverage {
    /// EMA weighting, alpha = 2 / (N + 1).
    pub fn exponential(length: usize) -> Self {
        let length = length.max(1);
        Self::with_alpha(length, 2.0 / (length as f64 + 1.0))
    }

    /// Wilder weighting, alpha = 1 / N.
    pub fn wilder(length: usize) -> Self {
        let length = length.max(1);
        Self::with_alpha(length, 1.0 / length as f64)
    }

    fn with_alpha(length: usize, alpha: f64) -> Self {
        Self {
            length,
            alpha,
            seed: RollingWindow::new(length),
            prev: None,
            current: None,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn value(&self) -> Option<f64> {
        self.current
    }

    /// Fold in one sample; `is_new = false` replaces the newest sample.
    pub fn update(&mut self, x: f64, is_new: bool) -> Option<f64> {
        if is_new {
            self.prev = self.current;
        }
        self.current = match self.prev {
            Some(p) => Some(p + self.alpha * (x - p)),
            None => {
                self.seed.update(x, is_new);
                if self.seed.is_full() {
                    Some(self.seed.mean())
                } else {
                    None
                }
            }
        };
        self.current
    }

    pub fn reset(&mut self) {
        self.seed.clear();
        self.prev = None;
        self.current = None;
    }
}

/// Simple or exponential smoothing of a derived line (MACD signal, %D).
#[derive(Debug, Clone)]
pub enum Smoother {
    Simple(RollingWindow),
    Exponential(RecursiveAverage),
}

impl Smoother {
    pub fn new(smoothing: Smoothing, length: usize) -> Self {
        match smoothing {
            Smoothing::Simple => Smoother::Simple(RollingWindow::new(length)),
            Smoothing::Exponential => Smoother::Exponential(RecursiveAverage::exponential(length)),
        }
    }

    pub fn update(&mut self, x: f64, is_new: bool) -> Option<f64> {
        match self {
            Smoother::Simple(window) => {
                window.update(x, is_new);
                window.is_full().then(|| window.mean())
            }
            Smoother::Exponential(avg) => avg.update(x, is_new),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Smoother::Simple(window) => window.clear(),
            Smoother::Exponential(avg) => avg.reset(),
        }
    }
}
