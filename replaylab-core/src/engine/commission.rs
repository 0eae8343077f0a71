//! Synthetic commission: a flat rate per unit, floored at a minimum ticket.
//!
//! This is a simulation approximation, not a brokerage fee schedule.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionModel {
    /// Charged per unit of quantity.
    pub per_unit: f64,
    /// Floor applied to every fill.
    pub minimum: f64,
}

impl Default for CommissionModel {
    fn default() -> Self {
        Self {
            per_unit: 0.005,
            minimum: 1.0,
        }
    }
}

impl CommissionModel {
    pub fn new(per_unit: f64, minimum: f64) -> Self {
        Self { per_unit, minimum }
    }

    pub fn free() -> Self {
        Self::new(0.0, 0.0)
    }

    /// max(quantity × per_unit, minimum)
    pub fn commission(&self, quantity: f64) -> f64 {
        (quantity.abs() * self.per_unit).max(self.minimum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_orders_pay_the_minimum() {
        let model = CommissionModel::default();
        assert_eq!(model.commission(100.0), 1.0);
    }

    #[test]
    fn large_orders_pay_per_unit() {
        let model = CommissionModel::new(0.005, 1.0);
        assert!((model.commission(1000.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn free_is_zero() {
        assert_eq!(CommissionModel::free().commission(1e6), 0.0);
    }
}
