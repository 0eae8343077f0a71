use super::ids::InstrumentId;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Price band an instrument trades in.
///
/// Selects the default minimum excursion a pivot must show before it is
/// confirmed: cheap instruments move in smaller absolute steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    /// Below 5.00
    Penny,
    /// 5.00 to 20.00
    Low,
    /// 20.00 to 100.00
    Mid,
    /// 100.00 and above
    High,
}

impl PriceTier {
    pub fn for_price(price: f64) -> Self {
        if price < 5.0 {
            PriceTier::Penny
        } else if price < 20.0 {
            PriceTier::Low
        } else if price < 100.0 {
            PriceTier::Mid
        } else {
            PriceTier::High
        }
    }

    /// Minimum pivot excursion in price units.
    pub fn min_pivot_range(self) -> f64 {
        match self {
            PriceTier::Penny => 0.05,
            PriceTier::Low => 0.10,
            PriceTier::Mid => 0.25,
            PriceTier::High => 0.50,
        }
    }
}

/// Instrument metadata needed by the series and the fill engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub id: InstrumentId,
    /// Session open time-of-day (UTC); bar buckets are anchored here.
    pub session_open: NaiveTime,
    pub tier: PriceTier,
    pub tick_size: f64,
}

impl Instrument {
    pub fn new(id: impl Into<String>, session_open: NaiveTime, tier: PriceTier) -> Self {
        Self {
            id: InstrumentId::new(id),
            session_open,
            tier,
            tick_size: 0.01,
        }
    }

    /// US equity defaults: 14:30 UTC session open, mid tier.
    pub fn us_equity(id: impl Into<String>) -> Self {
        let open = NaiveTime::from_hms_opt(14, 30, 0).unwrap_or(NaiveTime::MIN);
        Self::new(id, open, PriceTier::Mid)
    }

    /// Round a price to the instrument's tick.
    pub fn round_to_tick(&self, price: f64) -> f64 {
        if self.tick_size <= 0.0 {
            return price;
        }
        (price / self.tick_size).round() * self.tick_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_bands() {
        assert_eq!(PriceTier::for_price(2.5), PriceTier::Penny);
        assert_eq!(PriceTier::for_price(5.0), PriceTier::Low);
        assert_eq!(PriceTier::for_price(55.0), PriceTier::Mid);
        assert_eq!(PriceTier::for_price(450.0), PriceTier::High);
    }

    #[test]
    fn higher_tiers_need_wider_pivots() {
        assert!(PriceTier::Penny.min_pivot_range() < PriceTier::High.min_pivot_range());
    }

    #[test]
    fn round_to_tick() {
        let inst = Instrument::us_equity("SPY");
        assert!((inst.round_to_tick(101.237) - 101.24).abs() < 1e-9);
    }

    #[test]
    fn tier_serializes_snake_case() {
        let json = serde_json::to_string(&PriceTier::Penny).unwrap();
        assert_eq!(json, "\"penny\"");
    }
}
