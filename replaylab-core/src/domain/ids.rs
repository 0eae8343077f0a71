use serde::{Deserialize, Serialize};
use std::fmt;

/// Instrument identity (symbol).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentId(pub String);

impl InstrumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One-cancels-all group id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OcaGroupId(pub u64);

impl fmt::Display for OcaGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oca-{}", self.0)
    }
}

/// Fill id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FillId(pub u64);

/// Handle to a historical-data/backtest request in the request registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Deterministic backtest run id (BLAKE3 of the canonical run description).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    /// Hash a canonical JSON value into a run id.
    pub fn from_canonical(value: &serde_json::Value) -> Self {
        let hash_bytes = blake3::hash(value.to_string().as_bytes());
        Self(hash_bytes.to_hex().to_string())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_id_deterministic() {
        let a = RunId::from_canonical(&json!({"instrument": "ES", "bar_size": 60}));
        let b = RunId::from_canonical(&json!({"instrument": "ES", "bar_size": 60}));
        assert_eq!(a, b);
    }

    #[test]
    fn run_id_differs_with_input() {
        let a = RunId::from_canonical(&json!({"instrument": "ES", "bar_size": 60}));
        let b = RunId::from_canonical(&json!({"instrument": "ES", "bar_size": 300}));
        assert_ne!(a, b);
    }

    #[test]
    fn ids_display() {
        assert_eq!(OrderId(7).to_string(), "#7");
        assert_eq!(OcaGroupId(3).to_string(), "oca-3");
        assert_eq!(InstrumentId::new("ES").to_string(), "ES");
    }
}
