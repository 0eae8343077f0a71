//! Replay configuration, loaded from TOML.
//!
//! ```toml
//! bar_size_secs = 300
//! sub_bar_secs = 60
//!
//! [instrument]
//! symbol = "AAPL"
//! session_open = "14:30:00"
//! tier = "high"
//!
//! [[indicators]]
//! type = "moving_average"
//! average = "exponential"
//! length = 20
//! ```

use std::path::Path;
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Instrument, InstrumentId, PriceTier, RunId};
use crate::engine::{CommissionModel, Stage};
use crate::indicators::{IndicatorConfig, IndicatorError};
use crate::series::SeriesError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error(transparent)]
    Series(#[from] SeriesError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub symbol: String,
    #[serde(default = "default_session_open")]
    pub session_open: NaiveTime,
    #[serde(default = "default_tier")]
    pub tier: PriceTier,
    #[serde(default = "default_tick_size")]
    pub tick_size: f64,
}

fn default_session_open() -> NaiveTime {
    NaiveTime::from_hms_opt(14, 30, 0).unwrap_or(NaiveTime::MIN)
}

fn default_tier() -> PriceTier {
    PriceTier::Mid
}

fn default_tick_size() -> f64 {
    0.01
}

impl InstrumentConfig {
    pub fn to_instrument(&self) -> Instrument {
        let mut instrument = Instrument::new(self.symbol.clone(), self.session_open, self.tier);
        instrument.tick_size = self.tick_size;
        instrument
    }
}

/// Upper bounds on each coordinator wait, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub started_ms: u64,
    pub rule_complete_ms: u64,
    pub position_covered_ms: u64,
    pub position_closed_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            started_ms: 10_000,
            rule_complete_ms: 5_000,
            position_covered_ms: 5_000,
            position_closed_ms: 5_000,
        }
    }
}

impl TimeoutConfig {
    pub fn uniform(ms: u64) -> Self {
        Self {
            started_ms: ms,
            rule_complete_ms: ms,
            position_covered_ms: ms,
            position_closed_ms: ms,
        }
    }

    pub fn for_stage(&self, stage: Stage) -> Duration {
        let ms = match stage {
            Stage::Started => self.started_ms,
            Stage::RuleComplete => self.rule_complete_ms,
            Stage::PositionCovered => self.position_covered_ms,
            Stage::PositionClosed => self.position_closed_ms,
        };
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub instrument: InstrumentConfig,
    /// Size of the bars the indicators see.
    pub bar_size_secs: i64,
    /// Size of the historical bars fed in; defaults to `bar_size_secs`.
    #[serde(default)]
    pub sub_bar_secs: Option<i64>,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub commission: CommissionModel,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Capacity of each strategy's notification channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default)]
    pub indicators: Vec<IndicatorConfig>,
}

fn default_max_concurrent_requests() -> usize {
    4
}

fn default_channel_capacity() -> usize {
    64
}

impl ReplayConfig {
    /// Minimal config for one instrument with no indicators.
    pub fn new(symbol: impl Into<String>, bar_size_secs: i64) -> Self {
        Self {
            instrument: InstrumentConfig {
                symbol: symbol.into(),
                session_open: default_session_open(),
                tier: default_tier(),
                tick_size: default_tick_size(),
            },
            bar_size_secs,
            sub_bar_secs: None,
            timeouts: TimeoutConfig::default(),
            commission: CommissionModel::default(),
            max_concurrent_requests: default_max_concurrent_requests(),
            channel_capacity: default_channel_capacity(),
            indicators: Vec::new(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instrument.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("instrument symbol is empty".into()));
        }
        if self.bar_size_secs <= 0 {
            return Err(ConfigError::Invalid(format!(
                "bar_size_secs must be positive, got {}",
                self.bar_size_secs
            )));
        }
        let sub = self.sub_bar_secs();
        if sub <= 0 || sub > self.bar_size_secs || self.bar_size_secs % sub != 0 {
            return Err(ConfigError::Invalid(format!(
                "sub_bar_secs {sub} must divide bar_size_secs {}",
                self.bar_size_secs
            )));
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid("max_concurrent_requests must be at least 1".into()));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid("channel_capacity must be at least 1".into()));
        }
        if self.commission.per_unit < 0.0 || self.commission.minimum < 0.0 {
            return Err(ConfigError::Invalid("commission must not be negative".into()));
        }
        for indicator in &self.indicators {
            indicator.validate()?;
        }
        Ok(())
    }

    pub fn instrument(&self) -> Instrument {
        self.instrument.to_instrument()
    }

    pub fn instrument_id(&self) -> InstrumentId {
        InstrumentId::new(self.instrument.symbol.clone())
    }

    pub fn sub_bar_secs(&self) -> i64 {
        self.sub_bar_secs.unwrap_or(self.bar_size_secs)
    }

    /// Sub-bars per reported bar.
    pub fn rollup_ratio(&self) -> u32 {
        let sub = self.sub_bar_secs();
        if sub <= 0 {
            return 1;
        }
        u32::try_from(self.bar_size_secs / sub).unwrap_or(1).max(1)
    }

    /// Content hash of the canonical JSON of this config.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let value = serde_json::to_value(self)
            .map_err(|e| ConfigError::Invalid(format!("config is not serializable: {e}")))?;
        Ok(RunId::from_canonical(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::MovingAverageKind;

    const SAMPLE: &str = r#"
bar_size_secs = 300
sub_bar_secs = 60
max_concurrent_requests = 2

[instrument]
symbol = "AAPL"
session_open = "14:30:00"
tier = "high"

[timeouts]
rule_complete_ms = 250

[commission]
per_unit = 0.01
minimum = 2.0

[[indicators]]
type = "moving_average"
average = "exponential"
length = 20

[[indicators]]
type = "rsi"
length = 14
"#;

    #[test]
    fn parses_full_config() {
        let config = ReplayConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.instrument.tier, PriceTier::High);
        assert_eq!(config.rollup_ratio(), 5);
        assert_eq!(config.timeouts.rule_complete_ms, 250);
        assert_eq!(config.timeouts.started_ms, 10_000);
        assert_eq!(config.commission.minimum, 2.0);
        assert_eq!(config.channel_capacity, 64);
        assert_eq!(
            config.indicators[0],
            IndicatorConfig::MovingAverage {
                average: MovingAverageKind::Exponential,
                length: 20
            }
        );
        assert_eq!(config.instrument().id, InstrumentId::new("AAPL"));
    }

    #[test]
    fn defaults_fill_in() {
        let config = ReplayConfig::from_toml_str("bar_size_secs = 60\n[instrument]\nsymbol = \"ES\"\n").unwrap();
        assert_eq!(config.sub_bar_secs(), 60);
        assert_eq!(config.rollup_ratio(), 1);
        assert_eq!(config.instrument.tick_size, 0.01);
        assert!(config.indicators.is_empty());
    }

    #[test]
    fn sub_bar_must_divide_bar() {
        let mut config = ReplayConfig::new("ES", 300);
        config.sub_bar_secs = Some(70);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn bad_indicator_is_rejected() {
        let text = "bar_size_secs = 60\n[instrument]\nsymbol = \"ES\"\n[[indicators]]\ntype = \"rsi\"\nlength = 0\n";
        assert!(matches!(
            ReplayConfig::from_toml_str(text),
            Err(ConfigError::Indicator(_))
        ));
    }

    #[test]
    fn run_id_tracks_content() {
        let a = ReplayConfig::new("ES", 60);
        let mut b = a.clone();
        assert_eq!(a.run_id().unwrap(), b.run_id().unwrap());
        b.bar_size_secs = 300;
        assert_ne!(a.run_id().unwrap(), b.run_id().unwrap());
    }

    #[test]
    fn stage_timeouts() {
        let t = TimeoutConfig::uniform(42);
        assert_eq!(t.for_stage(Stage::PositionClosed), Duration::from_millis(42));
    }
}
