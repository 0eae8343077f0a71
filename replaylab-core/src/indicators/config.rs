//! Indicator configuration: serde-tagged parameters for each kind.

use serde::{Deserialize, Serialize};

use super::series::IndicatorState;
use super::{
    Atr, Bollinger, Cci, HeikinAshi, IndicatorError, Macd, MoneyFlow, MovingAverage, Oscillator,
    Pivot, Rsi, Stochastic,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovingAverageKind {
    Simple,
    Exponential,
    Weighted,
    VolumeWeighted,
}

impl MovingAverageKind {
    fn short_name(self) -> &'static str {
        match self {
            MovingAverageKind::Simple => "sma",
            MovingAverageKind::Exponential => "ema",
            MovingAverageKind::Weighted => "wma",
            MovingAverageKind::VolumeWeighted => "vwma",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Smoothing {
    Simple,
    #[default]
    Exponential,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotBias {
    Highs,
    Lows,
    #[default]
    Both,
}

/// Parameters for one indicator series.
///
/// In TOML: `{ type = "rsi", length = 14 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndicatorConfig {
    MovingAverage {
        average: MovingAverageKind,
        length: usize,
    },
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
        #[serde(default)]
        signal_smoothing: Smoothing,
    },
    Rsi {
        length: usize,
    },
    Atr {
        length: usize,
    },
    Bollinger {
        length: usize,
        multiplier: f64,
    },
    Cci {
        length: usize,
    },
    MoneyFlow {
        length: usize,
    },
    Stochastic {
        length: usize,
        smoothing: usize,
    },
    HeikinAshi,
    Pivot {
        window: usize,
        #[serde(default)]
        fit_curve: bool,
        #[serde(default)]
        bias: PivotBias,
        /// Overrides the instrument tier's minimum pivot range.
        #[serde(default)]
        min_range: Option<f64>,
    },
    Oscillator {
        fast: usize,
        slow: usize,
    },
}

fn positive(indicator: &'static str, parameter: &'static str, value: usize) -> Result<(), IndicatorError> {
    if value == 0 {
        Err(IndicatorError::invalid(indicator, parameter, "must be >= 1"))
    } else {
        Ok(())
    }
}

fn fast_below_slow(indicator: &'static str, fast: usize, slow: usize) -> Result<(), IndicatorError> {
    if fast >= slow {
        Err(IndicatorError::invalid(
            indicator,
            "fast",
            format!("fast length {fast} must be below slow length {slow}"),
        ))
    } else {
        Ok(())
    }
}

impl IndicatorConfig {
    /// Dataset key: one per indicator kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            IndicatorConfig::MovingAverage { .. } => "moving_average",
            IndicatorConfig::Macd { .. } => "macd",
            IndicatorConfig::Rsi { .. } => "rsi",
            IndicatorConfig::Atr { .. } => "atr",
            IndicatorConfig::Bollinger { .. } => "bollinger",
            IndicatorConfig::Cci { .. } => "cci",
            IndicatorConfig::MoneyFlow { .. } => "money_flow",
            IndicatorConfig::Stochastic { .. } => "stochastic",
            IndicatorConfig::HeikinAshi => "heikin_ashi",
            IndicatorConfig::Pivot { .. } => "pivot",
            IndicatorConfig::Oscillator { .. } => "oscillator",
        }
    }

    /// Human-readable series name (e.g. "ema_20", "macd_12_26_9").
    pub fn label(&self) -> String {
        match self {
            IndicatorConfig::MovingAverage { average, length } => {
                format!("{}_{length}", average.short_name())
            }
            IndicatorConfig::Macd { fast, slow, signal, .. } => format!("macd_{fast}_{slow}_{signal}"),
            IndicatorConfig::Rsi { length } => format!("rsi_{length}"),
            IndicatorConfig::Atr { length } => format!("atr_{length}"),
            IndicatorConfig::Bollinger { length, multiplier } => format!("bollinger_{length}_{multiplier}"),
            IndicatorConfig::Cci { length } => format!("cci_{length}"),
            IndicatorConfig::MoneyFlow { length } => format!("mfi_{length}"),
            IndicatorConfig::Stochastic { length, smoothing } => format!("stoch_{length}_{smoothing}"),
            IndicatorConfig::HeikinAshi => "heikin_ashi".to_string(),
            IndicatorConfig::Pivot { window, .. } => format!("pivot_{window}"),
            IndicatorConfig::Oscillator { fast, slow } => format!("ppo_{fast}_{slow}"),
        }
    }

    /// Check every parameter; the first violation is returned.
    pub fn validate(&self) -> Result<(), IndicatorError> {
        match *self {
            IndicatorConfig::MovingAverage { length, .. } => positive("moving_average", "length", length),
            IndicatorConfig::Macd { fast, slow, signal, .. } => {
                positive("macd", "fast", fast)?;
                positive("macd", "slow", slow)?;
                positive("macd", "signal", signal)?;
                fast_below_slow("macd", fast, slow)
            }
            IndicatorConfig::Rsi { length } => positive("rsi", "length", length),
            IndicatorConfig::Atr { length } => positive("atr", "length", length),
            IndicatorConfig::Bollinger { length, multiplier } => {
                if length < 2 {
                    return Err(IndicatorError::invalid(
                        "bollinger",
                        "length",
                        "sample standard deviation needs length >= 2",
                    ));
                }
                if !multiplier.is_finite() || multiplier <= 0.0 {
                    return Err(IndicatorError::invalid(
                        "bollinger",
                        "multiplier",
                        format!("must be a positive number, got {multiplier}"),
                    ));
                }
                Ok(())
            }
            IndicatorConfig::Cci { length } => positive("cci", "length", length),
            IndicatorConfig::MoneyFlow { length } => positive("money_flow", "length", length),
            IndicatorConfig::Stochastic { length, smoothing } => {
                positive("stochastic", "length", length)?;
                positive("stochastic", "smoothing", smoothing)
            }
            IndicatorConfig::HeikinAshi => Ok(()),
            IndicatorConfig::Pivot { window, min_range, .. } => {
                if window < 3 || window % 2 == 0 {
                    return Err(IndicatorError::invalid(
                        "pivot",
                        "window",
                        format!("must be odd and >= 3, got {window}"),
                    ));
                }
                match min_range {
                    Some(r) if !r.is_finite() || r < 0.0 => Err(IndicatorError::invalid(
                        "pivot",
                        "min_range",
                        format!("must be a non-negative number, got {r}"),
                    )),
                    _ => Ok(()),
                }
            }
            IndicatorConfig::Oscillator { fast, slow } => {
                positive("oscillator", "fast", fast)?;
                positive("oscillator", "slow", slow)?;
                fast_below_slow("oscillator", fast, slow)
            }
        }
    }

    /// Validate and build the rolling state for this configuration.
    pub fn build(&self) -> Result<IndicatorState, IndicatorError> {
        self.validate()?;
        let state = match *self {
            IndicatorConfig::MovingAverage { average, length } => {
                IndicatorState::MovingAverage(MovingAverage::new(average, length))
            }
            IndicatorConfig::Macd {
                fast,
                slow,
                signal,
                signal_smoothing,
            } => IndicatorState::Macd(Macd::new(fast, slow, signal, signal_smoothing)),
            IndicatorConfig::Rsi { length } => IndicatorState::Rsi(Rsi::new(length)),
            IndicatorConfig::Atr { length } => IndicatorState::Atr(Atr::new(length)),
            IndicatorConfig::Bollinger { length, multiplier } => {
                IndicatorState::Bollinger(Bollinger::new(length, multiplier))
            }
            IndicatorConfig::Cci { length } => IndicatorState::Cci(Cci::new(length)),
            IndicatorConfig::MoneyFlow { length } => IndicatorState::MoneyFlow(MoneyFlow::new(length)),
            IndicatorConfig::Stochastic { length, smoothing } => {
                IndicatorState::Stochastic(Stochastic::new(length, smoothing))
            }
            IndicatorConfig::HeikinAshi => IndicatorState::HeikinAshi(HeikinAshi::new()),
            IndicatorConfig::Pivot {
                window,
                fit_curve,
                bias,
                min_range,
            } => IndicatorState::Pivot(Pivot::new(window, fit_curve, bias, min_range)),
            IndicatorConfig::Oscillator { fast, slow } => {
                IndicatorState::Oscillator(Oscillator::new(fast, slow))
            }
        };
        Ok(state)
    }
}
