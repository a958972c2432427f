//! OHLCV bar data and pre-run data checks.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::error::StratsimError;

/// One OHLCV candle for a fixed time interval. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl Bar {
    pub fn field(&self, field: BarField) -> f64 {
        match field {
            BarField::Open => self.open,
            BarField::High => self.high,
            BarField::Low => self.low,
            BarField::Close => self.close,
            BarField::Volume => self.volume.unwrap_or(f64::NAN),
        }
    }
}

/// A price/volume field of a bar, referencable from indicator sources and
/// rule operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BarField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

/// Validate a bar sequence before the simulation loop starts.
///
/// Rejects NaN or non-positive prices, bars where high < low, and
/// non-monotonic timestamps. An empty slice is fine: a backtest over no
/// bars is an empty result, not an error.
pub fn check_bars(bars: &[Bar]) -> Result<(), StratsimError> {
    for (i, bar) in bars.iter().enumerate() {
        for (name, value) in [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
        ] {
            if !value.is_finite() {
                return Err(StratsimError::Data {
                    index: i,
                    reason: format!("{name} is not finite"),
                });
            }
            if value <= 0.0 {
                return Err(StratsimError::Data {
                    index: i,
                    reason: format!("{name} must be positive, got {value}"),
                });
            }
        }
        if bar.high < bar.low {
            return Err(StratsimError::Data {
                index: i,
                reason: format!("high {} is below low {}", bar.high, bar.low),
            });
        }
        if let Some(v) = bar.volume {
            if !v.is_finite() || v < 0.0 {
                return Err(StratsimError::Data {
                    index: i,
                    reason: format!("volume must be a non-negative number, got {v}"),
                });
            }
        }
        if i > 0 && bars[i - 1].time >= bar.time {
            return Err(StratsimError::Data {
                index: i,
                reason: format!(
                    "timestamps must be strictly increasing ({} then {})",
                    bars[i - 1].time,
                    bar.time
                ),
            });
        }
    }
    Ok(())
}
