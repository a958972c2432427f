//! Position sizing, protective stops, and execution parameters.

use serde::{Deserialize, Serialize};

/// How the quantity of a new position is determined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Sizing {
    /// A fixed number of lots; quantity = lots * lotSize.
    FixedLots { lots: f64 },
    /// Quantity = floor(equity * percent / 100 / price), floored to lot size.
    PercentOfCapital { percent: f64 },
    /// A fixed quantity, floored to lot size.
    FixedQuantity { quantity: f64 },
    /// Risk a percentage of equity against one ATR of adverse movement:
    /// quantity = (equity * riskPercent / 100) / (ATR * contractMultiplier),
    /// floored to lot size. `atrId` names a declared ATR indicator.
    DynamicAtr { atr_id: String, risk_percent: f64 },
}

/// Distance unit for stop-loss and take-profit thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThresholdKind {
    /// Absolute price points from entry.
    Points,
    /// Percent of entry price.
    Percent,
    /// Multiples of an ATR indicator's value at the entry bar.
    Atr,
}

/// Initial protective stop, set at entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopLossConfig {
    pub kind: ThresholdKind,
    pub value: f64,
    /// Required when `kind` is `Atr`: the id of a declared ATR indicator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atr_id: Option<String>,
}

/// Take-profit threshold. With `lockAtTp`, reaching the threshold does not
/// close the position; it ratchets the protective stop to
/// `entry ± lockOffset` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeProfitConfig {
    pub kind: ThresholdKind,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atr_id: Option<String>,
    #[serde(default)]
    pub lock_at_tp: bool,
    #[serde(default)]
    pub lock_offset: f64,
}

/// Trailing stop: follows the best price since entry by a fixed offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailingStopConfig {
    pub offset_points: f64,
    /// Arm the trail only once the take-profit lock has triggered.
    #[serde(default)]
    pub only_after_tp_lock: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskConfig {
    pub sizing: Sizing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<StopLossConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<TakeProfitConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing_stop: Option<TrailingStopConfig>,
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
    #[serde(default)]
    pub allow_pyramiding: bool,
}

fn default_max_open_positions() -> usize {
    1
}

/// When an entry signal is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryFill {
    /// Fill at the close of the signal bar.
    AtClose,
    /// Fill at the open of the bar after the signal bar.
    AtNextOpen,
    /// Immediate market order; fills at the signal bar's close like
    /// `AtClose`, kept distinct for wire compatibility.
    Market,
}

/// One itemized charge component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeComponent {
    pub name: String,
    pub kind: ChargeKind,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChargeKind {
    /// Fixed amount per round-trip.
    Fixed,
    /// Percent of round-trip turnover
    /// ((entry + exit price) * quantity * contractMultiplier).
    PercentOfTurnover,
}

/// Charges applied per round-trip trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ChargeModel {
    Flat { per_round_trip: f64 },
    Itemized { components: Vec<ChargeComponent> },
}

impl Default for ChargeModel {
    fn default() -> Self {
        ChargeModel::Flat { per_round_trip: 0.0 }
    }
}

impl ChargeModel {
    /// Total charges for one round trip.
    pub fn round_trip(&self, entry_price: f64, exit_price: f64, quantity: f64, multiplier: f64) -> f64 {
        match self {
            ChargeModel::Flat { per_round_trip } => *per_round_trip,
            ChargeModel::Itemized { components } => {
                let turnover = (entry_price + exit_price) * quantity * multiplier;
                components
                    .iter()
                    .map(|c| match c.kind {
                        ChargeKind::Fixed => c.value,
                        ChargeKind::PercentOfTurnover => turnover * c.value / 100.0,
                    })
                    .sum()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    pub entry_fill: EntryFill,
    #[serde(default)]
    pub slippage_points: f64,
    #[serde(default)]
    pub charges: ChargeModel,
    #[serde(default = "default_multiplier")]
    pub contract_multiplier: f64,
    #[serde(default = "default_lot_size")]
    pub lot_size: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_lot_size() -> f64 {
    1.0
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            entry_fill: EntryFill::AtClose,
            slippage_points: 0.0,
            charges: ChargeModel::default(),
            contract_multiplier: 1.0,
            lot_size: 1.0,
        }
    }
}
