//! The strategy document: everything a backtest needs, fully serializable.

use serde::{Deserialize, Serialize};

use crate::domain::indicator::IndicatorDef;
use crate::domain::risk::{ExecutionConfig, RiskConfig};
use crate::domain::rule::RuleSet;

/// A complete user-authored strategy definition.
///
/// This is the JSON document exchanged with whatever authors and stores
/// strategies; no behavior may depend on state that does not round-trip
/// through serde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDsl {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub indicators: Vec<IndicatorDef>,
    #[serde(default)]
    pub rules: RuleSet,
    pub risk: RiskConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}
