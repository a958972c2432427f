//! Rule AST data structures.
//!
//! The declarative condition tree a strategy document carries:
//! - [`Operand`]: what can be compared (indicator outputs, bar fields,
//!   literals, time-of-day values, named variables)
//! - [`LogicNode`]: the recursive tree (boolean composites, comparisons,
//!   crossovers, session filters)
//! - [`RuleSet`]: the entry/exit rules of a strategy
//!
//! Everything here is plain serializable data; lowering to executable
//! predicates lives in [`crate::domain::compile`].

use serde::{Deserialize, Serialize};

use crate::domain::bar::BarField;
use crate::domain::indicator::OutputField;

/// A value reference inside a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Operand {
    /// An indicator's output at the current bar, optionally a sub-field.
    Indicator {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<OutputField>,
    },
    /// A raw bar field at the current bar.
    Bar { field: BarField },
    /// A constant number.
    Literal { value: f64 },
    /// A wall-clock `HH:mm` value, compared as minutes since midnight.
    TimeOfDay { value: String },
    /// A caller-supplied named parameter, resolved from the runtime context.
    Variable { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Comparator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
}

/// One node of the condition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LogicNode {
    And {
        children: Vec<LogicNode>,
    },
    Or {
        children: Vec<LogicNode>,
    },
    Not {
        child: Box<LogicNode>,
    },
    Condition {
        left: Operand,
        comparator: Comparator,
        right: Operand,
    },
    CrossAbove {
        a: Operand,
        b: Operand,
    },
    CrossBelow {
        a: Operand,
        b: Operand,
    },
    TimeFilter {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_time: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_time: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        days_of_week: Option<Vec<chrono::Weekday>>,
    },
}

/// The entry/exit rules of a strategy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_long: Option<LogicNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_short: Option<LogicNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<LogicNode>,
    #[serde(default)]
    pub exit_on_opposite_signal: bool,
}

impl RuleSet {
    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &LogicNode)> {
        [
            ("entryLong", self.entry_long.as_ref()),
            ("entryShort", self.entry_short.as_ref()),
            ("exit", self.exit.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, rule)| rule.map(|r| (name, r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsi_above(threshold: f64) -> LogicNode {
        LogicNode::Condition {
            left: Operand::Indicator {
                id: "rsi14".into(),
                field: None,
            },
            comparator: Comparator::Gt,
            right: Operand::Literal { value: threshold },
        }
    }

    #[test]
    fn rule_set_rules_iterates_present_rules() {
        let rules = RuleSet {
            entry_long: Some(rsi_above(40.0)),
            entry_short: None,
            exit: Some(rsi_above(70.0)),
            exit_on_opposite_signal: true,
        };
        let names: Vec<&str> = rules.rules().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["entryLong", "exit"]);
    }

    #[test]
    fn logic_node_serde_tagging() {
        let node = LogicNode::CrossAbove {
            a: Operand::Indicator {
                id: "rsi14".into(),
                field: None,
            },
            b: Operand::Literal { value: 40.0 },
        };
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("\"type\":\"crossAbove\""));
        let back: LogicNode = serde_json::from_str(&json).unwrap();
        assert_eq!(node, back);
    }

    #[test]
    fn time_filter_serde_optional_bounds() {
        let json = r#"{"type":"timeFilter","startTime":"09:30"}"#;
        let node: LogicNode = serde_json::from_str(json).unwrap();
        match node {
            LogicNode::TimeFilter {
                start_time,
                end_time,
                days_of_week,
            } => {
                assert_eq!(start_time.as_deref(), Some("09:30"));
                assert!(end_time.is_none());
                assert!(days_of_week.is_none());
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn rule_set_defaults() {
        let rules: RuleSet = serde_json::from_str("{}").unwrap();
        assert!(rules.entry_long.is_none());
        assert!(!rules.exit_on_opposite_signal);
    }
}
