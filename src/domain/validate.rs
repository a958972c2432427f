//! Strategy validation.
//!
//! [`validate`] checks a strategy document for structural completeness and
//! semantic soundness before compilation. It never fails: it always returns
//! a list of issues (possibly empty). `Error` issues block compilation,
//! `Warning` issues do not.
//!
//! Checks run in order of logical dependency: top-level fields, indicator id
//! uniqueness, parameter ranges, source resolution, cycle detection, rule
//! operand resolution, time-string syntax, composite arity, and risk and
//! execution numeric bounds. Side-effect free and runnable standalone.

use std::collections::{HashMap, HashSet};

use chrono::NaiveTime;

use crate::domain::indicator::{IndicatorDef, IndicatorKind, IndicatorSource, OutputField};
use crate::domain::risk::{Sizing, ThresholdKind};
use crate::domain::rule::{LogicNode, Operand};
use crate::domain::strategy::StrategyDsl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// One validation finding, addressed by a JSON-ish field path.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

/// The first blocking issue, if any.
pub fn first_error(issues: &[ValidationIssue]) -> Option<&ValidationIssue> {
    issues.iter().find(|i| i.severity == Severity::Error)
}

/// Parse an `HH:mm` time-of-day string.
pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    if value.len() != 5 || value.as_bytes()[2] != b':' {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// Validate a strategy document. Never fails; returns all findings.
pub fn validate(dsl: &StrategyDsl) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    check_top_level(dsl, &mut issues);
    check_indicator_ids(dsl, &mut issues);
    check_indicator_params(dsl, &mut issues);
    check_indicator_sources(dsl, &mut issues);
    check_cycles(dsl, &mut issues);
    check_rule_trees(dsl, &mut issues);
    check_risk(dsl, &mut issues);
    check_execution(dsl, &mut issues);
    issues
}

fn check_top_level(dsl: &StrategyDsl, issues: &mut Vec<ValidationIssue>) {
    if dsl.name.trim().is_empty() {
        issues.push(ValidationIssue::error("name", "name must not be empty"));
    }
    if dsl.version.trim().is_empty() {
        issues.push(ValidationIssue::error("version", "version must not be empty"));
    }
    if dsl.rules.entry_long.is_none() && dsl.rules.entry_short.is_none() {
        issues.push(ValidationIssue::warning(
            "rules",
            "strategy declares no entry rules and will never trade",
        ));
    }
}

fn check_indicator_ids(dsl: &StrategyDsl, issues: &mut Vec<ValidationIssue>) {
    let mut seen = HashSet::new();
    for (i, def) in dsl.indicators.iter().enumerate() {
        if def.id.trim().is_empty() {
            issues.push(ValidationIssue::error(
                format!("indicators[{i}].id"),
                "indicator id must not be empty",
            ));
        } else if !seen.insert(def.id.as_str()) {
            issues.push(ValidationIssue::error(
                format!("indicators[{i}].id"),
                format!("duplicate indicator id '{}'", def.id),
            ));
        }
    }
}

fn check_indicator_params(dsl: &StrategyDsl, issues: &mut Vec<ValidationIssue>) {
    for (i, def) in dsl.indicators.iter().enumerate() {
        let path = format!("indicators[{i}].parameters");
        match &def.kind {
            IndicatorKind::Rsi { period }
            | IndicatorKind::Ema { period }
            | IndicatorKind::Sma { period }
            | IndicatorKind::Atr { period }
            | IndicatorKind::Adx { period } => {
                check_period(&path, "period", *period, issues);
            }
            IndicatorKind::BollingerBands {
                period,
                std_dev_mult,
            } => {
                check_period(&path, "period", *period, issues);
                if *std_dev_mult <= 0.0 {
                    issues.push(ValidationIssue::error(
                        format!("{path}.stdDevMult"),
                        format!("standard-deviation multiplier must be > 0, got {std_dev_mult}"),
                    ));
                }
            }
            IndicatorKind::Macd { fast, slow, signal } => {
                check_period(&path, "fast", *fast, issues);
                check_period(&path, "slow", *slow, issues);
                check_period(&path, "signal", *signal, issues);
                if fast >= slow && *fast >= 1 && *slow >= 1 {
                    issues.push(ValidationIssue::warning(
                        format!("{path}.fast"),
                        format!("fast period {fast} is not shorter than slow period {slow}"),
                    ));
                }
            }
            IndicatorKind::Stochastic { k_period, d_period } => {
                check_period(&path, "kPeriod", *k_period, issues);
                check_period(&path, "dPeriod", *d_period, issues);
            }
            IndicatorKind::Custom { name } => {
                issues.push(ValidationIssue::error(
                    format!("indicators[{i}].kind"),
                    format!("custom indicator '{name}' is not supported"),
                ));
            }
        }
    }
}

fn check_period(path: &str, name: &str, period: usize, issues: &mut Vec<ValidationIssue>) {
    if period < 1 {
        issues.push(ValidationIssue::error(
            format!("{path}.{name}"),
            format!("{name} must be >= 1, got {period}"),
        ));
    }
}

fn check_indicator_sources(dsl: &StrategyDsl, issues: &mut Vec<ValidationIssue>) {
    let declared: HashMap<&str, &IndicatorDef> =
        dsl.indicators.iter().map(|d| (d.id.as_str(), d)).collect();

    for (i, def) in dsl.indicators.iter().enumerate() {
        let path = format!("indicators[{i}].source");
        match &def.source {
            IndicatorSource::BarField { .. } => {}
            IndicatorSource::Indicator { id, field } => {
                if !def.kind.takes_scalar_source() {
                    issues.push(ValidationIssue::warning(
                        path.clone(),
                        format!(
                            "{} reads OHLC bars directly; its source is ignored",
                            def.kind.name()
                        ),
                    ));
                }
                match declared.get(id.as_str()) {
                    None => {
                        issues.push(ValidationIssue::error(
                            path,
                            format!("source references undeclared indicator '{id}'"),
                        ));
                    }
                    Some(parent) => {
                        if let Some(field) = field {
                            if !kind_supports(&parent.kind, *field) {
                                issues.push(ValidationIssue::error(
                                    format!("{path}.field"),
                                    format!(
                                        "indicator '{id}' ({}) has no output field {field:?}",
                                        parent.kind.name()
                                    ),
                                ));
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Whether an indicator kind produces the given output field.
/// `Value` always resolves (to the primary series).
fn kind_supports(kind: &IndicatorKind, field: OutputField) -> bool {
    match field {
        OutputField::Value => true,
        OutputField::Upper | OutputField::Middle | OutputField::Lower => {
            matches!(kind, IndicatorKind::BollingerBands { .. })
        }
        OutputField::MacdLine | OutputField::Signal | OutputField::Histogram => {
            matches!(kind, IndicatorKind::Macd { .. })
        }
        OutputField::K | OutputField::D => matches!(kind, IndicatorKind::Stochastic { .. }),
    }
}

/// Cycle detection over the source dependency graph: depth-first search with
/// a recursion stack, reporting the full cycle path.
fn check_cycles(dsl: &StrategyDsl, issues: &mut Vec<ValidationIssue>) {
    let by_id: HashMap<&str, usize> = dsl
        .indicators
        .iter()
        .enumerate()
        .map(|(i, d)| (d.id.as_str(), i))
        .collect();

    // 0 = unvisited, 1 = on stack, 2 = done
    let mut state = vec![0u8; dsl.indicators.len()];
    let mut stack: Vec<usize> = Vec::new();

    fn visit(
        node: usize,
        defs: &[IndicatorDef],
        by_id: &HashMap<&str, usize>,
        state: &mut [u8],
        stack: &mut Vec<usize>,
        issues: &mut Vec<ValidationIssue>,
    ) {
        if state[node] == 2 {
            return;
        }
        if state[node] == 1 {
            let start = stack.iter().position(|&n| n == node).unwrap_or(0);
            let mut path: Vec<&str> = stack[start..].iter().map(|&n| defs[n].id.as_str()).collect();
            path.push(defs[node].id.as_str());
            issues.push(ValidationIssue::error(
                format!("indicators[{node}].source"),
                format!("indicator dependency cycle: {}", path.join(" -> ")),
            ));
            return;
        }
        state[node] = 1;
        stack.push(node);
        if let IndicatorSource::Indicator { id, .. } = &defs[node].source {
            if let Some(&dep) = by_id.get(id.as_str()) {
                visit(dep, defs, by_id, state, stack, issues);
            }
        }
        stack.pop();
        state[node] = 2;
    }

    for i in 0..dsl.indicators.len() {
        visit(i, &dsl.indicators, &by_id, &mut state, &mut stack, issues);
    }
}

fn check_rule_trees(dsl: &StrategyDsl, issues: &mut Vec<ValidationIssue>) {
    let declared: HashMap<&str, &IndicatorDef> =
        dsl.indicators.iter().map(|d| (d.id.as_str(), d)).collect();

    for (name, rule) in dsl.rules.rules() {
        check_node(rule, &format!("rules.{name}"), &declared, issues);
    }
}

fn check_node(
    node: &LogicNode,
    path: &str,
    declared: &HashMap<&str, &IndicatorDef>,
    issues: &mut Vec<ValidationIssue>,
) {
    match node {
        LogicNode::And { children } | LogicNode::Or { children } => {
            let kind = if matches!(node, LogicNode::And { .. }) {
                "and"
            } else {
                "or"
            };
            if children.is_empty() {
                issues.push(ValidationIssue::error(
                    path.to_string(),
                    format!("{kind} node must have at least one child"),
                ));
            }
            for (i, child) in children.iter().enumerate() {
                check_node(child, &format!("{path}.children[{i}]"), declared, issues);
            }
        }
        LogicNode::Not { child } => {
            check_node(child, &format!("{path}.child"), declared, issues);
        }
        LogicNode::Condition { left, right, .. } => {
            check_operand(left, &format!("{path}.left"), declared, issues);
            check_operand(right, &format!("{path}.right"), declared, issues);
        }
        LogicNode::CrossAbove { a, b } | LogicNode::CrossBelow { a, b } => {
            check_operand(a, &format!("{path}.a"), declared, issues);
            check_operand(b, &format!("{path}.b"), declared, issues);
        }
        LogicNode::TimeFilter {
            start_time,
            end_time,
            days_of_week,
        } => {
            for (field, value) in [("startTime", start_time), ("endTime", end_time)] {
                if let Some(value) = value {
                    if parse_hhmm(value).is_none() {
                        issues.push(ValidationIssue::error(
                            format!("{path}.{field}"),
                            format!("'{value}' is not a valid HH:mm time"),
                        ));
                    }
                }
            }
            if let Some(days) = days_of_week {
                if days.is_empty() {
                    issues.push(ValidationIssue::warning(
                        format!("{path}.daysOfWeek"),
                        "empty day-of-week set never matches",
                    ));
                }
            }
        }
    }
}

fn check_operand(
    operand: &Operand,
    path: &str,
    declared: &HashMap<&str, &IndicatorDef>,
    issues: &mut Vec<ValidationIssue>,
) {
    match operand {
        Operand::Indicator { id, field } => match declared.get(id.as_str()) {
            None => {
                issues.push(ValidationIssue::error(
                    path.to_string(),
                    format!("operand references undeclared indicator '{id}'"),
                ));
            }
            Some(def) => {
                if let Some(field) = field {
                    if !kind_supports(&def.kind, *field) {
                        issues.push(ValidationIssue::error(
                            format!("{path}.field"),
                            format!(
                                "indicator '{id}' ({}) has no output field {field:?}",
                                def.kind.name()
                            ),
                        ));
                    }
                }
            }
        },
        Operand::TimeOfDay { value } => {
            if parse_hhmm(value).is_none() {
                issues.push(ValidationIssue::error(
                    path.to_string(),
                    format!("'{value}' is not a valid HH:mm time"),
                ));
            }
        }
        Operand::Literal { value } => {
            if !value.is_finite() {
                issues.push(ValidationIssue::error(
                    path.to_string(),
                    "literal must be a finite number",
                ));
            }
        }
        Operand::Bar { .. } | Operand::Variable { .. } => {}
    }
}

fn check_risk(dsl: &StrategyDsl, issues: &mut Vec<ValidationIssue>) {
    let risk = &dsl.risk;
    let declared: HashMap<&str, &IndicatorDef> =
        dsl.indicators.iter().map(|d| (d.id.as_str(), d)).collect();

    match &risk.sizing {
        Sizing::FixedLots { lots } => {
            if *lots <= 0.0 {
                issues.push(ValidationIssue::error(
                    "risk.sizing.lots",
                    format!("lots must be > 0, got {lots}"),
                ));
            }
        }
        Sizing::PercentOfCapital { percent } => {
            check_percent("risk.sizing.percent", *percent, issues);
        }
        Sizing::FixedQuantity { quantity } => {
            if *quantity <= 0.0 {
                issues.push(ValidationIssue::error(
                    "risk.sizing.quantity",
                    format!("quantity must be > 0, got {quantity}"),
                ));
            }
        }
        Sizing::DynamicAtr {
            atr_id,
            risk_percent,
        } => {
            check_percent("risk.sizing.riskPercent", *risk_percent, issues);
            check_atr_ref("risk.sizing.atrId", atr_id, &declared, issues);
        }
    }

    if let Some(stop) = &risk.stop_loss {
        check_threshold("risk.stopLoss", stop.kind, stop.value, &stop.atr_id, &declared, issues);
    }
    if let Some(tp) = &risk.take_profit {
        check_threshold("risk.takeProfit", tp.kind, tp.value, &tp.atr_id, &declared, issues);
        if tp.lock_offset < 0.0 {
            issues.push(ValidationIssue::error(
                "risk.takeProfit.lockOffset",
                format!("lockOffset must be >= 0, got {}", tp.lock_offset),
            ));
        }
        if tp.lock_at_tp && tp.lock_offset == 0.0 {
            issues.push(ValidationIssue::warning(
                "risk.takeProfit.lockOffset",
                "lockAtTp with zero lockOffset locks the stop at break-even",
            ));
        }
    }
    if let Some(trail) = &risk.trailing_stop {
        if trail.offset_points <= 0.0 {
            issues.push(ValidationIssue::error(
                "risk.trailingStop.offsetPoints",
                format!("offsetPoints must be > 0, got {}", trail.offset_points),
            ));
        }
        if trail.only_after_tp_lock
            && !risk.take_profit.as_ref().is_some_and(|tp| tp.lock_at_tp)
        {
            issues.push(ValidationIssue::warning(
                "risk.trailingStop.onlyAfterTpLock",
                "onlyAfterTpLock is set but no take-profit lock is configured; the trail never arms",
            ));
        }
    }

    if risk.max_open_positions < 1 {
        issues.push(ValidationIssue::error(
            "risk.maxOpenPositions",
            "maxOpenPositions must be >= 1",
        ));
    }
    if risk.max_open_positions > 1 && !risk.allow_pyramiding {
        issues.push(ValidationIssue::warning(
            "risk.maxOpenPositions",
            "maxOpenPositions > 1 has no effect without allowPyramiding",
        ));
    }
}

fn check_threshold(
    path: &str,
    kind: ThresholdKind,
    value: f64,
    atr_id: &Option<String>,
    declared: &HashMap<&str, &IndicatorDef>,
    issues: &mut Vec<ValidationIssue>,
) {
    if value <= 0.0 {
        issues.push(ValidationIssue::error(
            format!("{path}.value"),
            format!("value must be > 0, got {value}"),
        ));
    }
    match kind {
        ThresholdKind::Percent => {
            if value > 100.0 {
                issues.push(ValidationIssue::error(
                    format!("{path}.value"),
                    format!("percent value must be within [0, 100], got {value}"),
                ));
            }
        }
        ThresholdKind::Atr => match atr_id {
            None => {
                issues.push(ValidationIssue::error(
                    format!("{path}.atrId"),
                    "ATR-based threshold requires atrId",
                ));
            }
            Some(id) => check_atr_ref(&format!("{path}.atrId"), id, declared, issues),
        },
        ThresholdKind::Points => {}
    }
}

fn check_atr_ref(
    path: &str,
    atr_id: &str,
    declared: &HashMap<&str, &IndicatorDef>,
    issues: &mut Vec<ValidationIssue>,
) {
    match declared.get(atr_id) {
        None => {
            issues.push(ValidationIssue::error(
                path.to_string(),
                format!("references undeclared indicator '{atr_id}'"),
            ));
        }
        Some(def) if !matches!(def.kind, IndicatorKind::Atr { .. }) => {
            issues.push(ValidationIssue::error(
                path.to_string(),
                format!("indicator '{atr_id}' is {}, expected atr", def.kind.name()),
            ));
        }
        Some(_) => {}
    }
}

fn check_percent(path: &str, value: f64, issues: &mut Vec<ValidationIssue>) {
    if !(value > 0.0 && value <= 100.0) {
        issues.push(ValidationIssue::error(
            path,
            format!("percentage must be within (0, 100], got {value}"),
        ));
    }
}

fn check_execution(dsl: &StrategyDsl, issues: &mut Vec<ValidationIssue>) {
    let exec = &dsl.execution;
    if exec.slippage_points < 0.0 {
        issues.push(ValidationIssue::error(
            "execution.slippagePoints",
            format!("slippagePoints must be >= 0, got {}", exec.slippage_points),
        ));
    }
    if exec.contract_multiplier <= 0.0 {
        issues.push(ValidationIssue::error(
            "execution.contractMultiplier",
            format!("contractMultiplier must be > 0, got {}", exec.contract_multiplier),
        ));
    }
    if exec.lot_size <= 0.0 {
        issues.push(ValidationIssue::error(
            "execution.lotSize",
            format!("lotSize must be > 0, got {}", exec.lot_size),
        ));
    }
    match &exec.charges {
        crate::domain::risk::ChargeModel::Flat { per_round_trip } => {
            if *per_round_trip < 0.0 {
                issues.push(ValidationIssue::error(
                    "execution.charges.perRoundTrip",
                    format!("charge must be >= 0, got {per_round_trip}"),
                ));
            }
        }
        crate::domain::risk::ChargeModel::Itemized { components } => {
            for (i, c) in components.iter().enumerate() {
                if c.value < 0.0 {
                    issues.push(ValidationIssue::error(
                        format!("execution.charges.components[{i}].value"),
                        format!("charge component '{}' must be >= 0, got {}", c.name, c.value),
                    ));
                }
            }
        }
    }
}
