//! Rule compilation: lowering the condition tree to executable predicates.
//!
//! [`compile`] validates the strategy internally (the first blocking issue
//! becomes the failure reason) and lowers every [`LogicNode`] into a closure
//! over `(bar_index, bars, context)` returning `Option<bool>`:
//!
//! - `None` means "indeterminate" — an operand was unavailable, e.g. inside
//!   an indicator warm-up window. `None` propagates through every composite
//!   so an unknown can never produce a false positive.
//! - `CrossAbove(a, b)` is true iff `i > 0 && a[i-1] <= b[i-1] && a[i] > b[i]`;
//!   `CrossBelow` is the mirror; both are `None` at index 0 or on NaN.
//! - `TimeFilter` checks the bar's wall clock and weekday; absent bounds are
//!   unrestricted, and a start after the end wraps past midnight.
//!
//! Evaluators are pure functions of their inputs: identical
//! `(bar_index, bars, context)` always produce identical output.

use std::collections::HashMap;

use chrono::{Datelike, Timelike};

use crate::domain::bar::Bar;
use crate::domain::error::StratsimError;
use crate::domain::indicator::{self, IndicatorDef, IndicatorSet};
use crate::domain::position::Direction;
use crate::domain::rule::{Comparator, LogicNode, Operand};
use crate::domain::strategy::StrategyDsl;
use crate::domain::validate::{first_error, parse_hhmm, validate};

const EPSILON: f64 = 1e-9;

/// Runtime inputs to a compiled evaluator: the computed indicator series and
/// caller-supplied named variables.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    pub indicators: IndicatorSet,
    pub variables: HashMap<String, f64>,
}

/// Per-bar output of a compiled strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal {
    /// `Some(direction)` when an entry condition fired this bar.
    /// Long wins if both directions fire at once.
    pub entry: Option<Direction>,
    /// The declared exit rule's verdict; `None` when the strategy has no
    /// exit rule or the rule was indeterminate.
    pub exit: Option<bool>,
}

type Predicate = Box<dyn Fn(usize, &[Bar], &EvalContext) -> Option<bool> + Send + Sync>;
type ValueFn = Box<dyn Fn(usize, &[Bar], &EvalContext) -> f64 + Send + Sync>;

/// A strategy lowered to executable form.
pub struct CompiledStrategy {
    entry_long: Option<Predicate>,
    entry_short: Option<Predicate>,
    exit: Option<Predicate>,
    pub exit_on_opposite_signal: bool,
    /// Bars needed before the first meaningful evaluation: the maximum
    /// warm-up over every declared indicator, source chains included.
    pub required_lookback: usize,
    indicators: Vec<IndicatorDef>,
}

impl CompiledStrategy {
    /// Compute the indicator series for a bar fixture, yielding a context
    /// the evaluator can run against.
    pub fn prepare(&self, bars: &[Bar]) -> Result<EvalContext, StratsimError> {
        Ok(EvalContext {
            indicators: indicator::compute(&self.indicators, bars)?,
            variables: HashMap::new(),
        })
    }

    /// Evaluate entry and exit rules at one bar. Pure: no hidden state.
    pub fn evaluate(&self, bar_index: usize, bars: &[Bar], ctx: &EvalContext) -> Signal {
        let long = eval_opt(&self.entry_long, bar_index, bars, ctx);
        let short = eval_opt(&self.entry_short, bar_index, bars, ctx);
        let entry = if long == Some(true) {
            Some(Direction::Long)
        } else if short == Some(true) {
            Some(Direction::Short)
        } else {
            None
        };
        Signal {
            entry,
            exit: eval_opt(&self.exit, bar_index, bars, ctx),
        }
    }

    /// Whether the entry rule for `direction` fires at this bar. Used for
    /// opposite-signal exits.
    pub fn entry_fires(
        &self,
        direction: Direction,
        bar_index: usize,
        bars: &[Bar],
        ctx: &EvalContext,
    ) -> bool {
        let rule = match direction {
            Direction::Long => &self.entry_long,
            Direction::Short => &self.entry_short,
        };
        eval_opt(rule, bar_index, bars, ctx) == Some(true)
    }
}

fn eval_opt(
    rule: &Option<Predicate>,
    bar_index: usize,
    bars: &[Bar],
    ctx: &EvalContext,
) -> Option<bool> {
    rule.as_ref().and_then(|p| p(bar_index, bars, ctx))
}

/// Compile a strategy document. Validates internally; the first blocking
/// validation error is surfaced as the failure reason.
pub fn compile(dsl: &StrategyDsl) -> Result<CompiledStrategy, StratsimError> {
    let issues = validate(dsl);
    if let Some(issue) = first_error(&issues) {
        return Err(StratsimError::Validation(issue.clone()));
    }

    let required_lookback = dsl
        .indicators
        .iter()
        .map(|def| indicator::total_lookback(&dsl.indicators, def))
        .max()
        .unwrap_or(0);

    Ok(CompiledStrategy {
        entry_long: dsl.rules.entry_long.as_ref().map(lower_node),
        entry_short: dsl.rules.entry_short.as_ref().map(lower_node),
        exit: dsl.rules.exit.as_ref().map(lower_node),
        exit_on_opposite_signal: dsl.rules.exit_on_opposite_signal,
        required_lookback,
        indicators: dsl.indicators.clone(),
    })
}

fn lower_node(node: &LogicNode) -> Predicate {
    match node {
        LogicNode::And { children } => {
            let preds: Vec<Predicate> = children.iter().map(lower_node).collect();
            Box::new(move |i, bars, ctx| {
                let mut all = true;
                for p in &preds {
                    all &= p(i, bars, ctx)?;
                }
                Some(all)
            })
        }
        LogicNode::Or { children } => {
            let preds: Vec<Predicate> = children.iter().map(lower_node).collect();
            Box::new(move |i, bars, ctx| {
                let mut any = false;
                for p in &preds {
                    any |= p(i, bars, ctx)?;
                }
                Some(any)
            })
        }
        LogicNode::Not { child } => {
            let pred = lower_node(child);
            Box::new(move |i, bars, ctx| pred(i, bars, ctx).map(|v| !v))
        }
        LogicNode::Condition {
            left,
            comparator,
            right,
        } => {
            let lf = lower_operand(left);
            let rf = lower_operand(right);
            let cmp = *comparator;
            Box::new(move |i, bars, ctx| {
                let l = lf(i, bars, ctx);
                let r = rf(i, bars, ctx);
                if l.is_nan() || r.is_nan() {
                    return None;
                }
                Some(match cmp {
                    Comparator::Gt => l > r,
                    Comparator::Gte => l >= r,
                    Comparator::Lt => l < r,
                    Comparator::Lte => l <= r,
                    Comparator::Eq => (l - r).abs() < EPSILON,
                    Comparator::Neq => (l - r).abs() >= EPSILON,
                })
            })
        }
        LogicNode::CrossAbove { a, b } => lower_cross(a, b, false),
        LogicNode::CrossBelow { a, b } => lower_cross(a, b, true),
        LogicNode::TimeFilter {
            start_time,
            end_time,
            days_of_week,
        } => {
            // Validation guarantees well-formed times by compile time.
            let start = start_time.as_deref().and_then(parse_hhmm);
            let end = end_time.as_deref().and_then(parse_hhmm);
            let days = days_of_week.clone();
            Box::new(move |i, bars, _| {
                let bar = bars.get(i)?;
                let time = bar.time.time();
                let in_window = match (start, end) {
                    (None, None) => true,
                    (Some(s), None) => time >= s,
                    (None, Some(e)) => time <= e,
                    (Some(s), Some(e)) => {
                        if s <= e {
                            time >= s && time <= e
                        } else {
                            // Session wraps past midnight.
                            time >= s || time <= e
                        }
                    }
                };
                let day_ok = days
                    .as_ref()
                    .is_none_or(|d| d.contains(&bar.time.weekday()));
                Some(in_window && day_ok)
            })
        }
    }
}

fn lower_cross(a: &Operand, b: &Operand, below: bool) -> Predicate {
    let af = lower_operand(a);
    let bf = lower_operand(b);
    Box::new(move |i, bars, ctx| {
        if i == 0 {
            return None;
        }
        let (a_prev, a_curr) = (af(i - 1, bars, ctx), af(i, bars, ctx));
        let (b_prev, b_curr) = (bf(i - 1, bars, ctx), bf(i, bars, ctx));
        if a_prev.is_nan() || a_curr.is_nan() || b_prev.is_nan() || b_curr.is_nan() {
            return None;
        }
        Some(if below {
            a_prev >= b_prev && a_curr < b_curr
        } else {
            a_prev <= b_prev && a_curr > b_curr
        })
    })
}

fn lower_operand(operand: &Operand) -> ValueFn {
    match operand {
        Operand::Indicator { id, field } => {
            let id = id.clone();
            let field = *field;
            Box::new(move |i, _, ctx| ctx.indicators.value(&id, field, i))
        }
        Operand::Bar { field } => {
            let field = *field;
            Box::new(move |i, bars, _| bars.get(i).map_or(f64::NAN, |b| b.field(field)))
        }
        Operand::Literal { value } => {
            let value = *value;
            Box::new(move |_, _, _| value)
        }
        Operand::TimeOfDay { value } => {
            // Minutes since midnight; validation guarantees the format.
            let minutes = parse_hhmm(value)
                .map(|t| (t.hour() * 60 + t.minute()) as f64)
                .unwrap_or(f64::NAN);
            Box::new(move |_, _, _| minutes)
        }
        Operand::Variable { name } => {
            let name = name.clone();
            Box::new(move |_, _, ctx| ctx.variables.get(&name).copied().unwrap_or(f64::NAN))
        }
    }
}
