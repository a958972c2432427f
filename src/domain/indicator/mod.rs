//! Indicator definitions and the computation engine.
//!
//! An [`IndicatorDef`] names an indicator, its parameters, and its input
//! source. Sources may reference a bar field or another indicator's output,
//! which forms a dependency graph; [`plan`] resolves a topological order and
//! [`compute`] fills an [`IndicatorSet`] arena in that order.
//!
//! Outputs are time-aligned with the input bars. The first `lookback` values
//! of every series are NaN ("value not yet available"); consumers must never
//! compare against NaN.
//!
//! The engine assumes it is handed an already-validated definition list (see
//! [`crate::domain::validate`]): unknown kinds, bad parameters, unresolved
//! sources and cycles are caught there. A cycle that slips through surfaces
//! as a compile error rather than a panic or an infinite loop.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stochastic;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::bar::{Bar, BarField};
use crate::domain::error::StratsimError;

/// A declared indicator: unique id, kind + parameters, and input source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorDef {
    pub id: String,
    #[serde(flatten)]
    pub kind: IndicatorKind,
    #[serde(default)]
    pub source: IndicatorSource,
}

/// Indicator kind and its parameters.
///
/// `Custom` is representable so that documents authored for other runtimes
/// still round-trip, but validation rejects it as unsupported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    content = "parameters",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum IndicatorKind {
    Rsi { period: usize },
    Ema { period: usize },
    Sma { period: usize },
    Atr { period: usize },
    BollingerBands { period: usize, std_dev_mult: f64 },
    Macd { fast: usize, slow: usize, signal: usize },
    Stochastic { k_period: usize, d_period: usize },
    Adx { period: usize },
    Custom { name: String },
}

impl IndicatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            IndicatorKind::Rsi { .. } => "rsi",
            IndicatorKind::Ema { .. } => "ema",
            IndicatorKind::Sma { .. } => "sma",
            IndicatorKind::Atr { .. } => "atr",
            IndicatorKind::BollingerBands { .. } => "bollingerBands",
            IndicatorKind::Macd { .. } => "macd",
            IndicatorKind::Stochastic { .. } => "stochastic",
            IndicatorKind::Adx { .. } => "adx",
            IndicatorKind::Custom { .. } => "custom",
        }
    }

    /// Whether the kind reads a scalar source series. OHLC-shaped kinds
    /// (ATR, Stochastic, ADX) read the bars directly and ignore `source`.
    pub fn takes_scalar_source(&self) -> bool {
        !matches!(
            self,
            IndicatorKind::Atr { .. } | IndicatorKind::Stochastic { .. } | IndicatorKind::Adx { .. }
        )
    }
}

/// Input source for a scalar-sourced indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum IndicatorSource {
    BarField {
        field: BarField,
    },
    Indicator {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<OutputField>,
    },
}

impl Default for IndicatorSource {
    fn default() -> Self {
        IndicatorSource::BarField {
            field: BarField::Close,
        }
    }
}

/// A sub-field of an indicator's output.
///
/// `Value` is the single output of scalar indicators and also selects the
/// primary series of multi-output ones (middle band, MACD line, %K).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputField {
    Value,
    Upper,
    Middle,
    Lower,
    MacdLine,
    Signal,
    Histogram,
    K,
    D,
}

/// Computed output of one indicator, time-aligned with the input bars.
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorOutput {
    Scalar(Vec<f64>),
    Bands {
        upper: Vec<f64>,
        middle: Vec<f64>,
        lower: Vec<f64>,
    },
    Macd {
        macd: Vec<f64>,
        signal: Vec<f64>,
        histogram: Vec<f64>,
    },
    Stoch {
        k: Vec<f64>,
        d: Vec<f64>,
    },
}

impl IndicatorOutput {
    pub fn len(&self) -> usize {
        self.primary().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The series a bare indicator reference resolves to.
    pub fn primary(&self) -> &[f64] {
        match self {
            IndicatorOutput::Scalar(v) => v,
            IndicatorOutput::Bands { middle, .. } => middle,
            IndicatorOutput::Macd { macd, .. } => macd,
            IndicatorOutput::Stoch { k, .. } => k,
        }
    }

    /// Resolve a named sub-field, or `None` if the field does not apply to
    /// this output shape.
    pub fn series(&self, field: OutputField) -> Option<&[f64]> {
        match (self, field) {
            (_, OutputField::Value) => Some(self.primary()),
            (IndicatorOutput::Bands { upper, .. }, OutputField::Upper) => Some(upper),
            (IndicatorOutput::Bands { middle, .. }, OutputField::Middle) => Some(middle),
            (IndicatorOutput::Bands { lower, .. }, OutputField::Lower) => Some(lower),
            (IndicatorOutput::Macd { macd, .. }, OutputField::MacdLine) => Some(macd),
            (IndicatorOutput::Macd { signal, .. }, OutputField::Signal) => Some(signal),
            (IndicatorOutput::Macd { histogram, .. }, OutputField::Histogram) => Some(histogram),
            (IndicatorOutput::Stoch { k, .. }, OutputField::K) => Some(k),
            (IndicatorOutput::Stoch { d, .. }, OutputField::D) => Some(d),
            _ => None,
        }
    }

    /// Which fields this output shape supports.
    pub fn supports(&self, field: OutputField) -> bool {
        self.series(field).is_some()
    }
}

/// Arena of computed indicator outputs, keyed by indicator id.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSet {
    slots: Vec<IndicatorOutput>,
    index: HashMap<String, usize>,
}

impl IndicatorSet {
    pub fn get(&self, id: &str) -> Option<&IndicatorOutput> {
        self.index.get(id).map(|&slot| &self.slots[slot])
    }

    /// Value of `id`'s `field` at `bar_index`. NaN for unknown ids,
    /// inapplicable fields, out-of-range indices and warm-up bars.
    pub fn value(&self, id: &str, field: Option<OutputField>, bar_index: usize) -> f64 {
        let Some(output) = self.get(id) else {
            return f64::NAN;
        };
        let Some(series) = output.series(field.unwrap_or(OutputField::Value)) else {
            return f64::NAN;
        };
        series.get(bar_index).copied().unwrap_or(f64::NAN)
    }

    fn insert(&mut self, id: &str, output: IndicatorOutput) {
        self.index.insert(id.to_string(), self.slots.len());
        self.slots.push(output);
    }
}

/// Warm-up length of one indicator on its own: the number of leading NaN
/// output bars, given a source with no warm-up of its own.
pub fn lookback(kind: &IndicatorKind) -> usize {
    match kind {
        IndicatorKind::Rsi { period } | IndicatorKind::Atr { period } => *period,
        IndicatorKind::Ema { period }
        | IndicatorKind::Sma { period }
        | IndicatorKind::BollingerBands { period, .. } => period.saturating_sub(1),
        IndicatorKind::Macd { slow, signal, .. } => {
            slow.saturating_sub(1) + signal.saturating_sub(1)
        }
        IndicatorKind::Stochastic { k_period, d_period } => {
            k_period.saturating_sub(1) + d_period.saturating_sub(1)
        }
        IndicatorKind::Adx { period } => (2 * period).saturating_sub(1),
        IndicatorKind::Custom { .. } => 0,
    }
}

/// Warm-up of `def` including its source chain. Unresolved links contribute
/// zero; a cyclic chain stops at the first repeated id instead of recursing
/// forever (the validator reports the cycle itself).
pub fn total_lookback(defs: &[IndicatorDef], def: &IndicatorDef) -> usize {
    fn chain<'a>(
        defs: &'a [IndicatorDef],
        def: &'a IndicatorDef,
        seen: &mut HashSet<&'a str>,
    ) -> usize {
        let own = lookback(&def.kind);
        match &def.source {
            IndicatorSource::BarField { .. } => own,
            IndicatorSource::Indicator { id, .. } => {
                if !def.kind.takes_scalar_source() || !seen.insert(def.id.as_str()) {
                    return own;
                }
                match defs.iter().find(|d| &d.id == id) {
                    Some(parent) => own + chain(defs, parent, seen),
                    None => own,
                }
            }
        }
    }
    chain(defs, def, &mut HashSet::new())
}

/// Topological order over the `source` dependency graph.
///
/// Cycles are a validator concern; one reaching this far is reported as a
/// compile error rather than looping.
pub fn plan(defs: &[IndicatorDef]) -> Result<Vec<usize>, StratsimError> {
    let by_id: HashMap<&str, usize> = defs
        .iter()
        .enumerate()
        .map(|(i, d)| (d.id.as_str(), i))
        .collect();

    let mut order = Vec::with_capacity(defs.len());
    // 0 = unvisited, 1 = on stack, 2 = done
    let mut state = vec![0u8; defs.len()];

    fn visit(
        node: usize,
        defs: &[IndicatorDef],
        by_id: &HashMap<&str, usize>,
        state: &mut [u8],
        order: &mut Vec<usize>,
    ) -> Result<(), StratsimError> {
        match state[node] {
            2 => return Ok(()),
            1 => {
                return Err(StratsimError::Compile {
                    reason: format!("indicator dependency cycle through '{}'", defs[node].id),
                });
            }
            _ => {}
        }
        state[node] = 1;
        if let IndicatorSource::Indicator { id, .. } = &defs[node].source {
            if let Some(&dep) = by_id.get(id.as_str()) {
                visit(dep, defs, by_id, state, order)?;
            }
        }
        state[node] = 2;
        order.push(node);
        Ok(())
    }

    for i in 0..defs.len() {
        visit(i, defs, &by_id, &mut state, &mut order)?;
    }
    Ok(order)
}

/// Compute every declared indicator over `bars`, in dependency order.
///
/// Deterministic: identical inputs always yield identical output. Expects a
/// validated definition list; `Custom` kinds and unresolved sources are
/// compile errors here only as a backstop.
pub fn compute(defs: &[IndicatorDef], bars: &[Bar]) -> Result<IndicatorSet, StratsimError> {
    let order = plan(defs)?;
    let mut set = IndicatorSet::default();

    for i in order {
        let def = &defs[i];
        let output = match &def.kind {
            IndicatorKind::Rsi { period } => {
                IndicatorOutput::Scalar(rsi::compute(&source_series(def, bars, &set)?, *period))
            }
            IndicatorKind::Ema { period } => {
                IndicatorOutput::Scalar(ema::compute(&source_series(def, bars, &set)?, *period))
            }
            IndicatorKind::Sma { period } => {
                IndicatorOutput::Scalar(sma::compute(&source_series(def, bars, &set)?, *period))
            }
            IndicatorKind::BollingerBands {
                period,
                std_dev_mult,
            } => {
                let (upper, middle, lower) =
                    bollinger::compute(&source_series(def, bars, &set)?, *period, *std_dev_mult);
                IndicatorOutput::Bands {
                    upper,
                    middle,
                    lower,
                }
            }
            IndicatorKind::Macd { fast, slow, signal } => {
                let (macd, signal, histogram) =
                    macd::compute(&source_series(def, bars, &set)?, *fast, *slow, *signal);
                IndicatorOutput::Macd {
                    macd,
                    signal,
                    histogram,
                }
            }
            IndicatorKind::Atr { period } => IndicatorOutput::Scalar(atr::compute(bars, *period)),
            IndicatorKind::Stochastic { k_period, d_period } => {
                let (k, d) = stochastic::compute(bars, *k_period, *d_period);
                IndicatorOutput::Stoch { k, d }
            }
            IndicatorKind::Adx { period } => IndicatorOutput::Scalar(adx::compute(bars, *period)),
            IndicatorKind::Custom { name } => {
                return Err(StratsimError::Compile {
                    reason: format!("custom indicator '{name}' is not supported"),
                });
            }
        };
        set.insert(&def.id, output);
    }

    Ok(set)
}

fn source_series(
    def: &IndicatorDef,
    bars: &[Bar],
    set: &IndicatorSet,
) -> Result<Vec<f64>, StratsimError> {
    match &def.source {
        IndicatorSource::BarField { field } => Ok(bars.iter().map(|b| b.field(*field)).collect()),
        IndicatorSource::Indicator { id, field } => {
            let output = set.get(id).ok_or_else(|| StratsimError::Compile {
                reason: format!("indicator '{}' sources undeclared indicator '{id}'", def.id),
            })?;
            let series = output
                .series(field.unwrap_or(OutputField::Value))
                .ok_or_else(|| StratsimError::Compile {
                    reason: format!(
                        "indicator '{}' sources a field '{id}' does not produce",
                        def.id
                    ),
                })?;
            Ok(series.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                time: NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(9, 15, 0)
                    .unwrap()
                    + chrono::Duration::minutes(15 * i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: Some(1000.0),
            })
            .collect()
    }

    fn sma_def(id: &str, period: usize) -> IndicatorDef {
        IndicatorDef {
            id: id.into(),
            kind: IndicatorKind::Sma { period },
            source: IndicatorSource::default(),
        }
    }

    fn chained_def(id: &str, period: usize, source_id: &str) -> IndicatorDef {
        IndicatorDef {
            id: id.into(),
            kind: IndicatorKind::Ema { period },
            source: IndicatorSource::Indicator {
                id: source_id.into(),
                field: None,
            },
        }
    }

    #[test]
    fn plan_orders_dependencies_first() {
        // Declared out of order: the chained EMA comes before its source.
        let defs = vec![chained_def("ema_of_sma", 3, "sma5"), sma_def("sma5", 5)];
        let order = plan(&defs).unwrap();
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn plan_rejects_cycle() {
        let defs = vec![
            chained_def("a", 3, "b"),
            chained_def("b", 3, "a"),
        ];
        assert!(matches!(plan(&defs), Err(StratsimError::Compile { .. })));
    }

    #[test]
    fn compute_chained_indicator() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let defs = vec![sma_def("sma5", 5), chained_def("ema_of_sma", 3, "sma5")];

        let set = compute(&defs, &bars).unwrap();

        // SMA(5) warm-up is 4 bars, EMA(3) adds 2 more.
        assert!(set.value("ema_of_sma", None, 5).is_nan());
        assert!(set.value("ema_of_sma", None, 6).is_finite());
    }

    #[test]
    fn compute_is_deterministic() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let bars = make_bars(&closes);
        let defs = vec![
            IndicatorDef {
                id: "rsi14".into(),
                kind: IndicatorKind::Rsi { period: 14 },
                source: IndicatorSource::default(),
            },
            sma_def("sma5", 5),
        ];

        let a = compute(&defs, &bars).unwrap();
        let b = compute(&defs, &bars).unwrap();
        for i in 0..bars.len() {
            let (x, y) = (a.value("rsi14", None, i), b.value("rsi14", None, i));
            assert!(x == y || (x.is_nan() && y.is_nan()));
        }
    }

    #[test]
    fn compute_rejects_custom_kind() {
        let bars = make_bars(&[100.0, 101.0]);
        let defs = vec![IndicatorDef {
            id: "x".into(),
            kind: IndicatorKind::Custom {
                name: "wizardry".into(),
            },
            source: IndicatorSource::default(),
        }];
        assert!(matches!(
            compute(&defs, &bars),
            Err(StratsimError::Compile { .. })
        ));
    }

    #[test]
    fn set_value_unknown_id_is_nan() {
        let set = IndicatorSet::default();
        assert!(set.value("nope", None, 0).is_nan());
    }

    #[test]
    fn output_field_resolution() {
        let bands = IndicatorOutput::Bands {
            upper: vec![3.0],
            middle: vec![2.0],
            lower: vec![1.0],
        };
        assert_eq!(bands.series(OutputField::Upper).unwrap()[0], 3.0);
        assert_eq!(bands.series(OutputField::Value).unwrap()[0], 2.0);
        assert!(bands.series(OutputField::K).is_none());
        assert!(bands.supports(OutputField::Lower));
        assert!(!bands.supports(OutputField::Histogram));
    }

    #[test]
    fn total_lookback_accumulates_through_chain() {
        let defs = vec![sma_def("sma5", 5), chained_def("ema_of_sma", 3, "sma5")];
        assert_eq!(total_lookback(&defs, &defs[0]), 4);
        assert_eq!(total_lookback(&defs, &defs[1]), 6);
    }

    #[test]
    fn total_lookback_terminates_on_cyclic_defs() {
        // EMA(3) contributes 2 bars per link; the repeat stops the walk.
        let defs = vec![chained_def("a", 3, "b"), chained_def("b", 3, "a")];
        assert_eq!(total_lookback(&defs, &defs[0]), 6);

        let selfref = vec![chained_def("a", 3, "a")];
        assert_eq!(total_lookback(&selfref, &selfref[0]), 4);
    }

    #[test]
    fn def_serde_round_trip() {
        let def = IndicatorDef {
            id: "bb20".into(),
            kind: IndicatorKind::BollingerBands {
                period: 20,
                std_dev_mult: 2.0,
            },
            source: IndicatorSource::BarField {
                field: BarField::Close,
            },
        };
        let json = serde_json::to_string(&def).unwrap();
        assert!(json.contains("\"kind\":\"bollingerBands\""));
        assert!(json.contains("\"stdDevMult\":2.0"));
        let back: IndicatorDef = serde_json::from_str(&json).unwrap();
        assert_eq!(def, back);
    }

    #[test]
    fn def_source_defaults_to_close() {
        let json = r#"{"id":"rsi14","kind":"rsi","parameters":{"period":14}}"#;
        let def: IndicatorDef = serde_json::from_str(json).unwrap();
        assert_eq!(
            def.source,
            IndicatorSource::BarField {
                field: BarField::Close
            }
        );
    }
}
