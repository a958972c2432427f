#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use stratsim::domain::bar::Bar;
use stratsim::domain::indicator::{IndicatorDef, IndicatorKind, IndicatorSource};
use stratsim::domain::risk::{ExecutionConfig, RiskConfig, Sizing, TakeProfitConfig, ThresholdKind};
use stratsim::domain::rule::{LogicNode, Operand, RuleSet};
use stratsim::domain::strategy::StrategyDsl;

pub fn base_time() -> NaiveDateTime {
    // A Monday.
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(9, 15, 0)
        .unwrap()
}

/// 15-minute bars with `open = close`, `high = close + 1`, `low = close - 1`.
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            time: base_time() + chrono::Duration::minutes(15 * i as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: Some(1_000.0),
        })
        .collect()
}

/// The same bars as [`make_bars`], rendered as a CSV document.
pub fn bars_csv(closes: &[f64]) -> String {
    let mut out = String::from("time,open,high,low,close,volume\n");
    for bar in make_bars(closes) {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.time.format("%Y-%m-%d %H:%M:%S"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume.unwrap_or(0.0)
        ));
    }
    out
}

pub fn unit_risk() -> RiskConfig {
    RiskConfig {
        sizing: Sizing::FixedQuantity { quantity: 1.0 },
        stop_loss: None,
        take_profit: None,
        trailing_stop: None,
        max_open_positions: 1,
        allow_pyramiding: false,
    }
}

pub fn strategy(name: &str, rules: RuleSet, risk: RiskConfig) -> StrategyDsl {
    StrategyDsl {
        name: name.into(),
        version: "1".into(),
        indicators: vec![],
        rules,
        risk,
        execution: ExecutionConfig::default(),
    }
}

/// An RSI momentum strategy: enter long when RSI crosses above `threshold`,
/// take profit `tp_points` above the entry.
pub fn rsi_cross_strategy(rsi_period: usize, threshold: f64, tp_points: f64) -> StrategyDsl {
    let mut risk = unit_risk();
    risk.take_profit = Some(TakeProfitConfig {
        kind: ThresholdKind::Points,
        value: tp_points,
        atr_id: None,
        lock_at_tp: false,
        lock_offset: 0.0,
    });
    StrategyDsl {
        name: "rsi-cross".into(),
        version: "1".into(),
        indicators: vec![IndicatorDef {
            id: "rsi".into(),
            kind: IndicatorKind::Rsi { period: rsi_period },
            source: IndicatorSource::default(),
        }],
        rules: RuleSet {
            entry_long: Some(LogicNode::CrossAbove {
                a: Operand::Indicator {
                    id: "rsi".into(),
                    field: None,
                },
                b: Operand::Literal { value: threshold },
            }),
            ..Default::default()
        },
        risk,
        execution: ExecutionConfig::default(),
    }
}
