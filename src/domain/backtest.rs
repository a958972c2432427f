//! The bar-by-bar simulation engine.
//!
//! [`run`] compiles a strategy, computes its indicators, then walks the bar
//! series once. Each bar is processed in a fixed order:
//!
//! 1. cancellation check
//! 2. fill any entry deferred from the previous bar (`atNextOpen`)
//! 3. evaluate the rule trees (skipped inside the warm-up window; faults
//!    are contained, see [`RunDiagnostics`])
//! 4. manage open positions, strictly: take-profit, trailing-stop breach,
//!    stop-loss breach, rule exit, opposite signal
//! 5. act on a fresh entry signal
//! 6. append one realized-equity point
//!
//! Threshold exits are detected against the bar's intrabar extremes (the
//! favorable extreme for take-profit, the adverse extreme for stops) and
//! fill at the threshold level; rule-driven exits fill at the bar's close.
//! Positions still open after the last bar are closed at its close with
//! [`ExitReason::EndOfData`]. Slippage is applied adversely on both fills.
//! A series shorter than the warm-up window never enters the loop: the
//! result has zero trades and an empty equity curve.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::bar::{Bar, check_bars};
use crate::domain::compile::{self, CompiledStrategy, EvalContext, Signal};
use crate::domain::error::StratsimError;
use crate::domain::position::{Direction, ExitReason, Position, Trade};
use crate::domain::risk::{EntryFill, Sizing, ThresholdKind};
use crate::domain::strategy::StrategyDsl;
use crate::domain::summary::BacktestSummary;

/// Shared flag a caller sets to abort a run between bars.
pub type CancelToken = Arc<AtomicBool>;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub initial_capital: f64,
    pub cancel: Option<CancelToken>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            initial_capital: 100_000.0,
            cancel: None,
        }
    }
}

/// Realized equity sampled once per bar. Open positions are not
/// marked to market; equity moves only when a trade closes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityPoint {
    pub time: NaiveDateTime,
    pub equity: f64,
}

/// Rule-evaluation faults contained during a run. A faulting bar is treated
/// as "no signal" rather than aborting the whole simulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDiagnostics {
    pub fault_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_fault: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub summary: BacktestSummary,
    pub diagnostics: RunDiagnostics,
}

/// Run a full backtest of `dsl` over `bars`.
pub fn run(dsl: &StrategyDsl, bars: &[Bar], config: &RunConfig) -> Result<BacktestResult, StratsimError> {
    check_bars(bars)?;
    let compiled = compile::compile(dsl)?;

    // A series shorter than the warm-up window cannot carry a single
    // evaluable bar: zero trades, empty curve, not an error.
    if bars.len() < compiled.required_lookback {
        return Ok(BacktestResult {
            trades: Vec::new(),
            equity_curve: Vec::new(),
            summary: BacktestSummary::compute(&[], &[], config.initial_capital),
            diagnostics: RunDiagnostics::default(),
        });
    }

    let ctx = compiled.prepare(bars)?;

    let mut engine = Engine {
        dsl,
        compiled: &compiled,
        ctx: &ctx,
        bars,
        equity: config.initial_capital,
        positions: Vec::new(),
        pending: None,
        trades: Vec::new(),
        curve: Vec::with_capacity(bars.len()),
        diagnostics: RunDiagnostics::default(),
    };

    for i in 0..bars.len() {
        if config.cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed)) {
            return Err(StratsimError::Cancelled);
        }
        engine.step(i);
    }
    engine.finish();

    let summary = BacktestSummary::compute(&engine.trades, &engine.curve, config.initial_capital);
    Ok(BacktestResult {
        trades: engine.trades,
        equity_curve: engine.curve,
        summary,
        diagnostics: engine.diagnostics,
    })
}

struct BarSignal {
    signal: Signal,
    long_fires: bool,
    short_fires: bool,
}

impl BarSignal {
    fn none() -> Self {
        BarSignal {
            signal: Signal {
                entry: None,
                exit: None,
            },
            long_fires: false,
            short_fires: false,
        }
    }
}

struct Engine<'a> {
    dsl: &'a StrategyDsl,
    compiled: &'a CompiledStrategy,
    ctx: &'a EvalContext,
    bars: &'a [Bar],
    equity: f64,
    positions: Vec<Position>,
    pending: Option<Direction>,
    trades: Vec<Trade>,
    curve: Vec<EquityPoint>,
    diagnostics: RunDiagnostics,
}

impl Engine<'_> {
    fn step(&mut self, i: usize) {
        if let Some(direction) = self.pending.take() {
            self.open_position(i, direction, self.bars[i].open);
        }

        // Bars inside the warm-up window carry no meaningful signal.
        let sig = if i < self.compiled.required_lookback {
            BarSignal::none()
        } else {
            self.evaluate_guarded(i)
        };
        self.manage_positions(i, &sig);

        if let Some(direction) = sig.signal.entry {
            if self.has_capacity() {
                match self.dsl.execution.entry_fill {
                    EntryFill::AtClose | EntryFill::Market => {
                        self.open_position(i, direction, self.bars[i].close);
                    }
                    EntryFill::AtNextOpen => {
                        // A signal on the final bar has no bar left to fill on.
                        if i + 1 < self.bars.len() {
                            self.pending = Some(direction);
                        }
                    }
                }
            }
        }

        self.curve.push(EquityPoint {
            time: self.bars[i].time,
            equity: self.equity,
        });
    }

    fn evaluate_guarded(&mut self, i: usize) -> BarSignal {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| BarSignal {
            signal: self.compiled.evaluate(i, self.bars, self.ctx),
            long_fires: self.compiled.entry_fires(Direction::Long, i, self.bars, self.ctx),
            short_fires: self.compiled.entry_fires(Direction::Short, i, self.bars, self.ctx),
        }));
        match outcome {
            Ok(sig) => sig,
            Err(payload) => {
                self.diagnostics.fault_count += 1;
                if self.diagnostics.first_fault.is_none() {
                    self.diagnostics.first_fault =
                        Some(format!("bar {i}: {}", fault_message(payload.as_ref())));
                }
                BarSignal::none()
            }
        }
    }

    fn manage_positions(&mut self, i: usize, sig: &BarSignal) {
        let dsl = self.dsl;
        let bar = &self.bars[i];
        let mut open = Vec::with_capacity(self.positions.len());

        'positions: for mut pos in std::mem::take(&mut self.positions) {
            pos.observe(bar.high, bar.low);
            let favorable = match pos.direction {
                Direction::Long => bar.high,
                Direction::Short => bar.low,
            };
            let adverse = match pos.direction {
                Direction::Long => bar.low,
                Direction::Short => bar.high,
            };

            if pos.take_profit_reached(favorable) {
                match &dsl.risk.take_profit {
                    Some(tp) if tp.lock_at_tp => {
                        if !pos.tp_locked {
                            let lock = pos.entry_price + pos.direction.sign() * tp.lock_offset;
                            pos.tighten_stop(lock);
                            pos.tp_locked = true;
                        }
                    }
                    _ => {
                        // Validation guarantees a TP level exists here.
                        if let Some(level) = pos.take_profit {
                            self.close_at(pos, i, ExitReason::TakeProfit, level);
                            continue 'positions;
                        }
                    }
                }
            }

            if let Some(trail) = &dsl.risk.trailing_stop {
                if !trail.only_after_tp_lock || pos.tp_locked {
                    let level = pos.best_price - pos.direction.sign() * trail.offset_points;
                    let breached = match pos.direction {
                        Direction::Long => adverse <= level,
                        Direction::Short => adverse >= level,
                    };
                    if breached {
                        self.close_at(pos, i, ExitReason::TrailingStop, level);
                        continue 'positions;
                    }
                }
            }

            if pos.stop_breached(adverse) {
                if let Some(level) = pos.stop {
                    self.close_at(pos, i, ExitReason::StopLoss, level);
                    continue 'positions;
                }
            }

            if sig.signal.exit == Some(true) {
                self.close_at(pos, i, ExitReason::RuleExit, bar.close);
                continue 'positions;
            }

            if self.compiled.exit_on_opposite_signal {
                let opposite_fires = match pos.direction {
                    Direction::Long => sig.short_fires,
                    Direction::Short => sig.long_fires,
                };
                if opposite_fires {
                    self.close_at(pos, i, ExitReason::OppositeSignal, bar.close);
                    continue 'positions;
                }
            }

            open.push(pos);
        }
        self.positions = open;
    }

    fn has_capacity(&self) -> bool {
        let open = self.positions.len() + usize::from(self.pending.is_some());
        if open >= self.dsl.risk.max_open_positions {
            return false;
        }
        open == 0 || self.dsl.risk.allow_pyramiding
    }

    fn open_position(&mut self, i: usize, direction: Direction, base_price: f64) {
        let exec = &self.dsl.execution;
        let price = base_price + direction.sign() * exec.slippage_points;
        let quantity = self.quantity_for(price, i);
        if quantity <= 0.0 {
            return;
        }

        let stop = self.dsl.risk.stop_loss.as_ref().and_then(|sl| {
            self.threshold_price(sl.kind, sl.value, sl.atr_id.as_deref(), direction, price, i, false)
        });
        let take_profit = self.dsl.risk.take_profit.as_ref().and_then(|tp| {
            self.threshold_price(tp.kind, tp.value, tp.atr_id.as_deref(), direction, price, i, true)
        });

        self.positions.push(Position::open(
            direction,
            i,
            self.bars[i].time,
            price,
            quantity,
            stop,
            take_profit,
        ));
    }

    fn quantity_for(&self, price: f64, i: usize) -> f64 {
        let exec = &self.dsl.execution;
        let lot = exec.lot_size;
        match &self.dsl.risk.sizing {
            Sizing::FixedLots { lots } => lots * lot,
            Sizing::PercentOfCapital { percent } => {
                floor_to_lot(self.equity * percent / 100.0 / price, lot)
            }
            Sizing::FixedQuantity { quantity } => floor_to_lot(*quantity, lot),
            Sizing::DynamicAtr {
                atr_id,
                risk_percent,
            } => {
                let atr = self.ctx.indicators.value(atr_id, None, i);
                if !atr.is_finite() || atr <= 0.0 {
                    return 0.0;
                }
                let risk_amount = self.equity * risk_percent / 100.0;
                floor_to_lot(risk_amount / (atr * exec.contract_multiplier), lot)
            }
        }
    }

    /// Price level for a stop or take-profit threshold. `None` when an
    /// ATR-based threshold falls inside the indicator's warm-up.
    fn threshold_price(
        &self,
        kind: ThresholdKind,
        value: f64,
        atr_id: Option<&str>,
        direction: Direction,
        entry_price: f64,
        i: usize,
        toward_profit: bool,
    ) -> Option<f64> {
        let distance = match kind {
            ThresholdKind::Points => value,
            ThresholdKind::Percent => entry_price * value / 100.0,
            ThresholdKind::Atr => {
                let atr = self.ctx.indicators.value(atr_id?, None, i);
                if !atr.is_finite() {
                    return None;
                }
                atr * value
            }
        };
        let side = if toward_profit {
            direction.sign()
        } else {
            -direction.sign()
        };
        Some(entry_price + side * distance)
    }

    fn close_at(&mut self, pos: Position, i: usize, reason: ExitReason, base_price: f64) {
        let exec = &self.dsl.execution;
        let exit_price = base_price - pos.direction.sign() * exec.slippage_points;
        let gross_pnl = pos.gross_pnl(exit_price, exec.contract_multiplier);
        let charges = exec.charges.round_trip(
            pos.entry_price,
            exit_price,
            pos.quantity,
            exec.contract_multiplier,
        );
        let net_pnl = gross_pnl - charges;
        self.equity += net_pnl;
        self.trades.push(Trade {
            direction: pos.direction,
            entry_time: pos.entry_time,
            exit_time: self.bars[i].time,
            entry_price: pos.entry_price,
            exit_price,
            quantity: pos.quantity,
            gross_pnl,
            charges,
            net_pnl,
            exit_reason: reason,
        });
    }

    fn finish(&mut self) {
        if self.bars.is_empty() {
            return;
        }
        let last = self.bars.len() - 1;
        for pos in std::mem::take(&mut self.positions) {
            self.close_at(pos, last, ExitReason::EndOfData, self.bars[last].close);
        }
        if let Some(point) = self.curve.last_mut() {
            point.equity = self.equity;
        }
    }
}

fn floor_to_lot(quantity: f64, lot: f64) -> f64 {
    if !quantity.is_finite() || quantity <= 0.0 || lot <= 0.0 {
        return 0.0;
    }
    (quantity / lot).floor() * lot
}

fn fault_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
