//! Aggregate performance statistics over a finished run.

use serde::{Deserialize, Serialize};

use crate::domain::backtest::EquityPoint;
use crate::domain::position::Trade;

/// Headline statistics computed from the trade list and equity curve.
///
/// Ratios are fractions, not percentages. `profit_factor` is infinite for a
/// run with profits and no losses, and zero for a run with no profits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestSummary {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub gross_profit: f64,
    /// Sum of losing trades' losses, as a positive magnitude.
    pub gross_loss: f64,
    pub net_pnl: f64,
    pub total_charges: f64,
    pub profit_factor: f64,
    /// Worst peak-to-trough equity decline, as a fraction of the peak.
    pub max_drawdown: f64,
    pub best_trade: Option<Trade>,
    pub worst_trade: Option<Trade>,
    pub final_equity: f64,
}

impl BacktestSummary {
    pub fn compute(trades: &[Trade], equity_curve: &[EquityPoint], initial_capital: f64) -> Self {
        let total_trades = trades.len();
        let mut winning_trades = 0;
        let mut losing_trades = 0;
        let mut gross_profit = 0.0;
        let mut gross_loss = 0.0;
        let mut net_pnl = 0.0;
        let mut total_charges = 0.0;
        let mut best_trade: Option<&Trade> = None;
        let mut worst_trade: Option<&Trade> = None;

        for trade in trades {
            net_pnl += trade.net_pnl;
            total_charges += trade.charges;
            if trade.net_pnl > 0.0 {
                winning_trades += 1;
                gross_profit += trade.net_pnl;
            } else if trade.net_pnl < 0.0 {
                losing_trades += 1;
                gross_loss += -trade.net_pnl;
            }
            if best_trade.is_none_or(|b| trade.net_pnl > b.net_pnl) {
                best_trade = Some(trade);
            }
            if worst_trade.is_none_or(|w| trade.net_pnl < w.net_pnl) {
                worst_trade = Some(trade);
            }
        }

        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };
        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let mut peak = initial_capital;
        let mut max_drawdown = 0.0f64;
        for point in equity_curve {
            peak = peak.max(point.equity);
            if peak > 0.0 {
                max_drawdown = max_drawdown.max((peak - point.equity) / peak);
            }
        }

        let final_equity = equity_curve
            .last()
            .map_or(initial_capital, |p| p.equity);

        BacktestSummary {
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            gross_profit,
            gross_loss,
            net_pnl,
            total_charges,
            profit_factor,
            max_drawdown,
            best_trade: best_trade.cloned(),
            worst_trade: worst_trade.cloned(),
            final_equity,
        }
    }
}
