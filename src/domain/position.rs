//! Open-position state and completed trade records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short. P&L math multiplies by this.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    TrailingStop,
    RuleExit,
    OppositeSignal,
    EndOfData,
}

/// An open position while the simulation runs.
///
/// The protective stop is a ratchet: [`Position::tighten_stop`] only ever
/// moves it in the favorable direction, so a lock established by a
/// take-profit touch survives later adverse moves.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub direction: Direction,
    pub entry_index: usize,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub quantity: f64,
    /// Current protective stop level, if any.
    pub stop: Option<f64>,
    /// Take-profit threshold price, if any.
    pub take_profit: Option<f64>,
    /// Most favorable price seen since entry.
    pub best_price: f64,
    /// Set once the take-profit lock has fired; never cleared.
    pub tp_locked: bool,
}

impl Position {
    pub fn open(
        direction: Direction,
        entry_index: usize,
        entry_time: NaiveDateTime,
        entry_price: f64,
        quantity: f64,
        stop: Option<f64>,
        take_profit: Option<f64>,
    ) -> Self {
        Position {
            direction,
            entry_index,
            entry_time,
            entry_price,
            quantity,
            stop,
            take_profit,
            best_price: entry_price,
            tp_locked: false,
        }
    }

    /// Track the most favorable price this bar reached.
    pub fn observe(&mut self, high: f64, low: f64) {
        self.best_price = match self.direction {
            Direction::Long => self.best_price.max(high),
            Direction::Short => self.best_price.min(low),
        };
    }

    /// Move the stop to `level` only if that tightens it. Returns whether
    /// the stop actually moved.
    pub fn tighten_stop(&mut self, level: f64) -> bool {
        let moved = match (self.direction, self.stop) {
            (Direction::Long, Some(current)) => level > current,
            (Direction::Short, Some(current)) => level < current,
            (_, None) => true,
        };
        if moved {
            self.stop = Some(level);
        }
        moved
    }

    /// Whether `price` has breached the protective stop.
    pub fn stop_breached(&self, price: f64) -> bool {
        match (self.direction, self.stop) {
            (Direction::Long, Some(stop)) => price <= stop,
            (Direction::Short, Some(stop)) => price >= stop,
            (_, None) => false,
        }
    }

    /// Whether `price` has reached the take-profit threshold.
    pub fn take_profit_reached(&self, price: f64) -> bool {
        match (self.direction, self.take_profit) {
            (Direction::Long, Some(tp)) => price >= tp,
            (Direction::Short, Some(tp)) => price <= tp,
            (_, None) => false,
        }
    }

    /// Gross P&L if closed at `exit_price`.
    pub fn gross_pnl(&self, exit_price: f64, contract_multiplier: f64) -> f64 {
        (exit_price - self.entry_price) * self.direction.sign() * self.quantity * contract_multiplier
    }
}

/// One completed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub direction: Direction,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub gross_pnl: f64,
    pub charges: f64,
    pub net_pnl: f64,
    pub exit_reason: ExitReason,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap()
    }

    fn long_at(price: f64, stop: Option<f64>) -> Position {
        Position::open(Direction::Long, 0, t0(), price, 10.0, stop, None)
    }

    #[test]
    fn tighten_stop_is_monotonic_for_longs() {
        let mut pos = long_at(100.0, Some(95.0));
        assert!(pos.tighten_stop(98.0));
        assert_eq!(pos.stop, Some(98.0));
        // A looser level never wins.
        assert!(!pos.tighten_stop(96.0));
        assert_eq!(pos.stop, Some(98.0));
    }

    #[test]
    fn tighten_stop_is_monotonic_for_shorts() {
        let mut pos = Position::open(Direction::Short, 0, t0(), 100.0, 10.0, Some(105.0), None);
        pos.tighten_stop(102.0);
        assert_eq!(pos.stop, Some(102.0));
        pos.tighten_stop(104.0);
        assert_eq!(pos.stop, Some(102.0));
    }

    #[test]
    fn stop_breach_by_direction() {
        let pos = long_at(100.0, Some(95.0));
        assert!(!pos.stop_breached(96.0));
        assert!(pos.stop_breached(95.0));
        assert!(pos.stop_breached(94.0));

        let short = Position::open(Direction::Short, 0, t0(), 100.0, 10.0, Some(105.0), None);
        assert!(!short.stop_breached(104.0));
        assert!(short.stop_breached(105.0));
    }

    #[test]
    fn take_profit_reached_by_direction() {
        let pos = Position::open(Direction::Long, 0, t0(), 100.0, 10.0, None, Some(110.0));
        assert!(!pos.take_profit_reached(109.0));
        assert!(pos.take_profit_reached(110.0));

        let short = Position::open(Direction::Short, 0, t0(), 100.0, 10.0, None, Some(90.0));
        assert!(short.take_profit_reached(90.0));
        assert!(!short.take_profit_reached(91.0));
    }

    #[test]
    fn observe_tracks_favorable_extreme() {
        let mut pos = long_at(100.0, None);
        pos.observe(103.0, 99.0);
        pos.observe(101.0, 98.0);
        assert_relative_eq!(pos.best_price, 103.0);

        let mut short = Position::open(Direction::Short, 0, t0(), 100.0, 10.0, None, None);
        short.observe(103.0, 97.0);
        short.observe(104.0, 98.0);
        assert_relative_eq!(short.best_price, 97.0);
    }

    #[test]
    fn gross_pnl_signs() {
        let long = long_at(100.0, None);
        assert_relative_eq!(long.gross_pnl(105.0, 1.0), 50.0);
        assert_relative_eq!(long.gross_pnl(95.0, 1.0), -50.0);

        let short = Position::open(Direction::Short, 0, t0(), 100.0, 10.0, None, None);
        assert_relative_eq!(short.gross_pnl(95.0, 1.0), 50.0);
        assert_relative_eq!(short.gross_pnl(105.0, 2.0), -100.0);
    }

    proptest! {
        #[test]
        fn ratchet_is_monotonic_over_random_paths(
            long in any::<bool>(),
            path in proptest::collection::vec(50.0f64..150.0, 1..40),
        ) {
            let direction = if long { Direction::Long } else { Direction::Short };
            let mut pos = Position::open(direction, 0, t0(), 100.0, 1.0, None, None);
            let mut prev_stop: Option<f64> = None;
            let mut prev_best = pos.best_price;

            for level in path {
                pos.observe(level + 1.0, level - 1.0);
                pos.tighten_stop(level);
                let stop = pos.stop.unwrap();
                if let Some(prev) = prev_stop {
                    match direction {
                        Direction::Long => {
                            prop_assert!(stop >= prev);
                            prop_assert!(pos.best_price >= prev_best);
                        }
                        Direction::Short => {
                            prop_assert!(stop <= prev);
                            prop_assert!(pos.best_price <= prev_best);
                        }
                    }
                }
                prev_stop = Some(stop);
                prev_best = pos.best_price;
            }
        }
    }
}
