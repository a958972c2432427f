//! Average True Range.
//!
//! True range needs the previous close, so the first TR sample is at bar 1.
//! The first ATR is the simple mean of TR over bars `1..=period`, then
//! Wilder smoothing. Warm-up: the first `period` outputs are NaN.

use crate::domain::bar::Bar;

/// ATR over `period` true ranges.
pub fn compute(bars: &[Bar], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; bars.len()];
    if period == 0 || bars.len() < period + 1 {
        return out;
    }

    let tr = |i: usize| -> f64 {
        let bar = &bars[i];
        let prev_close = bars[i - 1].close;
        (bar.high - bar.low)
            .max((bar.high - prev_close).abs())
            .max((bar.low - prev_close).abs())
    };

    let mut atr = (1..=period).map(tr).sum::<f64>() / period as f64;
    out[period] = atr;

    for i in (period + 1)..bars.len() {
        atr = (atr * (period - 1) as f64 + tr(i)) / period as f64;
        out[i] = atr;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn make_bar(i: usize, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            time: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap()
                + chrono::Duration::minutes(15 * i as i64),
            open: close,
            high,
            low,
            close,
            volume: None,
        }
    }

    #[test]
    fn atr_constant_range() {
        // Every bar spans exactly 2 points and closes mid-range.
        let bars: Vec<Bar> = (0..10).map(|i| make_bar(i, 101.0, 99.0, 100.0)).collect();
        let out = compute(&bars, 3);
        for v in &out[..3] {
            assert!(v.is_nan());
        }
        for v in &out[3..] {
            assert_relative_eq!(*v, 2.0);
        }
    }

    #[test]
    fn atr_gap_extends_true_range() {
        let mut bars: Vec<Bar> = (0..5).map(|i| make_bar(i, 101.0, 99.0, 100.0)).collect();
        // Gap up: previous close 100, today's low 110.
        bars.push(make_bar(5, 112.0, 110.0, 111.0));
        let out = compute(&bars, 3);
        // TR for the gap bar is high - prev_close = 12.
        let expected = (out[4] * 2.0 + 12.0) / 3.0;
        assert_relative_eq!(out[5], expected);
    }

    #[test]
    fn atr_insufficient_bars() {
        let bars: Vec<Bar> = (0..3).map(|i| make_bar(i, 101.0, 99.0, 100.0)).collect();
        let out = compute(&bars, 5);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn atr_is_positive_once_valid() {
        let bars: Vec<Bar> = (0..20)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.9).sin() * 3.0;
                make_bar(i, c + 1.5, c - 1.5, c)
            })
            .collect();
        let out = compute(&bars, 5);
        for v in &out[5..] {
            assert!(*v > 0.0);
        }
    }
}
