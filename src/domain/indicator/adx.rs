//! Average Directional Index.
//!
//! Wilder's construction: directional movement (+DM/-DM) and true range are
//! smoothed over `period` bars, the directional indices +DI/-DI give
//! `DX = 100 * |+DI - -DI| / (+DI + -DI)`, and ADX is Wilder's average of DX
//! over another `period` bars. Warm-up: `2 * period - 1` bars.

use crate::domain::bar::Bar;

/// ADX over `period` bars.
pub fn compute(bars: &[Bar], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; bars.len()];
    if period == 0 || bars.len() < 2 * period {
        return out;
    }

    let n = bars.len();
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    let mut tr = vec![0.0; n];

    for i in 1..n {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
        let prev_close = bars[i - 1].close;
        tr[i] = (bars[i].high - bars[i].low)
            .max((bars[i].high - prev_close).abs())
            .max((bars[i].low - prev_close).abs());
    }

    // Wilder running sums, seeded over bars 1..=period.
    let mut sm_plus = plus_dm[1..=period].iter().sum::<f64>();
    let mut sm_minus = minus_dm[1..=period].iter().sum::<f64>();
    let mut sm_tr = tr[1..=period].iter().sum::<f64>();

    let mut dx = vec![f64::NAN; n];
    dx[period] = dx_value(sm_plus, sm_minus, sm_tr);

    for i in (period + 1)..n {
        sm_plus = sm_plus - sm_plus / period as f64 + plus_dm[i];
        sm_minus = sm_minus - sm_minus / period as f64 + minus_dm[i];
        sm_tr = sm_tr - sm_tr / period as f64 + tr[i];
        dx[i] = dx_value(sm_plus, sm_minus, sm_tr);
    }

    // ADX: mean of the first `period` DX values, then Wilder smoothing.
    let first_adx_idx = 2 * period - 1;
    if first_adx_idx >= n {
        return out;
    }
    let mut adx = dx[period..=first_adx_idx].iter().sum::<f64>() / period as f64;
    out[first_adx_idx] = adx;

    for i in (first_adx_idx + 1)..n {
        adx = (adx * (period - 1) as f64 + dx[i]) / period as f64;
        out[i] = adx;
    }
    out
}

fn dx_value(sm_plus: f64, sm_minus: f64, sm_tr: f64) -> f64 {
    if sm_tr == 0.0 {
        return 0.0;
    }
    let plus_di = 100.0 * sm_plus / sm_tr;
    let minus_di = 100.0 * sm_minus / sm_tr;
    let sum = plus_di + minus_di;
    if sum == 0.0 {
        0.0
    } else {
        100.0 * (plus_di - minus_di).abs() / sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn adx_warmup_length() {
        let bars: Vec<Bar> = (0..30)
            .map(|i| {
                let c = 100.0 + i as f64;
                make_bar(i, c + 1.0, c - 1.0, c)
            })
            .collect();
        let out = compute(&bars, 5);
        for i in 0..9 {
            assert!(out[i].is_nan(), "bar {i} should be warm-up");
        }
        assert!(out[9].is_finite());
    }

    #[test]
    fn adx_strong_trend_is_high() {
        // Relentless uptrend: every bar makes a higher high and higher low.
        let bars: Vec<Bar> = (0..40)
            .map(|i| {
                let c = 100.0 + 2.0 * i as f64;
                make_bar(i, c + 1.0, c - 1.0, c)
            })
            .collect();
        let out = compute(&bars, 5);
        assert!(out[39] > 60.0, "strong trend should read high, got {}", out[39]);
    }

    #[test]
    fn adx_in_range() {
        let bars: Vec<Bar> = (0..60)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.7).sin() * 6.0;
                make_bar(i, c + 1.5, c - 1.5, c)
            })
            .collect();
        let out = compute(&bars, 7);
        for v in out {
            assert!(v.is_nan() || (0.0..=100.0).contains(&v));
        }
    }

    #[test]
    fn adx_insufficient_bars() {
        let bars: Vec<Bar> = (0..5).map(|i| make_bar(i, 101.0, 99.0, 100.0)).collect();
        let out = compute(&bars, 5);
        assert!(out.iter().all(|v| v.is_nan()));
    }
}
