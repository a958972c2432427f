//! Relative Strength Index.
//!
//! Wilder's smoothing for average gain/loss:
//! - First average: simple mean over the first `period` changes
//! - Subsequent: `avg = (prev_avg * (period - 1) + current) / period`
//!
//! `RSI = 100 - 100 / (1 + avg_gain / avg_loss)`; 100 when `avg_loss == 0`.
//! Warm-up: the first `period` outputs are NaN (a change needs two bars).

/// RSI of `source` over `period` changes.
pub fn compute(source: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; source.len()];
    if period == 0 {
        return out;
    }
    let offset = match source.iter().position(|v| v.is_finite()) {
        Some(i) => i,
        None => return out,
    };
    if source.len() < offset + period + 1 {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in (offset + 1)..=(offset + period) {
        let change = source[i] - source[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss += -change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[offset + period] = rsi_value(avg_gain, avg_loss);

    for i in (offset + period + 1)..source.len() {
        let change = source[i] - source[i - 1];
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        out[i] = rsi_value(avg_gain, avg_loss);
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
