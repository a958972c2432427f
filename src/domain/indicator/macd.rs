//! Moving Average Convergence Divergence.
//!
//! `macd = EMA(fast) - EMA(slow)`, `signal = EMA(signal_period)` of the MACD
//! line, `histogram = macd - signal`. Warm-up: `slow - 1` bars for the line,
//! plus `signal_period - 1` more for signal and histogram.

use crate::domain::indicator::ema;

/// Returns `(macd, signal, histogram)`.
pub fn compute(
    source: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let fast_ema = ema::compute(source, fast);
    let slow_ema = ema::compute(source, slow);

    let macd_line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();

    // The MACD line's leading NaNs shift the signal warm-up automatically.
    let signal = ema::compute(&macd_line, signal_period);

    let histogram: Vec<f64> = macd_line.iter().zip(&signal).map(|(m, s)| m - s).collect();

    (macd_line, signal, histogram)
}
