//! Stochastic oscillator.
//!
//! `%K = 100 * (close - lowest_low) / (highest_high - lowest_low)` over
//! `k_period` bars; `%D` is an SMA of `%K` over `d_period`. A flat window
//! (highest == lowest) yields 50. Warm-up: `k_period - 1` bars for %K,
//! plus `d_period - 1` more for %D.

use crate::domain::bar::Bar;
use crate::domain::indicator::sma;

/// Returns `(%K, %D)`.
pub fn compute(bars: &[Bar], k_period: usize, d_period: usize) -> (Vec<f64>, Vec<f64>) {
    let mut k = vec![f64::NAN; bars.len()];
    if k_period == 0 {
        return (k.clone(), k);
    }

    for i in (k_period - 1)..bars.len() {
        let window = &bars[i + 1 - k_period..=i];
        let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let range = highest - lowest;
        k[i] = if range == 0.0 {
            50.0
        } else {
            100.0 * (bars[i].close - lowest) / range
        };
    }

    let d = sma::compute(&k, d_period);
    (k, d)
}
