//! Bollinger Bands.
//!
//! Middle band is an SMA; upper/lower are `mult` population standard
//! deviations away. Warm-up matches the SMA: `period - 1` bars.

use crate::domain::indicator::sma;

/// Returns `(upper, middle, lower)` bands over `period` values.
pub fn compute(source: &[f64], period: usize, mult: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let middle = sma::compute(source, period);
    let mut upper = vec![f64::NAN; source.len()];
    let mut lower = vec![f64::NAN; source.len()];

    for i in 0..source.len() {
        if middle[i].is_nan() {
            continue;
        }
        let window = &source[i + 1 - period..=i];
        let mean = middle[i];
        let variance =
            window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / period as f64;
        let dev = variance.sqrt() * mult;
        upper[i] = mean + dev;
        lower[i] = mean - dev;
    }
    (upper, middle, lower)
}
