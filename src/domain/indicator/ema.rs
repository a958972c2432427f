//! Exponential moving average.
//!
//! Seeded with the simple mean of the first `period` values, then
//! `ema = alpha * value + (1 - alpha) * prev` with `alpha = 2 / (period + 1)`.
//! `period == 1` makes alpha 1, so the output equals the source exactly.

/// EMA of `source` over `period` values. First `period - 1` outputs NaN,
/// shifted by any leading NaNs in the source.
pub fn compute(source: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; source.len()];
    if period == 0 {
        return out;
    }
    let offset = match source.iter().position(|v| v.is_finite()) {
        Some(i) => i,
        None => return out,
    };
    if source.len() < offset + period {
        return out;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let seed_end = offset + period;
    let seed = source[offset..seed_end].iter().sum::<f64>() / period as f64;
    out[seed_end - 1] = seed;

    let mut prev = seed;
    for i in seed_end..source.len() {
        prev = alpha * source[i] + (1.0 - alpha) * prev;
        out[i] = prev;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ema_seeded_with_sma() {
        let source = [2.0, 4.0, 6.0, 8.0];
        let out = compute(&source, 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_relative_eq!(out[2], 4.0);
        // alpha = 0.5: 0.5*8 + 0.5*4 = 6
        assert_relative_eq!(out[3], 6.0);
    }

    #[test]
    fn ema_period_one_equals_source() {
        let source = [3.0, 1.0, 4.0, 1.0, 5.0];
        let out = compute(&source, 1);
        assert_eq!(out, source.to_vec());
    }

    #[test]
    fn ema_leading_nans() {
        let source = [f64::NAN, 2.0, 4.0, 6.0];
        let out = compute(&source, 2);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_relative_eq!(out[2], 3.0);
    }

    #[test]
    fn ema_constant_series_converges_to_constant() {
        let source = [50.0; 20];
        let out = compute(&source, 5);
        for v in &out[4..] {
            assert_relative_eq!(*v, 50.0);
        }
    }

    #[test]
    fn ema_insufficient_data() {
        let out = compute(&[1.0, 2.0], 5);
        assert!(out.iter().all(|v| v.is_nan()));
    }
}
