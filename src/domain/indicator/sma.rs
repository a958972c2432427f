//! Simple moving average.
//!
//! Warm-up: the first `period - 1` outputs are NaN. A source with its own
//! leading NaNs (a chained indicator) shifts the warm-up by that offset.

/// Rolling mean of `source` over `period` values.
pub fn compute(source: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; source.len()];
    if period == 0 {
        return out;
    }
    let offset = match source.iter().position(|v| v.is_finite()) {
        Some(i) => i,
        None => return out,
    };

    let mut window_sum = 0.0;
    for i in offset..source.len() {
        window_sum += source[i];
        if i >= offset + period {
            window_sum -= source[i - period];
        }
        if i + 1 >= offset + period {
            out[i] = window_sum / period as f64;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sma_basic() {
        let source = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = compute(&source, 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_relative_eq!(out[2], 2.0);
        assert_relative_eq!(out[3], 3.0);
        assert_relative_eq!(out[4], 4.0);
    }

    #[test]
    fn sma_period_one_equals_source() {
        let source = [5.0, 7.0, 9.0];
        let out = compute(&source, 1);
        assert_eq!(out, vec![5.0, 7.0, 9.0]);
    }

    #[test]
    fn sma_zero_period_all_nan() {
        let out = compute(&[1.0, 2.0], 0);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn sma_shorter_than_period() {
        let out = compute(&[1.0, 2.0], 5);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn sma_leading_nans_shift_warmup() {
        let source = [f64::NAN, f64::NAN, 3.0, 4.0, 5.0];
        let out = compute(&source, 2);
        assert!(out[2].is_nan());
        assert_relative_eq!(out[3], 3.5);
        assert_relative_eq!(out[4], 4.5);
    }

    #[test]
    fn sma_all_nan_source() {
        let out = compute(&[f64::NAN, f64::NAN], 2);
        assert!(out.iter().all(|v| v.is_nan()));
    }
}
