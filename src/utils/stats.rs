//! Order statistics over f64 slices
//!
//! Quantiles use linear interpolation between closest ranks, the same rule
//! numpy's `percentile` applies by default, so medians of even-length inputs
//! are the mean of the two middle values.

/// Quantile `q` in [0, 1] of an ascending-sorted slice.
///
/// Returns `None` for an empty slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    let (a, b) = (sorted[lo], sorted[hi]);
    if lo == hi || frac == 0.0 {
        return Some(a);
    }
    let value = a + (b - a) * frac;
    if !value.is_finite() {
        // b - a overflowed
        return Some(a * (1.0 - frac) + b * frac);
    }
    Some(value)
}

/// Quantile `q` of unsorted values. NaNs are ignored.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, q)
}

/// Median of unsorted values. NaNs are ignored.
pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_median_empty() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[f64::NAN]), None);
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let values: Vec<f64> = (1..=5).map(|v| v as f64).collect();
        assert_eq!(quantile(&values, 0.25), Some(2.0));
        assert_eq!(quantile(&values, 0.75), Some(4.0));
        // pos = 0.9 * 4 = 3.6 -> 4 + 0.6 * (5 - 4)
        let q = quantile(&values, 0.9).unwrap();
        assert!((q - 4.6).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_single_value() {
        assert_eq!(quantile(&[7.5], 0.98), Some(7.5));
    }

    #[test]
    fn test_quantile_wide_range() {
        let values = [-1e308, 1e308];
        assert_eq!(quantile(&values, 0.0), Some(-1e308));
        assert_eq!(quantile(&values, 0.5), Some(0.0));
        assert_eq!(quantile(&values, 1.0), Some(1e308));
    }
}
