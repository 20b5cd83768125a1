//! Percentile via partial selection
//!
//! Only the `ceil(k) + 1` smallest values are brought to the front of the
//! buffer (`select_nth_unstable_by`); no full ordering is materialized.

use std::cmp::Ordering;

/// Percentile of `data` (0-100), optionally interpolating between ranks
///
/// `data` is reordered in place. Returns NaN for empty input or a percentile
/// outside `[0, 100]`.
///
/// # Example
///
/// ```rust
/// use kuba_graphite::stats::percentile;
///
/// let mut data = vec![5.0, 1.0, 4.0, 2.0, 3.0];
/// assert_eq!(percentile(&mut data, 50.0, true), 3.0);
/// ```
pub fn percentile(data: &mut [f64], percent: f64, interpolate: bool) -> f64 {
    if data.is_empty() || !(0.0..=100.0).contains(&percent) {
        return f64::NAN;
    }
    if data.len() == 1 {
        return data[0];
    }

    let k = (data.len() - 1) as f64 * percent / 100.0;
    let length = (k.ceil() as usize + 1).min(data.len());

    data.select_nth_unstable_by(length - 1, cmp_f64);

    let mut top = f64::NEG_INFINITY;
    let mut second_top = f64::NEG_INFINITY;
    for &v in &data[..length] {
        if v > top {
            second_top = top;
            top = v;
        } else if v > second_top {
            second_top = v;
        }
    }

    let remainder = k - k.trunc();
    if remainder == 0.0 || !interpolate {
        top
    } else {
        top * remainder + second_top * (1.0 - remainder)
    }
}

/// Percentile over an iterator of present values
pub fn percentile_of<I>(values: I, percent: f64, interpolate: bool) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut buf: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    percentile(&mut buf, percent, interpolate)
}

fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_exact_rank() {
        let mut data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&mut data, 50.0, true), 3.0);
    }

    #[test]
    fn test_empty_is_nan() {
        assert!(percentile(&mut [], 50.0, true).is_nan());
        assert!(percentile(&mut [], 0.0, false).is_nan());
    }

    #[test]
    fn test_out_of_range_is_nan() {
        assert!(percentile(&mut [1.0, 2.0], 101.0, false).is_nan());
        assert!(percentile(&mut [1.0, 2.0], -1.0, false).is_nan());
    }

    #[test]
    fn test_single_value() {
        assert_eq!(percentile(&mut [7.0], 90.0, true), 7.0);
    }

    #[test]
    fn test_interpolation() {
        // k = 3 * 0.5 = 1.5 -> between 2 and 3
        let mut data = vec![4.0, 3.0, 2.0, 1.0];
        assert_eq!(percentile(&mut data, 50.0, true), 2.5);

        let mut data = vec![4.0, 3.0, 2.0, 1.0];
        assert_eq!(percentile(&mut data, 50.0, false), 3.0);
    }

    #[test]
    fn test_extremes() {
        let mut data = vec![9.0, 1.0, 5.0];
        assert_eq!(percentile(&mut data, 100.0, true), 9.0);
        let mut data = vec![9.0, 1.0, 5.0];
        assert_eq!(percentile(&mut data, 0.0, true), 1.0);
    }

    #[test]
    fn test_ties() {
        let mut data = vec![2.0, 2.0, 2.0, 8.0];
        assert_eq!(percentile(&mut data, 50.0, true), 2.0);
    }

    #[test]
    fn test_percentile_of_skips_nan() {
        let p = percentile_of(vec![f64::NAN, 1.0, 3.0], 50.0, true);
        assert_eq!(p, 2.0);
    }
}
