//! Differencing and lag helpers on NaN-padded, index-aligned slices.

/// `x[t] - x[t - periods]`, `NaN` where the lag is unavailable.
pub fn difference(values: &[f64], periods: usize) -> Vec<f64> {
    (0..values.len())
        .map(|t| {
            if t < periods {
                f64::NAN
            } else {
                values[t] - values[t - periods]
            }
        })
        .collect()
}

/// Row indices `t >= max_lag` where every series is finite at `t - 0..=max_lag`.
///
/// These are the usable rows of a lag-`max_lag` regression on index-aligned
/// series (the equivalent of `lagmat(..., trim="both")` after dropping gaps).
pub fn complete_lag_rows(series: &[&[f64]], max_lag: usize) -> Vec<usize> {
    let n = series.iter().map(|s| s.len()).min().unwrap_or(0);
    (max_lag..n)
        .filter(|&t| {
            series
                .iter()
                .all(|s| (0..=max_lag).all(|l| s[t - l].is_finite()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difference_pads_with_nan() {
        let d = difference(&[1.0, 2.0, 4.0, 7.0], 1);
        assert!(d[0].is_nan());
        assert_eq!(&d[1..], &[1.0, 2.0, 3.0]);

        let d4 = difference(&[1.0, 2.0, 3.0, 4.0, 6.0], 4);
        assert!(d4[..4].iter().all(|v| v.is_nan()));
        assert_eq!(d4[4], 5.0);
    }

    #[test]
    fn complete_rows_skip_gaps() {
        let a = [1.0, 2.0, f64::NAN, 4.0, 5.0, 6.0];
        let b = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        assert_eq!(complete_lag_rows(&[&a, &b], 1), vec![1, 4, 5]);
    }
}
