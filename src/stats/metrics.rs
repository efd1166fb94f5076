//! Forecast error metrics and feature correlations.

use crate::domain::FeatureTable;

/// Mean absolute percentage error over pairs where both values are present.
///
/// Returns `None` when no pair is usable. A zero actual with a nonzero
/// forecast scores infinite; an exact hit scores zero.
pub fn mape(forecast: &[f64], actual: &[f64]) -> Option<f64> {
    let (sum, n) = forecast
        .iter()
        .zip(actual)
        .filter(|(f, a)| !f.is_nan() && !a.is_nan())
        .fold((0.0, 0usize), |(s, n), (f, a)| {
            let err = if f == a { 0.0 } else { (f - a).abs() / a.abs() };
            (s + err, n + 1)
        });
    (n > 0).then(|| sum / n as f64)
}

/// Pairwise Pearson correlations (pairwise-complete rows), in column order.
pub fn correlation_matrix(table: &FeatureTable) -> Vec<Vec<f64>> {
    let k = table.columns().len();
    let mut out = vec![vec![f64::NAN; k]; k];
    for i in 0..k {
        for j in i..k {
            let r = pearson(table.column_at(i), table.column_at(j));
            out[i][j] = r;
            out[j][i] = r;
        }
    }
    out
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let ma = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mb = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (x, y) in &pairs {
        cov += (x - ma) * (y - mb);
        va += (x - ma) * (x - ma);
        vb += (y - mb) * (y - mb);
    }
    cov / (va * vb).sqrt()
}
