//! Raw feature cleanup before the guide is built.
//!
//! Indicators start at different dates and are published with lags, so the
//! raw table is ragged at both ends. We keep the columns that are available at
//! the chosen start year and carry their last observation forward.

use tracing::debug;

use crate::domain::{FeatureTable, Quarter};
use crate::error::Result;

/// Trim to `min_year`, drop columns missing in the first row, forward-fill,
/// then drop any column that is still incomplete.
pub fn prepare_features(table: &FeatureTable, min_year: Option<i32>) -> Result<FeatureTable> {
    let table = match min_year {
        Some(year) => table.truncate_before(Quarter::new(year, 1)?),
        None => table.clone(),
    };
    if table.is_empty() {
        return Ok(table);
    }

    let mut keep = Vec::new();
    let mut values = Vec::new();
    for (idx, name) in table.columns().iter().enumerate() {
        let column = table.column_at(idx);
        if column[0].is_nan() {
            debug!(column = %name, "dropped: missing at start");
            continue;
        }
        let filled = forward_fill(column);
        if filled.iter().any(|v| v.is_nan()) {
            debug!(column = %name, "dropped: incomplete after forward fill");
            continue;
        }
        keep.push(name.clone());
        values.push(filled);
    }
    FeatureTable::new(table.start(), keep, values)
}

pub fn forward_fill(values: &[f64]) -> Vec<f64> {
    let mut last = f64::NAN;
    values
        .iter()
        .map(|v| {
            if !v.is_nan() {
                last = *v;
            }
            last
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_late_starters_and_fills_gaps() {
        let t = FeatureTable::new(
            Quarter::new(1999, 3).unwrap(),
            vec!["Early".into(), "Late".into(), "Gappy".into()],
            vec![
                vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
                vec![f64::NAN, f64::NAN, f64::NAN, 3.0, 4.0, 5.0],
                vec![9.0, f64::NAN, 10.0, 11.0, f64::NAN, f64::NAN],
            ],
        )
        .unwrap();

        let out = prepare_features(&t, Some(2000)).unwrap();
        assert_eq!(out.start(), Quarter::new(2000, 1).unwrap());
        assert_eq!(out.columns(), &["Early".to_string(), "Gappy".to_string()]);
        assert_eq!(out.column("Gappy").unwrap(), &[10.0, 11.0, 11.0, 11.0]);
        assert!(!out.has_missing());
    }

    #[test]
    fn forward_fill_keeps_leading_gaps() {
        let v = forward_fill(&[f64::NAN, 1.0, f64::NAN]);
        assert!(v[0].is_nan());
        assert_eq!(&v[1..], &[1.0, 1.0]);
    }
}
