//! Reversible scaling pipeline driven by a `StationarityGuide`.
//!
//! Forward: log (or divide by `norm`), then `ndiffs` differences of period
//! `periods`.
//!
//! Inverse: rebuild each differencing level by a cumulative walk over a
//! contiguous quarterly array covering both the input and the fitted baseline:
//!
//! ```text
//! level_k[t] = diff_{k+1}[t] + level_k[t - periods]   (t >= first input row)
//! level_k[t] = baseline_k[t]                          (before it, the seed)
//! ```
//!
//! The pipeline is a value: `fit` returns a new fitted pipeline and the
//! guide/baseline are shared behind `Arc`, so clones handed to worker threads
//! can never mutate each other.

use std::sync::Arc;

use crate::domain::{FeatureTable, GuideEntry, StationarityGuide, union_range};
use crate::error::{ForecastError, Result};
use crate::math::difference;

#[derive(Debug, Clone)]
pub struct TransformPipeline {
    guide: Arc<StationarityGuide>,
    baseline: Option<Arc<FeatureTable>>,
}

impl TransformPipeline {
    pub fn new(guide: StationarityGuide) -> Self {
        Self {
            guide: Arc::new(guide),
            baseline: None,
        }
    }

    pub fn guide(&self) -> &StationarityGuide {
        &self.guide
    }

    pub fn baseline(&self) -> Option<&FeatureTable> {
        self.baseline.as_deref()
    }

    pub fn is_fitted(&self) -> bool {
        self.baseline.is_some()
    }

    /// Snapshot `table` as the baseline, returning the fitted pipeline.
    pub fn fit(&self, table: &FeatureTable) -> Result<Self> {
        if let Some(unknown) = table.columns().iter().find(|c| !self.guide.contains(c)) {
            return Err(ForecastError::UnknownColumn(unknown.clone()));
        }
        Ok(Self {
            guide: Arc::clone(&self.guide),
            baseline: Some(Arc::new(table.clone())),
        })
    }

    pub fn fit_transform(&self, table: &FeatureTable) -> Result<(Self, FeatureTable)> {
        let fitted = self.fit(table)?;
        let scaled = fitted.transform(table)?;
        Ok((fitted, scaled))
    }

    fn entry(&self, column: &str) -> Result<&GuideEntry> {
        self.guide
            .get(column)
            .ok_or_else(|| ForecastError::UnknownColumn(column.to_string()))
    }

    fn require_baseline(&self) -> Result<&FeatureTable> {
        self.baseline.as_deref().ok_or(ForecastError::NotFitted)
    }

    /// Scale and difference every column; leading/trailing all-`NaN` rows are dropped.
    pub fn transform(&self, table: &FeatureTable) -> Result<FeatureTable> {
        self.require_baseline()?;
        let mut columns = Vec::with_capacity(table.columns().len());
        let mut values = Vec::with_capacity(table.columns().len());
        for (idx, name) in table.columns().iter().enumerate() {
            let entry = self.entry(name)?;
            let mut v = scale(entry, table.column_at(idx));
            for _ in 0..entry.ndiffs {
                v = difference(&v, entry.periods);
            }
            columns.push(name.clone());
            values.push(v);
        }
        Ok(FeatureTable::new(table.start(), columns, values)?.trim_all_nan())
    }

    /// Undo `transform` for a table overlapping the baseline in time.
    ///
    /// The output has the input's index and columns, in original units.
    pub fn inverse_transform(&self, table: &FeatureTable) -> Result<FeatureTable> {
        let baseline = self.require_baseline()?;
        let (ustart, ulen) = union_range(baseline, table);
        let input_offset = ustart.quarters_until(table.start()) as usize;
        let input_rows = input_offset..input_offset + table.len();

        let mut values = Vec::with_capacity(table.columns().len());
        for (idx, name) in table.columns().iter().enumerate() {
            let entry = self.entry(name)?;
            let base = baseline
                .column(name)
                .ok_or_else(|| ForecastError::UnknownColumn(name.clone()))?;
            let base_offset = ustart.quarters_until(baseline.start()) as usize;

            let mut base_level = vec![f64::NAN; ulen];
            base_level[base_offset..base_offset + base.len()].copy_from_slice(&scale(entry, base));

            let mut current = vec![f64::NAN; ulen];
            current[input_rows.clone()].copy_from_slice(table.column_at(idx));

            for k in (0..entry.ndiffs).rev() {
                let mut seed = base_level.clone();
                for _ in 0..k {
                    seed = difference(&seed, entry.periods);
                }
                current = integrate(name, &current, &seed, entry.periods, &input_rows)?;
            }

            values.push(current[input_rows.clone()].iter().map(|v| unscale(entry, *v)).collect());
        }
        FeatureTable::new(table.start(), table.columns().to_vec(), values)
    }
}

/// One inverse-differencing step over the union index.
///
/// `diffs` holds the differenced input on `input_rows` (`NaN` elsewhere);
/// `seed` is the baseline at the target level. Returns the target level on
/// `input_rows` (`NaN` elsewhere).
fn integrate(
    name: &str,
    diffs: &[f64],
    seed: &[f64],
    periods: usize,
    input_rows: &std::ops::Range<usize>,
) -> Result<Vec<f64>> {
    let overlap = input_rows
        .clone()
        .any(|t| diffs[t].is_finite() && seed[t].is_finite());
    if !overlap {
        return Err(ForecastError::NoOverlap(name.to_string()));
    }
    let start = input_rows
        .clone()
        .find(|&t| diffs[t].is_finite())
        .unwrap_or(input_rows.end);

    let mut level = vec![f64::NAN; diffs.len()];
    for t in 0..input_rows.end {
        level[t] = if t < start || !diffs[t].is_finite() {
            seed[t]
        } else if t >= periods {
            diffs[t] + level[t - periods]
        } else {
            f64::NAN
        };
    }
    for (t, v) in level.iter_mut().enumerate() {
        if !input_rows.contains(&t) {
            *v = f64::NAN;
        }
    }
    Ok(level)
}

fn scale(entry: &GuideEntry, values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .map(|v| if entry.loggable { v.ln() } else { v / entry.norm })
        .collect()
}

fn unscale(entry: &GuideEntry, value: f64) -> f64 {
    if entry.loggable {
        value.exp()
    } else {
        value * entry.norm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Quarter;
    use approx::assert_relative_eq;

    fn q(y: i32, n: u8) -> Quarter {
        Quarter::new(y, n).unwrap()
    }

    fn entry(variable: &str, loggable: bool, norm: f64, ndiffs: usize, periods: usize) -> GuideEntry {
        GuideEntry {
            variable: variable.to_string(),
            loggable,
            norm,
            ndiffs,
            periods,
        }
    }

    fn baseline() -> FeatureTable {
        let n = 24;
        let a: Vec<f64> = (0..n).map(|i| 100.0 * 1.02f64.powi(i) + (i % 4) as f64).collect();
        let b: Vec<f64> = (0..n).map(|i| (i as f64 * 0.7).sin() * 50.0 - 10.0).collect();
        let c: Vec<f64> = (0..n).map(|i| 5.0 + 0.3 * (i * i) as f64).collect();
        FeatureTable::new(q(2015, 1), vec!["A".into(), "B".into(), "C".into()], vec![a, b, c]).unwrap()
    }

    fn pipeline() -> TransformPipeline {
        TransformPipeline::new(StationarityGuide::from_entries([
            entry("A", true, 1.0, 1, 4),
            entry("B", false, 10.0, 1, 1),
            entry("C", true, 1.0, 2, 1),
        ]))
    }

    #[test]
    fn scenario_norm_and_first_difference() {
        let guide = StationarityGuide::from_entries([entry("X", false, 100.0, 1, 1)]);
        let t = FeatureTable::new(q(2020, 1), vec!["X".into()], vec![vec![100.0, 110.0, 121.0, 133.1]])
            .unwrap();
        let (fitted, scaled) = TransformPipeline::new(guide).fit_transform(&t).unwrap();

        // The leading all-NaN row is dropped.
        assert_eq!(scaled.start(), q(2020, 2));
        let x = scaled.column("X").unwrap();
        assert_relative_eq!(x[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(x[1], 0.11, epsilon = 1e-12);
        assert_relative_eq!(x[2], 0.121, epsilon = 1e-12);

        let back = fitted.inverse_transform(&scaled).unwrap();
        for (got, want) in back.column("X").unwrap().iter().zip(&[110.0, 121.0, 133.1]) {
            assert_relative_eq!(*got, *want, max_relative = 1e-9);
        }
    }

    #[test]
    fn round_trip_recovers_baseline() {
        let base = baseline();
        let (fitted, scaled) = pipeline().fit_transform(&base).unwrap();
        let back = fitted.inverse_transform(&scaled).unwrap();
        for name in ["A", "B", "C"] {
            for (q, v) in back.quarters().zip(back.column(name).unwrap()) {
                let want = base.get(name, q).unwrap();
                assert_relative_eq!(*v, want, max_relative = 1e-6);
            }
        }
    }

    #[test]
    fn forecast_continuation_extends_history() {
        // Extending the differenced series with constant growth continues the level.
        let guide = StationarityGuide::from_entries([entry("A", true, 1.0, 1, 1)]);
        let hist: Vec<f64> = (0..8).map(|i| 100.0 * 1.05f64.powi(i)).collect();
        let t = FeatureTable::new(q(2018, 1), vec!["A".into()], vec![hist]).unwrap();
        let (fitted, scaled) = TransformPipeline::new(guide).fit_transform(&t).unwrap();

        let future = FeatureTable::new(q(2020, 1), vec!["A".into()], vec![vec![1.05f64.ln(); 4]]).unwrap();
        let joined = scaled.append(&future).unwrap();
        let back = fitted.inverse_transform(&joined).unwrap();
        let last = back.get("A", q(2020, 4)).unwrap();
        assert_relative_eq!(last, 100.0 * 1.05f64.powi(11), max_relative = 1e-9);
    }

    #[test]
    fn unfitted_pipeline_refuses() {
        let p = pipeline();
        assert_eq!(p.transform(&baseline()).unwrap_err(), ForecastError::NotFitted);
        assert_eq!(p.inverse_transform(&baseline()).unwrap_err(), ForecastError::NotFitted);
    }

    #[test]
    fn fit_rejects_unknown_columns() {
        let t = FeatureTable::new(q(2015, 1), vec!["Z".into()], vec![vec![1.0]]).unwrap();
        assert_eq!(
            pipeline().fit(&t).unwrap_err(),
            ForecastError::UnknownColumn("Z".into())
        );
    }

    #[test]
    fn inverse_without_overlap_fails() {
        let fitted = pipeline().fit(&baseline()).unwrap();
        let far = FeatureTable::new(q(2040, 1), vec!["B".into()], vec![vec![0.1, 0.2]]).unwrap();
        assert_eq!(
            fitted.inverse_transform(&far).unwrap_err(),
            ForecastError::NoOverlap("B".into())
        );
    }

    #[test]
    fn shared_normalization_across_tables() {
        // Transforming a later window of the same data yields the same values.
        let base = baseline();
        let fitted = pipeline().fit(&base).unwrap();
        let full = fitted.transform(&base).unwrap();
        let tail = fitted.transform(&base.truncate_before(q(2018, 1))).unwrap();
        let b_full = full.get("B", q(2019, 3)).unwrap();
        let b_tail = tail.get("B", q(2019, 3)).unwrap();
        assert_relative_eq!(b_full, b_tail, epsilon = 1e-12);
    }
}
