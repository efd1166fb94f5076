//! Rolling-origin (expanding window) evaluation of one candidate.
//!
//! Splits follow the usual time-series convention: with `n` usable rows and
//! `N` splits, every test fold has `n / (N + 1)` rows and fold `i` starts at
//! `n - (N - i) * test_size`; its training window is everything before that.
//!
//! Per fold:
//! 1. fit the VAR on the training rows only
//! 2. forecast exactly the test length (exog taken from the test rows)
//! 3. unscale forecast and actual, score MAPE per endog column
//!
//! The overall score is the MAPE of the concatenated folds.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::domain::{FeatureTable, FitCandidate, FitResult, Quarter};
use crate::error::{ForecastError, Result};
use crate::fit::var::{VarModel, VarSpec};
use crate::stats::mape;
use crate::transform::TransformPipeline;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Range<usize>,
    pub test: Range<usize>,
}

/// Chronological, non-overlapping test folds over `n` rows.
pub fn time_series_splits(n: usize, n_splits: usize) -> Result<Vec<Split>> {
    if n_splits == 0 {
        return Err(ForecastError::InvalidInput("n_splits must be >= 1".to_string()));
    }
    let test_size = n / (n_splits + 1);
    if test_size == 0 {
        return Err(ForecastError::InsufficientData(format!(
            "{n} rows cannot form {n_splits} test folds"
        )));
    }
    Ok((0..n_splits)
        .map(|i| {
            let start = n - (n_splits - i) * test_size;
            Split {
                train: 0..start,
                test: start..start + test_size,
            }
        })
        .collect())
}

/// One evaluated fold, in original units.
#[derive(Debug, Clone)]
pub struct Fold {
    pub train_end: Quarter,
    pub forecast: FeatureTable,
    pub actual: FeatureTable,
}

impl Fold {
    pub fn test_start(&self) -> Quarter {
        self.actual.start()
    }
}

/// Evaluate every fold of `candidate` in time order.
pub fn evaluate_folds(
    unscaled: &FeatureTable,
    pipeline: &TransformPipeline,
    candidate: &FitCandidate,
    n_splits: usize,
) -> Result<Vec<Fold>> {
    let spec = VarSpec::from_candidate(candidate);
    let truncated = unscaled
        .truncate_after(candidate.max_fit_date)
        .select(&spec.columns())?;
    let (fitted, scaled) = pipeline.fit_transform(&truncated)?;
    let data = scaled.trim_incomplete();

    let mut folds = Vec::with_capacity(n_splits);
    for split in time_series_splits(data.len(), n_splits)? {
        let train = data.slice_rows(split.train.clone());
        let test = data.slice_rows(split.test.clone());
        let train_end = train.end().ok_or_else(|| {
            ForecastError::InsufficientData("empty training window".to_string())
        })?;

        let model = VarModel::fit(&train, spec.clone())?;
        let train_endog = train.select(&spec.endog)?;
        let projected = model.forecast(&train_endog, Some(&test), test.len())?;

        let forecast = fitted
            .inverse_transform(&train_endog.append(&projected)?)?
            .truncate_before(test.start());
        let actual = fitted.inverse_transform(&test.select(&spec.endog)?)?;
        folds.push(Fold {
            train_end,
            forecast,
            actual,
        });
    }
    Ok(folds)
}

/// Score `candidate`; the ranking key is the primary endog's overall MAPE.
pub fn walk_forward(
    unscaled: &FeatureTable,
    pipeline: &TransformPipeline,
    candidate: &FitCandidate,
    n_splits: usize,
) -> Result<FitResult> {
    let folds = evaluate_folds(unscaled, pipeline, candidate, n_splits)?;

    let mut mape_per_split = Vec::with_capacity(folds.len());
    let mut all_forecast: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut all_actual: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for fold in &folds {
        let mut scores = BTreeMap::new();
        for name in &candidate.endog_cols {
            let f = fold.forecast.require_column(name)?;
            let a = fold.actual.require_column(name)?;
            scores.insert(name.clone(), mape(f, a).unwrap_or(f64::NAN));
            all_forecast.entry(name.clone()).or_default().extend_from_slice(f);
            all_actual.entry(name.clone()).or_default().extend_from_slice(a);
        }
        mape_per_split.push(scores);
    }

    let mape_overall: BTreeMap<String, f64> = all_forecast
        .iter()
        .map(|(name, f)| {
            let a = all_actual.get(name).map(Vec::as_slice).unwrap_or_default();
            (name.clone(), mape(f, a).unwrap_or(f64::NAN))
        })
        .collect();

    // An infinite score (zero actual) is kept so it ranks last.
    let target_mape = mape_overall
        .get(candidate.primary())
        .copied()
        .filter(|m| !m.is_nan())
        .ok_or_else(|| {
            ForecastError::InsufficientData(format!(
                "no scorable out-of-sample values for `{}`",
                candidate.primary()
            ))
        })?;

    Ok(FitResult {
        candidate: candidate.clone(),
        mape_per_split,
        mape_overall,
        target_mape,
    })
}
