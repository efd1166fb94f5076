//! Fiscal-year aggregation of the best candidates.
//!
//! Fiscal year `Y` runs from Q3 of `Y - 1` through Q2 of `Y`. Each of the
//! top-K candidates is refit on the full history and projected to the end of
//! the plan; its quarterly series is summed by fiscal year and the sums are
//! averaged across candidates year by year.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{FeatureTable, FiscalYearSeries, FitCandidate, FitResult, Forecast, PlanHorizon};
use crate::error::{ForecastError, Result};
use crate::fit::var::fit_var_model;
use crate::transform::TransformPipeline;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateForecast {
    pub variable: String,
    /// Element-wise mean of `per_candidate` by fiscal year.
    pub average: FiscalYearSeries,
    pub per_candidate: Vec<FiscalYearSeries>,
    /// Parameter sets used, best first.
    pub candidates: Vec<FitCandidate>,
    pub quarterly: Vec<Forecast>,
}

/// Sum a quarterly series by fiscal year (missing quarters are skipped).
pub fn fiscal_year_totals(forecast: &Forecast) -> FiscalYearSeries {
    let mut out = FiscalYearSeries::new();
    for (q, v) in forecast.quarters() {
        let total = out.entry(q.fiscal_year()).or_insert(0.0);
        if v.is_finite() {
            *total += v;
        }
    }
    out
}

/// Mean by fiscal year over the series that contain that year.
pub fn average_by_year(series: &[FiscalYearSeries]) -> FiscalYearSeries {
    let mut sums: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for s in series {
        for (fy, v) in s {
            let e = sums.entry(*fy).or_insert((0.0, 0));
            e.0 += v;
            e.1 += 1;
        }
    }
    sums.into_iter().map(|(fy, (s, n))| (fy, s / n as f64)).collect()
}

/// Refit the best `k` results and average their fiscal-year totals.
///
/// Uses every result when fewer than `k` are available.
pub fn average_forecast(
    unscaled: &FeatureTable,
    pipeline: &TransformPipeline,
    fits: &[FitResult],
    target: &str,
    k: usize,
    horizon: &PlanHorizon,
    projection: Option<&FeatureTable>,
) -> Result<AggregateForecast> {
    if k == 0 {
        return Err(ForecastError::InvalidInput("top-K must be >= 1".to_string()));
    }
    if fits.is_empty() {
        return Err(ForecastError::NoViableModel(0));
    }

    let mut per_candidate = Vec::new();
    let mut candidates = Vec::new();
    let mut quarterly = Vec::new();
    for fit in fits.iter().take(k) {
        let candidate = &fit.candidate;
        let history_end = unscaled
            .select(&candidate.endog_cols)?
            .trim_incomplete()
            .end()
            .ok_or_else(|| ForecastError::InsufficientData(format!("no history for `{target}`")))?;
        let steps = horizon.steps_after(history_end);

        let var = fit_var_model(unscaled, pipeline, candidate, steps, projection)?;
        let forecast = var
            .forecast_for(target)
            .cloned()
            .ok_or_else(|| ForecastError::UnknownColumn(target.to_string()))?;
        info!(candidate = %candidate.label(), steps, "refit for aggregation");

        per_candidate.push(fiscal_year_totals(&forecast));
        candidates.push(candidate.clone());
        quarterly.push(forecast);
    }

    Ok(AggregateForecast {
        variable: target.to_string(),
        average: average_by_year(&per_candidate),
        per_candidate,
        candidates,
        quarterly,
    })
}
