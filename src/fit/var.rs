//! VAR(X) estimation and forecasting.
//!
//! Each equation shares one design row:
//!
//! ```text
//! [ 1, x_t (exog), D2..D4 (quarter dummies, optional), y_{t-1}, ..., y_{t-p} ]
//! ```
//!
//! so the system is estimated equation by equation with the same SVD least
//! squares solve (equivalent to multivariate OLS). Forecasts are produced
//! recursively, feeding each prediction back in as a lag.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::{FeatureTable, FitCandidate, Forecast, Quarter};
use crate::error::{ForecastError, Result};
use crate::math::{complete_lag_rows, solve_least_squares};
use crate::transform::TransformPipeline;

/// Structural part of a candidate (what the regression looks like).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarSpec {
    pub endog: Vec<String>,
    pub exog: Vec<String>,
    pub order: usize,
    pub model_quarters: bool,
}

impl VarSpec {
    pub fn from_candidate(candidate: &FitCandidate) -> Self {
        Self {
            endog: candidate.endog_cols.clone(),
            exog: candidate.exog_cols.iter().cloned().collect(),
            order: candidate.order,
            model_quarters: candidate.model_quarters,
        }
    }

    /// Endog then exog column names.
    pub fn columns(&self) -> Vec<String> {
        self.endog.iter().chain(&self.exog).cloned().collect()
    }

    pub fn n_regressors(&self) -> usize {
        1 + self.exog.len() + if self.model_quarters { 3 } else { 0 } + self.order * self.endog.len()
    }

    fn design_row(&self, q: Quarter, exog_t: &[f64], lagged: impl Fn(usize, usize) -> f64) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.n_regressors());
        row.push(1.0);
        row.extend_from_slice(exog_t);
        if self.model_quarters {
            row.extend((2..=4).map(|d| if q.quarter() == d { 1.0 } else { 0.0 }));
        }
        for lag in 1..=self.order {
            row.extend((0..self.endog.len()).map(|j| lagged(lag, j)));
        }
        row
    }
}

#[derive(Debug, Clone)]
pub struct VarModel {
    spec: VarSpec,
    /// `n_regressors x n_endog`; column `j` is equation `j`.
    coef: DMatrix<f64>,
    nobs: usize,
}

impl VarModel {
    /// Estimate on every usable row of `data` (lags and exog complete).
    pub fn fit(data: &FeatureTable, spec: VarSpec) -> Result<Self> {
        if spec.order == 0 || spec.endog.is_empty() {
            return Err(ForecastError::InvalidInput(
                "a VAR needs at least one endog column and order >= 1".to_string(),
            ));
        }
        let endog: Vec<&[f64]> = spec
            .endog
            .iter()
            .map(|c| data.require_column(c))
            .collect::<Result<_>>()?;
        let exog: Vec<&[f64]> = spec
            .exog
            .iter()
            .map(|c| data.require_column(c))
            .collect::<Result<_>>()?;

        let rows: Vec<usize> = complete_lag_rows(&endog, spec.order)
            .into_iter()
            .filter(|&t| exog.iter().all(|x| x[t].is_finite()))
            .collect();
        let k = spec.n_regressors();
        if rows.len() <= k {
            return Err(ForecastError::ModelFit(format!(
                "{} usable rows for {k} regressors at order {}",
                rows.len(),
                spec.order
            )));
        }

        let mut flat = Vec::with_capacity(rows.len() * k);
        for &t in &rows {
            let exog_t: Vec<f64> = exog.iter().map(|x| x[t]).collect();
            flat.extend(spec.design_row(data.quarter_at(t), &exog_t, |lag, j| endog[j][t - lag]));
        }
        let x = DMatrix::from_row_slice(rows.len(), k, &flat);

        let mut coef = DMatrix::zeros(k, endog.len());
        for (j, series) in endog.iter().enumerate() {
            let y = DVector::from_iterator(rows.len(), rows.iter().map(|&t| series[t]));
            let beta = solve_least_squares(&x, &y).ok_or_else(|| {
                ForecastError::ModelFit(format!(
                    "singular design for `{}` at order {}",
                    spec.endog[j], spec.order
                ))
            })?;
            coef.set_column(j, &beta);
        }
        debug!(nobs = rows.len(), regressors = k, order = spec.order, "VAR fitted");

        Ok(Self {
            spec,
            coef,
            nobs: rows.len(),
        })
    }

    pub fn spec(&self) -> &VarSpec {
        &self.spec
    }

    pub fn coefficients(&self) -> &DMatrix<f64> {
        &self.coef
    }

    pub fn nobs(&self) -> usize {
        self.nobs
    }

    /// Forecast `steps` quarters after the last row of `history`.
    ///
    /// `history` must hold the endog columns with complete final `order` rows;
    /// `future_exog` must cover every forecast quarter for every exog column.
    pub fn forecast(
        &self,
        history: &FeatureTable,
        future_exog: Option<&FeatureTable>,
        steps: usize,
    ) -> Result<FeatureTable> {
        let p = self.spec.order;
        let k = self.spec.endog.len();
        let last = history.end().ok_or_else(|| {
            ForecastError::InsufficientData("empty history for forecast".to_string())
        })?;
        if history.len() < p {
            return Err(ForecastError::InsufficientData(format!(
                "{} history rows for order {p}",
                history.len()
            )));
        }

        let endog: Vec<&[f64]> = self
            .spec
            .endog
            .iter()
            .map(|c| history.require_column(c))
            .collect::<Result<_>>()?;
        let mut buffer: Vec<Vec<f64>> = (history.len() - p..history.len())
            .map(|t| endog.iter().map(|s| s[t]).collect())
            .collect();
        if buffer.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelFit(format!(
                "history ending {last} has missing values in its last {p} rows"
            )));
        }

        let mut out = vec![Vec::with_capacity(steps); k];
        for h in 1..=steps {
            let q = last.offset(h as i64);
            let exog_t = self
                .spec
                .exog
                .iter()
                .map(|name| {
                    future_exog
                        .and_then(|t| t.get(name, q))
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| ForecastError::MissingExogData {
                            column: name.clone(),
                            date: q.to_string(),
                        })
                })
                .collect::<Result<Vec<f64>>>()?;
            let n = buffer.len();
            let row = self.spec.design_row(q, &exog_t, |lag, j| buffer[n - lag][j]);
            let row = DVector::from_vec(row);
            let next: Vec<f64> = (0..k).map(|j| self.coef.column(j).dot(&row)).collect();
            if next.iter().any(|v| !v.is_finite()) {
                return Err(ForecastError::ModelFit(format!("non-finite forecast at {q}")));
            }
            for (j, v) in next.iter().enumerate() {
                out[j].push(*v);
            }
            buffer.push(next);
        }
        FeatureTable::new(last.next(), self.spec.endog.clone(), out)
    }
}

/// A fitted candidate plus its unscaled history-and-forecast series.
#[derive(Debug, Clone)]
pub struct VarFit {
    pub model: VarModel,
    pub forecasts: Vec<Forecast>,
}

impl VarFit {
    pub fn forecast_for(&self, variable: &str) -> Option<&Forecast> {
        self.forecasts.iter().find(|f| f.variable == variable)
    }
}

/// Fit one candidate on `unscaled` and project `steps` quarters past the end
/// of its endog history.
///
/// The model is estimated on data through `max_fit_date`; the forecast starts
/// after the last complete endog row. Exogenous regressors for the horizon come
/// from `projection` spliced onto their history.
pub fn fit_var_model(
    unscaled: &FeatureTable,
    pipeline: &TransformPipeline,
    candidate: &FitCandidate,
    steps: usize,
    projection: Option<&FeatureTable>,
) -> Result<VarFit> {
    let spec = VarSpec::from_candidate(candidate);
    let selected = unscaled.select(&spec.columns())?;
    let (fitted, scaled) = pipeline.fit_transform(&selected)?;

    let model = VarModel::fit(&scaled.truncate_after(candidate.max_fit_date), spec.clone())?;

    let history = scaled.select(&spec.endog)?.trim_incomplete();
    let last = history.end().ok_or_else(|| {
        ForecastError::InsufficientData(format!(
            "no complete history for {}",
            spec.endog.join(",")
        ))
    })?;

    let future = match spec.exog.first() {
        None => None,
        Some(first) => {
            let projection = projection.ok_or_else(|| ForecastError::MissingExogData {
                column: first.clone(),
                date: last.next().to_string(),
            })?;
            Some(splice_future_exog(&fitted, &selected, projection, &spec.exog, last, steps)?)
        }
    };

    let projected = model.forecast(&history, future.as_ref(), steps)?;
    let levels = fitted.inverse_transform(&history.append(&projected)?)?;

    let forecasts = spec
        .endog
        .iter()
        .map(|name| {
            Ok(Forecast {
                variable: name.clone(),
                start: levels.start(),
                values: levels.require_column(name)?.to_vec(),
                forecast_start: last.next(),
            })
        })
        .collect::<Result<_>>()?;
    Ok(VarFit { model, forecasts })
}

/// History through `last`, then the projection; scaled with the fitted guide.
fn splice_future_exog(
    fitted: &TransformPipeline,
    history: &FeatureTable,
    projection: &FeatureTable,
    exog: &[String],
    last: Quarter,
    steps: usize,
) -> Result<FeatureTable> {
    let start = history.start();
    let len = (start.quarters_until(last) + 1).max(0) as usize + steps;
    let mut values = Vec::with_capacity(exog.len());
    for name in exog {
        history.require_column(name)?;
        let column = (0..len)
            .map(|i| {
                let q = start.offset(i as i64);
                let source = if q <= last { history } else { projection };
                source.get(name, q).unwrap_or(f64::NAN)
            })
            .collect();
        values.push(column);
    }
    let spliced = FeatureTable::new(start, exog.to_vec(), values)?;
    Ok(fitted.transform(&spliced)?.truncate_before(last.next()))
}
