//! Pairwise Granger-causality tests.
//!
//! For each lag `L` we compare, on the complete rows of the lag matrix:
//!
//! - restricted:   `y_t ~ 1 + y_{t-1..t-L}`
//! - unrestricted: `y_t ~ 1 + y_{t-1..t-L} + x_{t-1..t-L}`
//!
//! and report the four classic statistics (`ssr_ftest`, `ssr_chi2test`,
//! `lrtest`, `params_ftest`).

use clap::ValueEnum;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor};

use crate::error::{ForecastError, Result};
use crate::math::{complete_lag_rows, ols};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum GrangerTest {
    SsrFtest,
    SsrChi2test,
    Lrtest,
    ParamsFtest,
}

impl GrangerTest {
    pub const ALL: [GrangerTest; 4] = [
        GrangerTest::SsrFtest,
        GrangerTest::SsrChi2test,
        GrangerTest::Lrtest,
        GrangerTest::ParamsFtest,
    ];
}

/// p-values of the four tests at one lag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrangerLagOutcome {
    pub lag: usize,
    pub nobs: usize,
    pub ssr_ftest: f64,
    pub ssr_chi2test: f64,
    pub lrtest: f64,
    pub params_ftest: f64,
}

impl GrangerLagOutcome {
    pub fn p_value(&self, test: GrangerTest) -> f64 {
        match test {
            GrangerTest::SsrFtest => self.ssr_ftest,
            GrangerTest::SsrChi2test => self.ssr_chi2test,
            GrangerTest::Lrtest => self.lrtest,
            GrangerTest::ParamsFtest => self.params_ftest,
        }
    }

    /// Outcome when the driver lags add nothing to the restricted model.
    fn no_information(lag: usize, nobs: usize) -> Self {
        Self {
            lag,
            nobs,
            ssr_ftest: 1.0,
            ssr_chi2test: 1.0,
            lrtest: 1.0,
            params_ftest: 1.0,
        }
    }
}

/// Test "driver Granger-causes target" at every lag `1..=max_lag`.
pub fn granger_tests(target: &[f64], driver: &[f64], max_lag: usize) -> Result<Vec<GrangerLagOutcome>> {
    if max_lag == 0 {
        return Err(ForecastError::InvalidInput("Granger max lag must be >= 1".to_string()));
    }
    if target.len() != driver.len() {
        return Err(ForecastError::InvalidInput(
            "Granger inputs must be index-aligned".to_string(),
        ));
    }
    (1..=max_lag).map(|lag| granger_at_lag(target, driver, lag)).collect()
}

/// Minimum p-value over lags and the selected tests.
pub fn min_p_value(outcomes: &[GrangerLagOutcome], tests: &[GrangerTest]) -> f64 {
    outcomes
        .iter()
        .flat_map(|o| tests.iter().map(|t| o.p_value(*t)))
        .fold(f64::INFINITY, f64::min)
        .min(1.0)
}

fn granger_at_lag(y: &[f64], x: &[f64], lag: usize) -> Result<GrangerLagOutcome> {
    let rows = complete_lag_rows(&[y, x], lag);
    let nobs = rows.len();
    let k_unrestricted = 2 * lag + 1;
    if nobs <= k_unrestricted + 1 {
        return Err(ForecastError::InsufficientData(format!(
            "Granger test at lag {lag} has {nobs} usable rows"
        )));
    }

    let yv = DVector::from_iterator(nobs, rows.iter().map(|&t| y[t]));
    let restricted = DMatrix::from_fn(nobs, lag + 1, |r, c| {
        if c < lag { y[rows[r] - c - 1] } else { 1.0 }
    });
    let unrestricted = DMatrix::from_fn(nobs, k_unrestricted, |r, c| {
        let t = rows[r];
        if c < lag {
            y[t - c - 1]
        } else if c < 2 * lag {
            x[t - (c - lag) - 1]
        } else {
            1.0
        }
    });

    let fit_r = ols::ols(&restricted, &yv).ok_or_else(|| {
        ForecastError::ModelFit(format!("restricted Granger regression is singular at lag {lag}"))
    })?;
    // Driver lags collinear with the target's own lags (e.g. the self-test):
    // they carry no extra information.
    let Some(fit_u) = ols::ols(&unrestricted, &yv) else {
        return Ok(GrangerLagOutcome::no_information(lag, nobs));
    };

    let df_u = fit_u.df_resid();
    let l = lag as f64;
    let n = nobs as f64;
    let ssr_r = fit_r.ssr;
    let ssr_u = fit_u.ssr.max(f64::MIN_POSITIVE);
    let gain = (ssr_r - ssr_u).max(0.0);

    let f_dist = FisherSnedecor::new(l, df_u)
        .map_err(|e| ForecastError::ModelFit(format!("F distribution: {e}")))?;
    let chi2 = ChiSquared::new(l).map_err(|e| ForecastError::ModelFit(format!("chi2: {e}")))?;

    let f_stat = gain / ssr_u / l * df_u;
    let chi2_stat = n * gain / ssr_u;
    let lr_stat = (-2.0 * (fit_r.llf() - fit_u.llf())).max(0.0);
    let driver_idx: Vec<usize> = (lag..2 * lag).collect();
    let wald = fit_u.wald_f(&driver_idx).unwrap_or(f_stat).max(0.0);

    Ok(GrangerLagOutcome {
        lag,
        nobs,
        ssr_ftest: f_dist.sf(f_stat),
        ssr_chi2test: chi2.sf(chi2_stat),
        lrtest: chi2.sf(lr_stat),
        params_ftest: f_dist.sf(wald),
    })
}
