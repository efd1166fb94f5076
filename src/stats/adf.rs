//! Augmented Dickey–Fuller unit-root test.
//!
//! Null hypothesis: the series has a unit root (non-stationary). We run the
//! constant-only form:
//!
//! ```text
//! Δx_t = c + γ x_{t-1} + Σ_{i=1..k} φ_i Δx_{t-i} + ε_t
//! ```
//!
//! - `k` is chosen by AIC over `0..=maxlag`, all candidates fitted on the same
//!   rows; the chosen `k` is then refitted on every row it can use.
//! - `maxlag = ceil(12 (n/100)^(1/4))`, capped at `n/2 - 2`.
//! - The statistic is the t-value of `γ`; its p-value comes from MacKinnon's
//!   (1994) response-surface approximation for one variable with a constant.

use nalgebra::{DMatrix, DVector};
use statrs::function::erf::erfc;

use crate::error::{ForecastError, Result};
use crate::math::ols;

// MacKinnon (1994) surface for N = 1, regression "c".
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALLP: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGEP: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

/// Variance below which a series is treated as constant.
const FLAT_VARIANCE: f64 = 1e-24;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdfOutcome {
    pub stat: f64,
    pub p_value: f64,
    pub used_lag: usize,
    pub nobs: usize,
}

impl AdfOutcome {
    pub fn is_stationary(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Run the ADF test on a gap-free series.
pub fn adf_test(x: &[f64]) -> Result<AdfOutcome> {
    if x.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::InvalidInput(
            "ADF input must be finite (drop missing values first)".to_string(),
        ));
    }
    let n = x.len();
    let maxlag_cap = (n / 2) as i64 - 2;
    if maxlag_cap < 0 {
        return Err(ForecastError::InsufficientData(format!(
            "ADF needs at least 4 observations (got {n})"
        )));
    }

    if variance(x) <= FLAT_VARIANCE {
        return Ok(AdfOutcome {
            stat: f64::NEG_INFINITY,
            p_value: 0.0,
            used_lag: 0,
            nobs: n.saturating_sub(1),
        });
    }

    let maxlag = ((12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as i64).min(maxlag_cap) as usize;
    let dx: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

    // Autolag: same rows (t >= maxlag) for every candidate lag.
    let mut best: Option<(usize, f64)> = None;
    for k in 0..=maxlag {
        let Some(fit) = fit_adf_regression(x, &dx, k, maxlag) else {
            continue;
        };
        let aic = fit.aic();
        if best.is_none_or(|(_, b)| aic < b) {
            best = Some((k, aic));
        }
    }
    let (used_lag, _) = best.ok_or_else(|| {
        ForecastError::ModelFit("ADF regression is singular for every lag".to_string())
    })?;

    let fit = fit_adf_regression(x, &dx, used_lag, used_lag)
        .ok_or_else(|| ForecastError::ModelFit("ADF regression is singular".to_string()))?;
    let stat = fit.t_value(0);
    Ok(AdfOutcome {
        stat,
        p_value: mackinnon_p(stat),
        used_lag,
        nobs: fit.nobs,
    })
}

/// Regress `Δx_t` on `[x_t-level, Δx lags 1..=k, 1]` for rows `t >= first`.
///
/// `dx[t] = x[t+1] - x[t]`, so the level paired with `dx[t]` is `x[t]`.
fn fit_adf_regression(x: &[f64], dx: &[f64], k: usize, first: usize) -> Option<ols::OlsFit> {
    let rows: Vec<usize> = (first..dx.len()).collect();
    let ncols = k + 2;
    if rows.len() <= ncols {
        return None;
    }
    let design = DMatrix::from_fn(rows.len(), ncols, |r, c| {
        let t = rows[r];
        match c {
            0 => x[t],
            c if c <= k => dx[t - c],
            _ => 1.0,
        }
    });
    let y = DVector::from_iterator(rows.len(), rows.iter().map(|&t| dx[t]));
    ols::ols(&design, &y)
}

/// MacKinnon approximate p-value for the ADF t-statistic.
pub fn mackinnon_p(stat: f64) -> f64 {
    if stat.is_nan() {
        return 1.0;
    }
    if stat > TAU_MAX {
        return 1.0;
    }
    if stat < TAU_MIN {
        return 0.0;
    }
    let coef: &[f64] = if stat <= TAU_STAR {
        &TAU_SMALLP
    } else {
        &TAU_LARGEP
    };
    let z = coef
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc * stat + c);
    standard_normal_cdf(z)
}

fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}

fn variance(x: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}
