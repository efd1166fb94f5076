//! Ordinary least squares.
//!
//! Every statistical step in this crate (ADF, Granger, VAR) reduces to small
//! dense regressions of the form:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - We solve with SVD so tall design matrices are handled robustly.
//!   (Nalgebra's `QR::solve` is intended for square systems.)
//! - Inference (standard errors, Wald tests) needs `(X'X)^-1`; we invert the
//!   normal matrix only when asked, and report singularity as `None`.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.nrows() < x.ncols() || x.nrows() != y.len() {
        return None;
    }
    let svd = x.clone().svd(true, true);

    // Reject rank-deficient designs instead of returning a minimum-norm
    // solution: downstream inference assumes full column rank.
    let smax = svd.singular_values.max();
    let smin = svd.singular_values.min();
    if !(smax.is_finite() && smax > 0.0) || smin <= smax * 1e-12 {
        return None;
    }

    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fitted OLS regression with the pieces needed for inference.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub beta: DVector<f64>,
    pub ssr: f64,
    pub nobs: usize,
    /// `(X'X)^-1`.
    pub xtx_inv: DMatrix<f64>,
}

impl OlsFit {
    pub fn n_params(&self) -> usize {
        self.beta.len()
    }

    pub fn df_resid(&self) -> f64 {
        self.nobs as f64 - self.n_params() as f64
    }

    /// Residual variance `ssr / (n - k)`.
    pub fn sigma2(&self) -> f64 {
        self.ssr / self.df_resid()
    }

    /// Gaussian log-likelihood at the OLS estimate.
    pub fn llf(&self) -> f64 {
        let n = self.nobs as f64;
        -n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0)
    }

    /// Akaike information criterion.
    pub fn aic(&self) -> f64 {
        -2.0 * self.llf() + 2.0 * self.n_params() as f64
    }

    /// t-statistic of coefficient `j`.
    pub fn t_value(&self, j: usize) -> f64 {
        let se = (self.sigma2() * self.xtx_inv[(j, j)]).sqrt();
        self.beta[j] / se
    }

    /// Wald F statistic for `β[idx] = 0` jointly.
    pub fn wald_f(&self, idx: &[usize]) -> Option<f64> {
        let q = idx.len();
        let b = DVector::from_iterator(q, idx.iter().map(|&i| self.beta[i]));
        let v = DMatrix::from_fn(q, q, |r, c| self.xtx_inv[(idx[r], idx[c])]);
        let v_inv = v.try_inverse()?;
        let stat = (b.transpose() * v_inv * &b)[(0, 0)] / (q as f64 * self.sigma2());
        stat.is_finite().then_some(stat)
    }
}

/// Fit `y ~ X` and keep the covariance pieces. `None` when `X` is singular.
pub fn ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<OlsFit> {
    let beta = solve_least_squares(x, y)?;
    let resid = y - x * &beta;
    let ssr = resid.dot(&resid);
    let xtx_inv = (x.transpose() * x).try_inverse()?;
    Some(OlsFit {
        beta,
        ssr,
        nobs: x.nrows(),
        xtx_inv,
    })
}
