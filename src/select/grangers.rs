//! Pairwise Granger p-value matrix.
//!
//! Cell `(row = target, col = driver)` holds the minimum p-value over lags
//! `1..=max_lag` and the selected tests for "driver Granger-causes target".
//! Pairs are independent, so they are evaluated in parallel and written back
//! by index.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{FeatureTable, Quarter};
use crate::error::{ForecastError, Result};
use crate::stats::{GrangerTest, granger_tests, min_p_value};

#[derive(Debug, Clone)]
pub struct GrangerOptions {
    pub max_lag: usize,
    /// Ignore observations after this quarter.
    pub max_date: Option<Quarter>,
    pub tests: Vec<GrangerTest>,
}

impl Default for GrangerOptions {
    fn default() -> Self {
        Self {
            max_lag: 6,
            max_date: None,
            tests: GrangerTest::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrangerMatrix {
    variables: Vec<String>,
    /// `p[target][driver]`; `NaN` when the pair had too little data.
    p: Vec<Vec<f64>>,
}

impl GrangerMatrix {
    /// Build from explicit values (rows are targets, columns drivers).
    pub fn from_values(variables: Vec<String>, p: Vec<Vec<f64>>) -> Result<Self> {
        let n = variables.len();
        if p.len() != n || p.iter().any(|row| row.len() != n) {
            return Err(ForecastError::InvalidInput(format!(
                "Granger matrix must be {n}x{n}"
            )));
        }
        Ok(Self { variables, p })
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    fn index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index(name).is_some()
    }

    /// p-value for "`driver` Granger-causes `target`".
    pub fn p_value(&self, target: &str, driver: &str) -> Option<f64> {
        Some(self.p[self.index(target)?][self.index(driver)?])
    }

    pub fn row(&self, target: &str) -> Option<&[f64]> {
        self.index(target).map(|i| self.p[i].as_slice())
    }
}

/// Compute the matrix over every column of a scaled table.
pub fn grangers_matrix(scaled: &FeatureTable, opts: &GrangerOptions) -> Result<GrangerMatrix> {
    if opts.tests.is_empty() {
        return Err(ForecastError::InvalidInput(
            "at least one Granger test must be selected".to_string(),
        ));
    }
    let data = match opts.max_date {
        Some(max) => scaled.truncate_after(max),
        None => scaled.clone(),
    };
    let n = data.columns().len();
    info!(variables = n, max_lag = opts.max_lag, "computing Granger matrix");

    let pairs: Vec<(usize, usize)> = (0..n).flat_map(|i| (0..n).map(move |j| (i, j))).collect();
    let cells: Vec<(usize, usize, f64)> = pairs
        .par_iter()
        .map(|&(target, driver)| {
            let outcome = granger_tests(data.column_at(target), data.column_at(driver), opts.max_lag);
            match outcome {
                Ok(lags) => Ok((target, driver, min_p_value(&lags, &opts.tests))),
                Err(e) if e.is_recoverable() => {
                    warn!(
                        target = %data.columns()[target],
                        driver = %data.columns()[driver],
                        error = %e,
                        "Granger pair skipped"
                    );
                    Ok((target, driver, f64::NAN))
                }
                Err(e) => Err(e),
            }
        })
        .collect::<Result<_>>()?;

    let mut p = vec![vec![f64::NAN; n]; n];
    for (target, driver, value) in cells {
        p[target][driver] = value;
    }
    GrangerMatrix::from_values(data.columns().to_vec(), p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand::rngs::StdRng;
    use rand_distr::Normal;

    fn scaled_table() -> FeatureTable {
        let mut rng = StdRng::seed_from_u64(42);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let n = 120;
        let x: Vec<f64> = (0..n).map(|_| normal.sample(&mut rng)).collect();
        let z: Vec<f64> = (0..n).map(|_| normal.sample(&mut rng)).collect();
        let y: Vec<f64> = (0..n)
            .map(|t| {
                let e = 0.2 * normal.sample(&mut rng);
                if t == 0 { e } else { 0.9 * x[t - 1] + e }
            })
            .collect();
        FeatureTable::new(
            Quarter::new(1990, 1).unwrap(),
            vec!["X".into(), "Y".into(), "Z".into()],
            vec![x, y, z],
        )
        .unwrap()
    }

    #[test]
    fn rows_are_targets_and_columns_are_drivers() {
        let m = grangers_matrix(&scaled_table(), &GrangerOptions { max_lag: 2, ..Default::default() })
            .unwrap();
        assert_eq!(m.variables().len(), 3);
        assert!(m.p_value("Y", "X").unwrap() < 1e-6);
        assert!(m.p_value("X", "Y").unwrap() > 1e-3);
        // Self-tests carry no information.
        assert_eq!(m.p_value("Z", "Z").unwrap(), 1.0);
    }

    #[test]
    fn max_date_limits_the_sample() {
        let t = scaled_table();
        let opts = GrangerOptions {
            max_lag: 2,
            max_date: Some(Quarter::new(1991, 1).unwrap()),
            ..Default::default()
        };
        // Five rows are too few for lag 2: every pair is reported as NaN.
        let m = grangers_matrix(&t, &opts).unwrap();
        assert!(m.p_value("Y", "X").unwrap().is_nan());
    }

    #[test]
    fn matrix_shape_is_checked() {
        assert!(GrangerMatrix::from_values(vec!["A".into()], vec![vec![0.1, 0.2]]).is_err());
    }
}
