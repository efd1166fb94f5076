//! Seeded synthetic quarterly dataset.
//!
//! Used by `tbf demo` and the tests. Shape of the data:
//!
//! - positive macro indicators (`GDP`, `Employment`, `CPI`) with trend growth
//! - a signed indicator (`YieldSpread`) that mean-reverts around 1
//! - tax bases whose growth follows lagged indicator growth; `NPTBase` and
//!   `SalesBase` also carry a quarterly pattern
//!
//! Indicators are simulated past the end of history to stand in for an
//! official projection.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{FeatureTable, Quarter};
use crate::error::{ForecastError, Result};

pub const INDICATORS: [&str; 4] = ["GDP", "Employment", "CPI", "YieldSpread"];
pub const BASES: [&str; 3] = ["WageBase", "SalesBase", "NPTBase"];

/// Fewest history quarters that leave room for differencing, lags and folds.
const MIN_QUARTERS: usize = 32;

#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub start: Quarter,
    pub n_quarters: usize,
    /// Projection length after the last history quarter.
    pub horizon_quarters: usize,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct SampleData {
    /// History: indicators and bases.
    pub features: FeatureTable,
    /// Indicator projection starting the quarter after history.
    pub projection: FeatureTable,
}

impl SampleData {
    pub fn indicators() -> Vec<String> {
        INDICATORS.iter().map(|s| s.to_string()).collect()
    }

    pub fn bases() -> Vec<String> {
        BASES.iter().map(|s| s.to_string()).collect()
    }
}

pub fn generate_sample(config: &SampleConfig) -> Result<SampleData> {
    if config.n_quarters < MIN_QUARTERS {
        return Err(ForecastError::InvalidInput(format!(
            "sample needs at least {MIN_QUARTERS} quarters (got {})",
            config.n_quarters
        )));
    }
    let total = config.n_quarters + config.horizon_quarters;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let shock = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::InvalidInput(format!("noise distribution: {e}")))?;
    let mut draw = |sd: f64| sd * shock.sample(&mut rng);

    let mut gdp = vec![1000.0];
    let mut emp = vec![400.0];
    let mut cpi = vec![100.0];
    let mut spread: Vec<f64> = vec![1.0];
    let mut g_gdp = vec![0.012];
    let mut g_emp = vec![0.004];
    let mut g_cpi = vec![0.006];
    for t in 1..total {
        let gg = 0.012 + 0.4 * (g_gdp[t - 1] - 0.012) + draw(0.006);
        let ge = 0.004 + 0.5 * (g_gdp[t - 1] - 0.012) + draw(0.002);
        let gc = 0.006 + 0.3 * (g_cpi[t - 1] - 0.006) + draw(0.002);
        g_gdp.push(gg);
        g_emp.push(ge);
        g_cpi.push(gc);
        gdp.push(gdp[t - 1] * gg.exp());
        emp.push(emp[t - 1] * ge.exp());
        cpi.push(cpi[t - 1] * gc.exp());
        spread.push(1.0 + 0.7 * (spread[t - 1] - 1.0) + draw(0.8));
    }

    // Bases react to last quarter's indicator growth.
    let season = [0.97, 1.01, 0.99, 1.03];
    let mut wage = vec![500.0];
    let mut sales = vec![300.0];
    let mut npt = vec![80.0];
    for t in 1..config.n_quarters {
        let gw = 0.002 + 0.9 * g_emp[t - 1] + 0.5 * g_cpi[t] + draw(0.002);
        let gs = 0.001 + 0.8 * g_gdp[t - 1] + draw(0.003);
        let gn = 0.8 * g_gdp[t - 1] + draw(0.004);
        wage.push(wage[t - 1] * gw.exp());
        sales.push(sales[t - 1] * gs.exp());
        npt.push(npt[t - 1] * gn.exp());
    }
    let seasonal = |level: &[f64], offset: usize| -> Vec<f64> {
        level
            .iter()
            .enumerate()
            .map(|(t, v)| v * season[(t + offset) % 4])
            .collect()
    };
    let q0 = usize::from(config.start.quarter() - 1);

    let n = config.n_quarters;
    let features = FeatureTable::new(
        config.start,
        INDICATORS.iter().chain(BASES.iter()).map(|s| s.to_string()).collect(),
        vec![
            gdp[..n].to_vec(),
            emp[..n].to_vec(),
            cpi[..n].to_vec(),
            spread[..n].to_vec(),
            wage,
            seasonal(&sales, q0),
            seasonal(&npt, q0),
        ],
    )?;
    let projection = FeatureTable::new(
        config.start.offset(n as i64),
        SampleData::indicators(),
        vec![
            gdp[n..].to_vec(),
            emp[n..].to_vec(),
            cpi[n..].to_vec(),
            spread[n..].to_vec(),
        ],
    )?;
    Ok(SampleData {
        features,
        projection,
    })
}
