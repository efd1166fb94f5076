//! Regressor suggestions from the Granger matrix.
//!
//! An exogenous candidate `D` for target `T` must:
//! - Granger-cause `T` (`p(T <- D) < alpha`)
//! - be on the allow-list (variables with an official projection)
//! - not be Granger-caused by `T` (`p(D <- T) >= alpha`), otherwise it is
//!   really part of the endogenous system
//!
//! For several targets the per-target sets are intersected.

use std::collections::BTreeSet;

use crate::error::{ForecastError, Result};
use crate::select::GrangerMatrix;

/// Admissible exogenous variables for `endog`, strongest first.
///
/// Ordered by the primary target's forward p-value, ties by name.
pub fn possible_exog<S: AsRef<str>>(
    matrix: &GrangerMatrix,
    endog: &[S],
    allow: &[S],
    alpha: f64,
) -> Result<Vec<String>> {
    let Some(primary) = endog.first().map(AsRef::as_ref) else {
        return Ok(Vec::new());
    };

    let mut allowed: Option<BTreeSet<String>> = None;
    for target in endog {
        let target = target.as_ref();
        let found = one_way_drivers(matrix, target, allow, alpha)?;
        allowed = Some(match allowed {
            None => found,
            Some(prev) => prev.intersection(&found).cloned().collect(),
        });
    }
    let allowed = allowed.unwrap_or_default();

    let off_list: Vec<String> = allowed
        .iter()
        .filter(|c| !allow.iter().any(|a| a.as_ref() == c.as_str()))
        .cloned()
        .collect();
    if !off_list.is_empty() {
        return Err(ForecastError::InvalidExogVariable(off_list));
    }

    let mut out: Vec<(f64, String)> = allowed
        .into_iter()
        .map(|c| (matrix.p_value(primary, &c).unwrap_or(f64::NAN), c))
        .collect();
    out.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(out.into_iter().map(|(_, c)| c).collect())
}

fn one_way_drivers<S: AsRef<str>>(
    matrix: &GrangerMatrix,
    target: &str,
    allow: &[S],
    alpha: f64,
) -> Result<BTreeSet<String>> {
    if !matrix.contains(target) {
        return Err(ForecastError::UnknownColumn(target.to_string()));
    }
    let mut out = BTreeSet::new();
    for driver in allow.iter().map(AsRef::as_ref) {
        if driver == target {
            continue;
        }
        let (Some(forward), Some(reverse)) =
            (matrix.p_value(target, driver), matrix.p_value(driver, target))
        else {
            continue;
        };
        if forward < alpha && reverse >= alpha {
            out.insert(driver.to_string());
        }
    }
    Ok(out)
}

/// Companion endog suggestions: variables with a significant Granger relation
/// to `base` in both directions, strongest forward relation first.
pub fn possible_endog(matrix: &GrangerMatrix, base: &str, alpha: f64) -> Result<Vec<String>> {
    if !matrix.contains(base) {
        return Err(ForecastError::UnknownColumn(base.to_string()));
    }
    let mut out: Vec<(f64, String)> = matrix
        .variables()
        .iter()
        .filter(|v| v.as_str() != base)
        .filter_map(|v| {
            let forward = matrix.p_value(base, v)?;
            let reverse = matrix.p_value(v, base)?;
            (forward < alpha && reverse < alpha).then(|| (forward, v.clone()))
        })
        .collect();
    out.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(out.into_iter().map(|(_, v)| v).collect())
}
