//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - used in-memory during the search
//! - exported to JSON/CSV for the reporting side
//! - compared in tests

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::Quarter;

/// How to make one variable stationary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideEntry {
    pub variable: String,
    /// All historical values are strictly positive, so we work in log space.
    pub loggable: bool,
    /// Divisor applied when not loggable (always `1.0` when loggable).
    pub norm: f64,
    pub ndiffs: usize,
    /// Differencing period: 1 (quarter over quarter) or 4 (year over year).
    pub periods: usize,
}

/// Per-variable stationarity metadata, keyed by column name.
///
/// Built once from a baseline table and frozen: there is no API to mutate
/// entries after construction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StationarityGuide {
    entries: BTreeMap<String, GuideEntry>,
}

impl StationarityGuide {
    pub fn from_entries(entries: impl IntoIterator<Item = GuideEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.variable.clone(), e))
                .collect(),
        }
    }

    pub fn get(&self, variable: &str) -> Option<&GuideEntry> {
        self.entries.get(variable)
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.entries.contains_key(variable)
    }

    pub fn entries(&self) -> impl Iterator<Item = &GuideEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One fully specified VAR(X) model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FitCandidate {
    /// Target variables; the first one is the primary endog.
    pub endog_cols: Vec<String>,
    pub exog_cols: BTreeSet<String>,
    pub order: usize,
    pub max_fit_date: Quarter,
    #[serde(default)]
    pub model_quarters: bool,
}

impl FitCandidate {
    /// First endog column, or `""` when none is set.
    pub fn primary(&self) -> &str {
        self.endog_cols.first().map_or("", String::as_str)
    }

    /// Short label for logs and reports.
    pub fn label(&self) -> String {
        let exog: Vec<&str> = self.exog_cols.iter().map(String::as_str).collect();
        format!(
            "endog=[{}] exog=[{}] order={} max_fit={} quarters={}",
            self.endog_cols.join(","),
            exog.join(","),
            self.order,
            self.max_fit_date,
            self.model_quarters
        )
    }
}

/// Walk-forward score of one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub candidate: FitCandidate,
    /// Per split, per endog column MAPE.
    pub mape_per_split: Vec<BTreeMap<String, f64>>,
    /// MAPE over the concatenation of all out-of-sample folds, per endog column.
    pub mape_overall: BTreeMap<String, f64>,
    /// Ranking key: overall MAPE of the primary endog.
    pub target_mape: f64,
}

/// History + projection for one variable, in original units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub variable: String,
    pub start: Quarter,
    pub values: Vec<f64>,
    /// First projected quarter (everything before it is in-sample).
    pub forecast_start: Quarter,
}

impl Forecast {
    pub fn quarters(&self) -> impl Iterator<Item = (Quarter, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (self.start.offset(i as i64), *v))
    }
}

/// Values keyed by fiscal year.
pub type FiscalYearSeries = BTreeMap<i32, f64>;

/// The Plan window the forecast must cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanHorizon {
    pub plan_start_year: i32,
    pub n_years: u32,
}

impl PlanHorizon {
    /// Last quarter of the final plan fiscal year (Q2 of that year).
    pub fn end_quarter(&self) -> Quarter {
        let last_fy = self.plan_start_year + self.n_years.max(1) as i32 - 1;
        Quarter::from_date(
            chrono::NaiveDate::from_ymd_opt(last_fy, 4, 1).unwrap_or(chrono::NaiveDate::MIN),
        )
    }

    /// Number of quarters to project after `last_history` to reach the plan end.
    pub fn steps_after(&self, last_history: Quarter) -> usize {
        last_history.quarters_until(self.end_quarter()).max(0) as usize
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults). Empty lists and `None`
/// fields are resolved against the loaded data by the pipeline.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    /// Historical feature CSV; `None` runs on the synthetic sample.
    pub features_path: Option<PathBuf>,
    /// Official indicator projection CSV.
    pub cbo_path: Option<PathBuf>,
    /// Explicit parameter grid (JSON) instead of Granger-driven candidates.
    pub grid_path: Option<PathBuf>,
    /// History length of the synthetic sample.
    pub sample_quarters: usize,

    /// Primary tax base being forecast.
    pub target: String,
    /// Companion endog candidates (empty: two-way Granger companions).
    pub other_endog: Vec<String>,
    /// Exogenous allow-list (empty: the projection's columns).
    pub exog_allow: Vec<String>,

    pub min_year: Option<i32>,
    /// Ignore quarters after this one when testing stationarity.
    pub guide_exclude_after: Option<Quarter>,
    /// Bases differenced year over year (empty: the built-in list).
    pub yoy_columns: Vec<String>,
    pub orders: Vec<usize>,
    /// Fit cutoffs (empty: last history quarter).
    pub max_fit_dates: Vec<Quarter>,
    pub model_quarters: Vec<bool>,
    pub alpha: f64,
    pub granger_max_lag: usize,
    pub granger_max_date: Option<Quarter>,
    pub max_other_endog: usize,
    pub max_exog: usize,
    pub n_splits: usize,
    pub top_k: usize,
    /// Ranking rows to print.
    pub show_top: usize,
    /// First plan fiscal year (default: the year after history ends).
    pub plan_start_year: Option<i32>,
    pub plan_years: u32,
    pub workers: Option<usize>,
    pub seed: u64,

    pub export_forecast: Option<PathBuf>,
    pub export_fits: Option<PathBuf>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            features_path: None,
            cbo_path: None,
            grid_path: None,
            sample_quarters: 96,
            target: "WageBase".to_string(),
            other_endog: Vec::new(),
            exog_allow: Vec::new(),
            min_year: None,
            guide_exclude_after: None,
            yoy_columns: Vec::new(),
            orders: vec![1, 2, 3, 4],
            max_fit_dates: Vec::new(),
            model_quarters: vec![false],
            alpha: 0.05,
            granger_max_lag: 6,
            granger_max_date: None,
            max_other_endog: 1,
            max_exog: 4,
            n_splits: 3,
            top_k: 1,
            show_top: 10,
            plan_start_year: None,
            plan_years: 5,
            workers: None,
            seed: 12345,
            export_forecast: None,
            export_fits: None,
        }
    }
}
