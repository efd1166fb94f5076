//! Candidate enumeration and parallel scoring.
//!
//! Two entry points:
//! - `grid_search`: an explicit `ParamGrid` (Cartesian product of its lists)
//! - `run_possible_models`: build the grid from the Granger matrix, one
//!   endog combination at a time
//!
//! Every candidate is evaluated independently on rayon workers. Workers only
//! read the shared table and pipeline; results are collected by index, so the
//! ranking does not depend on scheduling. Per-candidate numerical failures are
//! logged and skipped, contract violations abort the search.

use std::collections::HashSet;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{FeatureTable, FitCandidate, FitResult, Quarter};
use crate::error::{ForecastError, Result};
use crate::fit::walk_forward::walk_forward;
use crate::select::{GrangerMatrix, possible_exog};
use crate::transform::TransformPipeline;

/// Explicit search space. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamGrid {
    pub endog_cols: Vec<Vec<String>>,
    pub order: Vec<usize>,
    pub max_fit_date: Vec<Quarter>,
    #[serde(default = "ParamGrid::no_exog")]
    pub exog_cols: Vec<Vec<String>>,
    #[serde(default = "ParamGrid::no_quarters")]
    pub model_quarters: Vec<bool>,
}

impl ParamGrid {
    fn no_exog() -> Vec<Vec<String>> {
        vec![Vec::new()]
    }

    fn no_quarters() -> Vec<bool> {
        vec![false]
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let grid: ParamGrid =
            serde_json::from_str(text).map_err(|e| ForecastError::InvalidGrid(e.to_string()))?;
        grid.validate()?;
        Ok(grid)
    }

    pub fn validate(&self) -> Result<()> {
        let empty = [
            ("endog_cols", self.endog_cols.is_empty()),
            ("order", self.order.is_empty()),
            ("max_fit_date", self.max_fit_date.is_empty()),
            ("exog_cols", self.exog_cols.is_empty()),
            ("model_quarters", self.model_quarters.is_empty()),
        ];
        if let Some((key, _)) = empty.iter().find(|(_, e)| *e) {
            return Err(ForecastError::InvalidGrid(format!("`{key}` has no values")));
        }
        if self.endog_cols.iter().any(Vec::is_empty) {
            return Err(ForecastError::InvalidGrid("empty endog set".to_string()));
        }
        if self.order.contains(&0) {
            return Err(ForecastError::InvalidGrid("order must be >= 1".to_string()));
        }
        Ok(())
    }

    /// Cartesian product; the last key varies fastest.
    pub fn candidates(&self) -> Vec<FitCandidate> {
        let mut out = Vec::new();
        for endog in &self.endog_cols {
            for &order in &self.order {
                for exog in &self.exog_cols {
                    for &model_quarters in &self.model_quarters {
                        for &max_fit_date in &self.max_fit_date {
                            out.push(FitCandidate {
                                endog_cols: endog.clone(),
                                exog_cols: exog.iter().cloned().collect(),
                                order,
                                max_fit_date,
                                model_quarters,
                            });
                        }
                    }
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.endog_cols.len()
            * self.order.len()
            * self.exog_cols.len()
            * self.model_quarters.len()
            * self.max_fit_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Inputs for `run_possible_models`.
#[derive(Debug, Clone)]
pub struct ModelSpace {
    pub target: String,
    pub other_endog: Vec<String>,
    /// Variables with a projection for the forecast horizon.
    pub exog_allow: Vec<String>,
    pub orders: Vec<usize>,
    pub max_fit_dates: Vec<Quarter>,
    pub model_quarters: Vec<bool>,
    pub alpha: f64,
    pub max_other_endog: usize,
    pub max_exog: usize,
}

/// Scores candidates against one table and one (unfitted or fitted) pipeline.
#[derive(Debug, Clone)]
pub struct GridSearchEngine {
    unscaled: Arc<FeatureTable>,
    pipeline: TransformPipeline,
    n_splits: usize,
    workers: Option<usize>,
}

impl GridSearchEngine {
    pub fn new(unscaled: FeatureTable, pipeline: TransformPipeline, n_splits: usize) -> Self {
        Self {
            unscaled: Arc::new(unscaled),
            pipeline,
            n_splits,
            workers: None,
        }
    }

    /// Fix the worker pool size (default: rayon's global pool).
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn unscaled(&self) -> &FeatureTable {
        &self.unscaled
    }

    pub fn pipeline(&self) -> &TransformPipeline {
        &self.pipeline
    }

    pub fn grid_search(&self, grid: &ParamGrid, target: &str) -> Result<Vec<FitResult>> {
        grid.validate()?;
        self.evaluate(grid.candidates(), target)
    }

    /// Score `candidates` and return the survivors, best first.
    ///
    /// Ties keep candidate order.
    pub fn evaluate(&self, candidates: Vec<FitCandidate>, target: &str) -> Result<Vec<FitResult>> {
        if let Some(bad) = candidates.iter().find(|c| c.endog_cols.is_empty()) {
            return Err(ForecastError::InvalidGrid(format!(
                "candidate has no endog columns: {}",
                bad.label()
            )));
        }
        if let Some(bad) = candidates.iter().find(|c| c.primary() != target) {
            return Err(ForecastError::InvalidGrid(format!(
                "candidate primary endog `{}` is not the target `{target}`",
                bad.primary()
            )));
        }
        let total = candidates.len();
        info!(candidates = total, target, "grid search started");

        let outcomes = self.run_parallel(&candidates)?;

        let mut results = Vec::with_capacity(total);
        let mut skipped = 0usize;
        for (candidate, outcome) in candidates.iter().zip(outcomes) {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) if e.is_recoverable() => {
                    skipped += 1;
                    warn!(candidate = %candidate.label(), error = %e, "candidate skipped");
                }
                Err(e) => return Err(e),
            }
        }
        if results.is_empty() {
            return Err(ForecastError::NoViableModel(total));
        }
        results.sort_by(|a, b| a.target_mape.total_cmp(&b.target_mape));
        info!(scored = results.len(), skipped, "grid search finished");
        Ok(results)
    }

    fn run_parallel(&self, candidates: &[FitCandidate]) -> Result<Vec<Result<FitResult>>> {
        let score = || {
            candidates
                .par_iter()
                .map(|c| walk_forward(&self.unscaled, &self.pipeline, c, self.n_splits))
                .collect::<Vec<_>>()
        };
        match self.workers {
            None => Ok(score()),
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| ForecastError::InvalidInput(format!("worker pool: {e}")))?;
                Ok(pool.install(score))
            }
        }
    }

    /// Enumerate candidates from the Granger matrix and score them all.
    pub fn run_possible_models(&self, matrix: &GrangerMatrix, space: &ModelSpace) -> Result<Vec<FitResult>> {
        let candidates = possible_candidates(matrix, space)?;
        self.evaluate(candidates, &space.target)
    }
}

/// The candidate list `run_possible_models` evaluates.
///
/// Companion sets go from `max_other_endog` members down to one (or just the
/// target alone when `max_other_endog` is zero or there are no companions).
/// For each, exog subsets go from `min(max_exog, admissible)` members down to
/// one, or no exog at all when `max_exog` is zero or nothing is admissible.
pub fn possible_candidates(matrix: &GrangerMatrix, space: &ModelSpace) -> Result<Vec<FitCandidate>> {
    let mut companions: Vec<Vec<String>> = (1..=space.max_other_endog)
        .rev()
        .flat_map(|k| combinations(&space.other_endog, k))
        .collect();
    if companions.is_empty() {
        companions.push(Vec::new());
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for others in companions {
        let endog: Vec<String> = std::iter::once(space.target.clone()).chain(others).collect();
        let admissible = possible_exog(matrix, &endog[..], &space.exog_allow[..], space.alpha)?;
        let mut exog_sets: Vec<Vec<String>> = (1..=space.max_exog.min(admissible.len()))
            .rev()
            .flat_map(|k| combinations(&admissible, k))
            .collect();
        if exog_sets.is_empty() {
            exog_sets.push(Vec::new());
        }
        info!(endog = %endog.join(","), admissible = admissible.len(), "exog candidates");

        let grid = ParamGrid {
            endog_cols: vec![endog],
            order: space.orders.clone(),
            max_fit_date: space.max_fit_dates.clone(),
            exog_cols: exog_sets,
            model_quarters: space.model_quarters.clone(),
        };
        if grid.is_empty() {
            continue;
        }
        grid.validate()?;
        for c in grid.candidates() {
            if seen.insert(c.clone()) {
                out.push(c);
            }
        }
    }
    Ok(out)
}

/// `k`-combinations in lexicographic index order.
pub fn combinations<T: Clone>(items: &[T], k: usize) -> Vec<Vec<T>> {
    if k == 0 || k > items.len() {
        return Vec::new();
    }
    let n = items.len();
    let mut idx: Vec<usize> = (0..k).collect();
    let mut out = Vec::new();
    loop {
        out.push(idx.iter().map(|&i| items[i].clone()).collect());
        let Some(pos) = (0..k).rev().find(|&i| idx[i] != i + n - k) else {
            return out;
        };
        idx[pos] += 1;
        for j in pos + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GuideEntry, StationarityGuide};
    use rand::prelude::*;
    use rand::rngs::StdRng;
    use rand_distr::Normal;

    fn q(y: i32, n: u8) -> Quarter {
        Quarter::new(y, n).unwrap()
    }

    const VARS: [&str; 4] = ["Base", "A", "B", "C"];

    fn pipeline() -> TransformPipeline {
        TransformPipeline::new(StationarityGuide::from_entries(VARS.map(|v| GuideEntry {
            variable: v.to_string(),
            loggable: true,
            norm: 1.0,
            ndiffs: 1,
            periods: 1,
        })))
    }

    fn table() -> FeatureTable {
        let mut rng = StdRng::seed_from_u64(21);
        let noise = Normal::new(0.0, 0.004).unwrap();
        let mut levels = [300.0, 100.0, 50.0, 20.0];
        let mut cols = vec![Vec::new(); 4];
        for _ in 0..72 {
            let ga = 0.01 + noise.sample(&mut rng);
            let gb = 0.005 + noise.sample(&mut rng);
            let gc = 0.002 + noise.sample(&mut rng);
            let gbase = 0.004 + 0.6 * ga + 0.2 * gb + 0.3 * noise.sample(&mut rng);
            for (level, g) in levels.iter_mut().zip([gbase, ga, gb, gc]) {
                *level *= 1.0 + g;
            }
            for (c, l) in cols.iter_mut().zip(levels) {
                c.push(l);
            }
        }
        FeatureTable::new(q(2000, 1), VARS.map(String::from).to_vec(), cols).unwrap()
    }

    fn engine() -> GridSearchEngine {
        GridSearchEngine::new(table(), pipeline(), 3).with_workers(Some(2))
    }

    fn grid() -> ParamGrid {
        ParamGrid {
            endog_cols: vec![vec!["Base".into()]],
            order: vec![1, 2],
            max_fit_date: vec![q(2017, 4)],
            exog_cols: vec![vec!["A".into()], vec!["A".into(), "B".into()], vec!["C".into()]],
            model_quarters: vec![false],
        }
    }

    #[test]
    fn grid_json_requires_known_keys() {
        let ok = r#"{"endog_cols": [["Base"]], "order": [1, 2], "max_fit_date": ["2017-10-01"]}"#;
        let g = ParamGrid::from_json(ok).unwrap();
        assert_eq!(g.exog_cols, vec![Vec::<String>::new()]);
        assert_eq!(g.len(), 2);

        let extra = r#"{"endog_cols": [["Base"]], "order": [1], "max_fit_date": ["2017Q4"], "trend": ["c"]}"#;
        assert!(matches!(ParamGrid::from_json(extra), Err(ForecastError::InvalidGrid(_))));

        let missing = r#"{"endog_cols": [["Base"]], "order": [1]}"#;
        assert!(matches!(ParamGrid::from_json(missing), Err(ForecastError::InvalidGrid(_))));
    }

    #[test]
    fn two_orders_by_three_exog_sets_gives_six_ranked_results() {
        let results = engine().grid_search(&grid(), "Base").unwrap();
        assert_eq!(results.len(), 6);
        assert!(results.windows(2).all(|w| w[0].target_mape <= w[1].target_mape));
        let distinct: HashSet<_> = results.iter().map(|r| r.candidate.clone()).collect();
        assert_eq!(distinct.len(), 6);
    }

    #[test]
    fn search_is_deterministic() {
        let a = engine().grid_search(&grid(), "Base").unwrap();
        let b = GridSearchEngine::new(table(), pipeline(), 3)
            .with_workers(Some(4))
            .grid_search(&grid(), "Base")
            .unwrap();
        let order = |r: &[FitResult]| r.iter().map(|x| x.candidate.clone()).collect::<Vec<_>>();
        assert_eq!(order(&a), order(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn failing_candidates_are_skipped() {
        let mut g = grid();
        // Far too many lags for the sample: a recoverable fit failure.
        g.order = vec![1, 30];
        let results = engine().grid_search(&g, "Base").unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.candidate.order == 1));

        g.order = vec![30];
        assert_eq!(
            engine().grid_search(&g, "Base").unwrap_err(),
            ForecastError::NoViableModel(3)
        );
    }

    #[test]
    fn contract_violations_abort() {
        let mut g = grid();
        g.exog_cols = vec![vec!["Missing".into()]];
        assert_eq!(
            engine().grid_search(&g, "Base").unwrap_err(),
            ForecastError::UnknownColumn("Missing".into())
        );
        assert!(matches!(
            engine().grid_search(&grid(), "A"),
            Err(ForecastError::InvalidGrid(_))
        ));
    }

    #[test]
    fn candidate_without_endog_is_rejected() {
        let empty = FitCandidate {
            endog_cols: Vec::new(),
            exog_cols: Default::default(),
            order: 1,
            max_fit_date: q(2017, 4),
            model_quarters: false,
        };
        assert_eq!(empty.primary(), "");
        let err = engine().evaluate(vec![empty], "Base").unwrap_err();
        assert!(
            matches!(&err, ForecastError::InvalidGrid(msg) if msg.contains("no endog")),
            "{err:?}"
        );

        let mut g = grid();
        g.endog_cols = vec![Vec::new()];
        assert!(matches!(
            engine().grid_search(&g, "Base"),
            Err(ForecastError::InvalidGrid(_))
        ));
    }

    #[test]
    fn combinations_in_lexicographic_order() {
        let c = combinations(&["a", "b", "c"], 2);
        assert_eq!(c, vec![vec!["a", "b"], vec!["a", "c"], vec!["b", "c"]]);
        assert!(combinations(&["a"], 2).is_empty());
    }

    #[test]
    fn possible_candidates_follow_the_granger_matrix() {
        // p[target][driver] over [Base, A, B, C].
        let m = GrangerMatrix::from_values(
            VARS.map(String::from).to_vec(),
            vec![
                vec![1.0, 0.01, 0.02, 0.9],
                vec![0.5, 1.0, 0.5, 0.5],
                vec![0.5, 0.5, 1.0, 0.5],
                vec![0.01, 0.01, 0.01, 1.0],
            ],
        )
        .unwrap();
        let space = ModelSpace {
            target: "Base".into(),
            other_endog: vec!["C".into()],
            exog_allow: vec!["A".into(), "B".into()],
            orders: vec![1, 2],
            max_fit_dates: vec![q(2017, 4)],
            model_quarters: vec![false],
            alpha: 0.05,
            max_other_endog: 1,
            max_exog: 4,
        };
        let c = possible_candidates(&m, &space).unwrap();
        // endog [Base, C]; exog {A,B}, {A}, {B}; two orders.
        assert_eq!(c.len(), 6);
        assert!(c.iter().all(|x| x.endog_cols == vec!["Base".to_string(), "C".to_string()]));
        assert_eq!(c[0].exog_cols.len(), 2);

        let none = ModelSpace { max_exog: 0, max_other_endog: 0, ..space };
        let c = possible_candidates(&m, &none).unwrap();
        assert_eq!(c.len(), 2);
        assert!(c.iter().all(|x| x.exog_cols.is_empty() && x.endog_cols.len() == 1));

        // No companions and nothing admissible: the target alone, no exog.
        let bare = ModelSpace {
            other_endog: Vec::new(),
            exog_allow: vec!["C".into()],
            max_other_endog: 2,
            ..none
        };
        let c = possible_candidates(&m, &bare).unwrap();
        assert_eq!(c.len(), 2);
        assert!(c.iter().all(|x| x.exog_cols.is_empty() && x.endog_cols == vec!["Base".to_string()]));
    }

    #[test]
    fn run_possible_models_ranks_everything() {
        let m = GrangerMatrix::from_values(
            VARS.map(String::from).to_vec(),
            vec![
                vec![1.0, 0.01, 0.02, 0.9],
                vec![0.5, 1.0, 0.5, 0.5],
                vec![0.5, 0.5, 1.0, 0.5],
                vec![0.5, 0.5, 0.5, 1.0],
            ],
        )
        .unwrap();
        let space = ModelSpace {
            target: "Base".into(),
            other_endog: Vec::new(),
            exog_allow: vec!["A".into(), "B".into()],
            orders: vec![1],
            max_fit_dates: vec![q(2017, 4)],
            model_quarters: vec![false, true],
            alpha: 0.05,
            max_other_endog: 0,
            max_exog: 2,
        };
        let results = engine().run_possible_models(&m, &space).unwrap();
        assert_eq!(results.len(), 6);
        assert!(results.windows(2).all(|w| w[0].target_mape <= w[1].target_mape));
    }
}
