//! Shared forecasting workflow used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core flow:
//! load -> prepare -> guide -> pipeline -> Granger matrix -> candidates
//! -> walk-forward search -> top-K aggregation
//!
//! The subcommands then only choose how far to run and what to print.

use std::path::Path;

use tracing::info;

use crate::data::{SampleConfig, generate_sample};
use crate::domain::{FeatureTable, FitResult, ForecastConfig, PlanHorizon, Quarter, StationarityGuide};
use crate::error::{AppError, ForecastError};
use crate::fit::{AggregateForecast, GridSearchEngine, ModelSpace, ParamGrid, average_forecast};
use crate::io::load_feature_table;
use crate::select::{GrangerMatrix, GrangerOptions, grangers_matrix, possible_endog};
use crate::transform::{GuideOptions, TransformPipeline, build_guide, prepare_features};

/// Historical features plus the optional projection of future indicators.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub features: FeatureTable,
    pub projection: Option<FeatureTable>,
}

/// Guide and fitted pipeline over the prepared features.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub features: FeatureTable,
    pub guide: StationarityGuide,
    pub pipeline: TransformPipeline,
    pub scaled: FeatureTable,
}

/// All computed outputs of a `search` / `forecast` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub prepared: Prepared,
    /// `None` when an explicit grid was searched.
    pub matrix: Option<GrangerMatrix>,
    pub companions: Vec<String>,
    pub exog_allow: Vec<String>,
    pub fits: Vec<FitResult>,
    pub horizon: PlanHorizon,
    pub forecast: Option<AggregateForecast>,
}

/// Load the features named by `config` (or generate the synthetic sample).
pub fn load_inputs(config: &ForecastConfig) -> Result<Inputs, AppError> {
    let Some(path) = &config.features_path else {
        let inputs = sample_inputs(config.sample_quarters, config.plan_years, config.seed)?;
        info!(quarters = inputs.features.len(), seed = config.seed, "generated synthetic sample");
        return Ok(inputs);
    };

    let features = load_feature_table(path)?;
    let projection = config
        .cbo_path
        .as_deref()
        .map(load_feature_table)
        .transpose()?;
    info!(
        path = %path.display(),
        rows = features.len(),
        columns = features.columns().len(),
        "loaded features"
    );
    Ok(Inputs { features, projection })
}

/// Guide options from the exclusion date and the YoY list (empty keeps the defaults).
pub fn guide_options(exclude_after: Option<Quarter>, yoy_columns: &[String]) -> GuideOptions {
    let defaults = GuideOptions::default();
    GuideOptions {
        yoy_columns: if yoy_columns.is_empty() {
            defaults.yoy_columns
        } else {
            yoy_columns.to_vec()
        },
        exclude_after,
        ..defaults
    }
}

/// Clean the raw table, build the guide and fit the pipeline.
pub fn prepare(raw: &FeatureTable, min_year: Option<i32>, guide_opts: &GuideOptions) -> Result<Prepared, AppError> {
    let features = prepare_features(raw, min_year)?;
    let guide = build_guide(&features, guide_opts)?;
    let (pipeline, scaled) = TransformPipeline::new(guide.clone()).fit_transform(&features)?;
    info!(
        variables = guide.len(),
        rows = features.len(),
        scaled_rows = scaled.len(),
        "features prepared"
    );
    Ok(Prepared {
        features,
        guide,
        pipeline,
        scaled,
    })
}

pub fn granger_matrix(
    prepared: &Prepared,
    max_lag: usize,
    max_date: Option<Quarter>,
) -> Result<GrangerMatrix, AppError> {
    let opts = GrangerOptions {
        max_lag,
        max_date,
        ..GrangerOptions::default()
    };
    Ok(grangers_matrix(&prepared.scaled, &opts)?)
}

/// Load, prepare and search; aggregate only when `aggregate` is set.
pub fn run(config: &ForecastConfig, aggregate: bool) -> Result<RunOutput, AppError> {
    let inputs = load_inputs(config)?;
    run_with_inputs(config, inputs, aggregate)
}

pub fn run_with_inputs(config: &ForecastConfig, inputs: Inputs, aggregate: bool) -> Result<RunOutput, AppError> {
    let guide_opts = guide_options(config.guide_exclude_after, &config.yoy_columns);
    let prepared = prepare(&inputs.features, config.min_year, &guide_opts)?;
    let target = config.target.as_str();
    let history_end = prepared
        .features
        .select(&[target])?
        .trim_incomplete()
        .end()
        .ok_or_else(|| ForecastError::InsufficientData(format!("no history for `{target}`")))?;
    let horizon = PlanHorizon {
        plan_start_year: config
            .plan_start_year
            .unwrap_or(history_end.fiscal_year() + 1),
        n_years: config.plan_years,
    };

    let exog_allow = if config.exog_allow.is_empty() {
        inputs
            .projection
            .as_ref()
            .map(|p| {
                p.columns()
                    .iter()
                    .filter(|c| prepared.features.column_index(c).is_some())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    } else {
        config.exog_allow.clone()
    };

    let engine = GridSearchEngine::new(prepared.features.clone(), prepared.pipeline.clone(), config.n_splits)
        .with_workers(config.workers);

    let (matrix, companions, fits) = match &config.grid_path {
        Some(path) => {
            let grid = read_grid(path)?;
            info!(path = %path.display(), candidates = grid.len(), "explicit grid");
            (None, Vec::new(), engine.grid_search(&grid, target)?)
        }
        None => {
            let matrix = granger_matrix(&prepared, config.granger_max_lag, config.granger_max_date)?;
            let companions = if config.other_endog.is_empty() {
                possible_endog(&matrix, target, config.alpha)?
                    .into_iter()
                    .filter(|v| !exog_allow.contains(v))
                    .collect()
            } else {
                config.other_endog.clone()
            };
            info!(base = target, companions = ?companions, exog = ?exog_allow, "model space");

            let space = ModelSpace {
                target: target.to_string(),
                other_endog: companions.clone(),
                exog_allow: exog_allow.clone(),
                orders: config.orders.clone(),
                max_fit_dates: if config.max_fit_dates.is_empty() {
                    vec![history_end]
                } else {
                    config.max_fit_dates.clone()
                },
                model_quarters: config.model_quarters.clone(),
                alpha: config.alpha,
                max_other_endog: config.max_other_endog,
                max_exog: config.max_exog,
            };
            let fits = engine.run_possible_models(&matrix, &space)?;
            (Some(matrix), companions, fits)
        }
    };

    let forecast = if aggregate {
        let agg = average_forecast(
            engine.unscaled(),
            engine.pipeline(),
            &fits,
            target,
            config.top_k,
            &horizon,
            inputs.projection.as_ref(),
        )?;
        info!(
            base = target,
            candidates = agg.candidates.len(),
            years = agg.average.len(),
            "forecast aggregated"
        );
        Some(agg)
    } else {
        None
    };

    Ok(RunOutput {
        prepared,
        matrix,
        companions,
        exog_allow,
        fits,
        horizon,
        forecast,
    })
}

fn read_grid(path: &Path) -> Result<ParamGrid, AppError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read grid '{}': {e}", path.display())))?;
    Ok(ParamGrid::from_json(&text)?)
}

/// Synthetic history plus an indicator projection long enough for the plan.
pub fn sample_inputs(quarters: usize, plan_years: u32, seed: u64) -> Result<Inputs, AppError> {
    let sample = generate_sample(&SampleConfig {
        start: Quarter::new(2000, 1)?,
        n_quarters: quarters,
        horizon_quarters: 4 * (plan_years as usize + 2),
        seed,
    })?;
    Ok(Inputs {
        features: sample.features,
        projection: Some(sample.projection),
    })
}
