//! Command-line parsing for the tax-base forecaster.
//!
//! Argument parsing and command dispatch stay separate from the
//! selection/fitting code; `app` turns these structs into a `ForecastConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::Quarter;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "tbf", version, about = "Municipal tax-base forecaster (VAR grid search)")]
pub struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build and print the stationarity guide for a feature CSV.
    Guide(GuideArgs),
    /// Print the Granger p-value matrix of the scaled features.
    Grangers(GrangersArgs),
    /// Search the candidate space for one target and print the ranking.
    Search(SearchArgs),
    /// Search, then average the top-K candidates into fiscal-year totals.
    Forecast(SearchArgs),
    /// Run `forecast` on a seeded synthetic dataset.
    Demo(DemoArgs),
}

/// Where the historical table comes from.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Historical feature CSV (first column is the date).
    #[arg(long, value_name = "CSV")]
    pub features: PathBuf,

    /// Drop rows before this calendar year.
    #[arg(long)]
    pub min_year: Option<i32>,

    #[command(flatten)]
    pub guide: GuideFlags,
}

/// Stationarity-guide settings shared by every subcommand.
#[derive(Debug, Args, Clone, Default)]
pub struct GuideFlags {
    /// Ignore quarters after this one when testing stationarity (e.g. 2019Q4).
    #[arg(long, value_parser = parse_quarter)]
    pub guide_exclude_after: Option<Quarter>,

    /// Bases differenced year over year (default: GrossReceiptsBase,NetIncomeBase,NPTBase).
    #[arg(long, value_delimiter = ',')]
    pub yoy_columns: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct GuideArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct GrangersArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Maximum Granger lag.
    #[arg(long, default_value_t = 6)]
    pub max_lag: usize,

    /// Only use quarters up to this date (e.g. 2019Q4).
    #[arg(long, value_parser = parse_quarter)]
    pub max_date: Option<Quarter>,

    /// Also list two-way companions for this base.
    #[arg(long)]
    pub target: Option<String>,

    /// Significance level for the companion list.
    #[arg(long, default_value_t = 0.05)]
    pub alpha: f64,
}

#[derive(Debug, Args, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Official indicator projection CSV (future exogenous values).
    #[arg(long, value_name = "CSV")]
    pub cbo: Option<PathBuf>,

    /// Tax base to forecast.
    #[arg(short = 't', long)]
    pub target: String,

    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct DemoArgs {
    /// Tax base to forecast.
    #[arg(short = 't', long, default_value = "WageBase")]
    pub target: String,

    /// Quarters of synthetic history.
    #[arg(long, default_value_t = 96)]
    pub quarters: usize,

    #[command(flatten)]
    pub guide: GuideFlags,

    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Candidate space and search settings.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Explicit parameter grid (JSON) instead of Granger-driven candidates.
    #[arg(long, value_name = "JSON")]
    pub grid: Option<PathBuf>,

    /// Companion endog candidates (default: two-way Granger companions).
    #[arg(long, value_delimiter = ',')]
    pub other_endog: Vec<String>,

    /// Exogenous allow-list (default: the projection's columns).
    #[arg(long, value_delimiter = ',')]
    pub exog: Vec<String>,

    /// VAR lag orders to try.
    #[arg(long, value_delimiter = ',', default_values_t = [1usize, 2, 3, 4])]
    pub orders: Vec<usize>,

    /// Fit cutoffs to try (default: last history quarter).
    #[arg(long, value_delimiter = ',', value_parser = parse_quarter)]
    pub max_fit_dates: Vec<Quarter>,

    /// Quarter-dummy settings to try.
    #[arg(long, value_delimiter = ',', default_values_t = [false])]
    pub model_quarters: Vec<bool>,

    /// Granger significance level.
    #[arg(long, default_value_t = 0.05)]
    pub alpha: f64,

    /// Maximum Granger lag.
    #[arg(long, default_value_t = 6)]
    pub max_lag: usize,

    /// Only use quarters up to this date for the Granger matrix.
    #[arg(long, value_parser = parse_quarter)]
    pub granger_max_date: Option<Quarter>,

    /// Most companion endog variables per candidate.
    #[arg(long, default_value_t = 1)]
    pub max_other_endog: usize,

    /// Most exogenous regressors per candidate.
    #[arg(long, default_value_t = 4)]
    pub max_exog: usize,

    /// Walk-forward splits.
    #[arg(long, default_value_t = 3)]
    pub splits: usize,

    /// Candidates averaged into the final forecast.
    #[arg(long, default_value_t = 1)]
    pub top_k: usize,

    /// Ranking rows to print.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// First plan fiscal year (default: the year after history ends).
    #[arg(long)]
    pub plan_start: Option<i32>,

    /// Plan length in fiscal years.
    #[arg(long, default_value_t = 5)]
    pub plan_years: u32,

    /// Worker threads (default: one per core).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Random seed (synthetic data).
    #[arg(long, default_value_t = 12345)]
    pub seed: u64,
}

#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Export fiscal-year forecast to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export ranked fits to JSON.
    #[arg(long = "export-fits", value_name = "JSON")]
    pub export_fits: Option<PathBuf>,
}

fn parse_quarter(s: &str) -> Result<Quarter, String> {
    Quarter::parse(s).map_err(|e| e.to_string())
}
