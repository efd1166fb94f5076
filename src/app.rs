//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - installs the tracing subscriber
//! - runs the shared pipeline (`pipeline`)
//! - prints reports
//! - writes optional exports

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, GrangersArgs, GuideArgs, GuideFlags, InputArgs, ModelArgs, OutputArgs, SearchArgs};
use crate::domain::ForecastConfig;
use crate::error::AppError;
use crate::select::possible_endog;

pub mod pipeline;

/// Entry point for the `tbf` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Guide(args) => handle_guide(args),
        Command::Grangers(args) => handle_grangers(args),
        Command::Search(args) => handle_search(&search_config(&args), false),
        Command::Forecast(args) => handle_search(&search_config(&args), true),
        Command::Demo(args) => {
            let mut config = model_config(&args.model, &args.output);
            config.target = args.target;
            config.sample_quarters = args.quarters;
            apply_guide_flags(&mut config, &args.guide);
            handle_search(&config, true)
        }
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second install (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_guide(args: GuideArgs) -> Result<(), AppError> {
    let prepared = prepare_input(&args.input)?;
    println!("{}", crate::report::format_guide(&prepared.guide).trim_end());
    Ok(())
}

fn handle_grangers(args: GrangersArgs) -> Result<(), AppError> {
    let prepared = prepare_input(&args.input)?;
    let matrix = pipeline::granger_matrix(&prepared, args.max_lag, args.max_date)?;
    println!("{}", crate::report::format_grangers(&matrix).trim_end());
    println!();
    let corr = crate::stats::correlation_matrix(&prepared.scaled);
    println!(
        "{}",
        crate::report::format_correlations(prepared.scaled.columns(), &corr).trim_end()
    );

    if let Some(target) = &args.target {
        let companions = possible_endog(&matrix, target, args.alpha)?;
        println!();
        print!("{}", crate::report::format_endog_suggestions(target, &companions));
    }
    Ok(())
}

fn prepare_input(input: &InputArgs) -> Result<pipeline::Prepared, AppError> {
    let raw = crate::io::load_feature_table(&input.features)?;
    let guide_opts = pipeline::guide_options(input.guide.guide_exclude_after, &input.guide.yoy_columns);
    pipeline::prepare(&raw, input.min_year, &guide_opts)
}

fn handle_search(config: &ForecastConfig, aggregate: bool) -> Result<(), AppError> {
    let run = pipeline::run(config, aggregate)?;

    if run.matrix.is_some() {
        print!("{}", crate::report::format_endog_suggestions(&config.target, &run.companions));
        println!();
    }
    println!("{}", crate::report::format_ranking(&run.fits, config.show_top).trim_end());

    if let Some(forecast) = &run.forecast {
        println!();
        println!("{}", crate::report::format_aggregate(forecast).trim_end());
    }

    // Optional exports.
    if let (Some(path), Some(forecast)) = (&config.export_forecast, &run.forecast) {
        crate::io::write_forecast_csv(path, forecast)?;
    }
    if let Some(path) = &config.export_fits {
        crate::io::write_fits_json(path, &run.fits)?;
    }
    Ok(())
}

fn search_config(args: &SearchArgs) -> ForecastConfig {
    let mut config = model_config(&args.model, &args.output);
    config.features_path = Some(args.input.features.clone());
    config.min_year = args.input.min_year;
    apply_guide_flags(&mut config, &args.input.guide);
    config.cbo_path = args.cbo.clone();
    config.target = args.target.clone();
    config
}

fn apply_guide_flags(config: &mut ForecastConfig, flags: &GuideFlags) {
    config.guide_exclude_after = flags.guide_exclude_after;
    config.yoy_columns = flags.yoy_columns.clone();
}

pub fn model_config(model: &ModelArgs, output: &OutputArgs) -> ForecastConfig {
    ForecastConfig {
        grid_path: model.grid.clone(),
        other_endog: model.other_endog.clone(),
        exog_allow: model.exog.clone(),
        orders: model.orders.clone(),
        max_fit_dates: model.max_fit_dates.clone(),
        model_quarters: model.model_quarters.clone(),
        alpha: model.alpha,
        granger_max_lag: model.max_lag,
        granger_max_date: model.granger_max_date,
        max_other_endog: model.max_other_endog,
        max_exog: model.max_exog,
        n_splits: model.splits,
        top_k: model.top_k,
        show_top: model.top,
        plan_start_year: model.plan_start,
        plan_years: model.plan_years,
        workers: model.workers,
        seed: model.seed,
        export_forecast: output.export.clone(),
        export_fits: output.export_fits.clone(),
        ..ForecastConfig::default()
    }
}
