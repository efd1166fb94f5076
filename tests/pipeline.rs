//! End-to-end runs on the seeded synthetic dataset.

use approx::assert_relative_eq;

use taxbase_forecast::app::pipeline::{Inputs, guide_options, prepare, run_with_inputs, sample_inputs};
use taxbase_forecast::domain::{FitCandidate, ForecastConfig, Quarter};
use taxbase_forecast::io::{read_feature_table, write_fits_json, write_forecast_csv};
use taxbase_forecast::transform::{GuideOptions, is_base_column};

fn inputs() -> Inputs {
    sample_inputs(96, 5, 7).unwrap()
}

fn config() -> ForecastConfig {
    ForecastConfig {
        target: "WageBase".into(),
        orders: vec![1, 2],
        max_exog: 2,
        top_k: 2,
        workers: Some(2),
        ..ForecastConfig::default()
    }
}

#[test]
fn guide_differences_every_column_and_bases_once() {
    let prepared = prepare(&inputs().features, None, &GuideOptions::default()).unwrap();
    assert_eq!(prepared.guide.len(), 7);
    for e in prepared.guide.entries() {
        assert!(e.ndiffs >= 1, "{}", e.variable);
        if is_base_column(&e.variable) {
            assert_eq!(e.ndiffs, 1, "{}", e.variable);
        }
        assert!(e.periods == 1 || e.periods == 4);
    }
    let spread = prepared.guide.get("YieldSpread").unwrap();
    assert!(!spread.loggable);
    assert_eq!(prepared.guide.get("NPTBase").unwrap().periods, 4);
}

#[test]
fn yoy_list_and_exclusion_reach_the_guide() {
    let features = inputs().features;
    let opts = guide_options(Some(Quarter::new(2019, 4).unwrap()), &["WageBase".to_string()]);
    let prepared = prepare(&features, None, &opts).unwrap();
    assert_eq!(prepared.guide.get("WageBase").unwrap().periods, 4);
    assert_eq!(prepared.guide.get("NPTBase").unwrap().periods, 1);

    let cfg = ForecastConfig {
        yoy_columns: vec!["WageBase".into()],
        guide_exclude_after: Some(Quarter::new(2019, 4).unwrap()),
        ..config()
    };
    let out = run_with_inputs(&cfg, inputs(), false).unwrap();
    assert_eq!(out.prepared.guide, prepared.guide);
}

#[test]
fn scaled_features_invert_to_the_prepared_table() {
    let prepared = prepare(&inputs().features, None, &GuideOptions::default()).unwrap();
    let restored = prepared.pipeline.inverse_transform(&prepared.scaled).unwrap();
    assert!(!restored.is_empty());
    for name in prepared.features.columns() {
        for q in restored.quarters() {
            let expected = prepared.features.get(name, q).unwrap();
            let got = restored.get(name, q).unwrap();
            assert_relative_eq!(got, expected, max_relative = 1e-6);
        }
    }
}

#[test]
fn search_order_does_not_depend_on_workers() {
    let one = run_with_inputs(&ForecastConfig { workers: Some(1), ..config() }, inputs(), false).unwrap();
    let four = run_with_inputs(&ForecastConfig { workers: Some(4), ..config() }, inputs(), false).unwrap();
    let order = |fits: &[taxbase_forecast::domain::FitResult]| -> Vec<FitCandidate> {
        fits.iter().map(|f| f.candidate.clone()).collect()
    };
    assert!(!one.fits.is_empty());
    assert_eq!(order(&one.fits), order(&four.fits));
    assert!(one.fits.windows(2).all(|w| w[0].target_mape <= w[1].target_mape));
    assert!(one.fits.iter().all(|f| f.candidate.primary() == "WageBase"));
    assert!(one.matrix.is_some());
}

#[test]
fn forecast_covers_the_plan_years() {
    let out = run_with_inputs(&config(), inputs(), true).unwrap();
    let forecast = out.forecast.unwrap();
    // History ends 2023Q4 (FY2024), so the plan is FY2025..FY2029.
    assert_eq!(out.horizon.plan_start_year, 2025);
    assert_eq!(forecast.candidates.len(), out.fits.len().min(2));
    assert_eq!(forecast.candidates[0], out.fits[0].candidate);
    for fy in 2025..=2029 {
        let v = forecast.average[&fy];
        assert!(v.is_finite() && v > 0.0, "FY{fy}: {v}");
    }
    assert!(!forecast.average.contains_key(&2030));

    let quarterly = &forecast.quarterly[0];
    assert_eq!(quarterly.forecast_start, Quarter::new(2024, 1).unwrap());
    assert_eq!(quarterly.quarters().last().unwrap().0, Quarter::new(2029, 2).unwrap());
}

#[test]
fn explicit_grid_and_exports() {
    let dir = std::env::temp_dir().join(format!("tbf-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let grid = dir.join("grid.json");
    std::fs::write(
        &grid,
        r#"{"endog_cols": [["WageBase"]], "order": [1, 2], "max_fit_date": ["2023Q4"],
            "exog_cols": [["GDP"], ["Employment", "CPI"]]}"#,
    )
    .unwrap();

    let cfg = ForecastConfig {
        grid_path: Some(grid),
        ..config()
    };
    let out = run_with_inputs(&cfg, inputs(), true).unwrap();
    assert!(out.matrix.is_none());
    assert_eq!(out.fits.len(), 4);

    let csv_path = dir.join("forecast.csv");
    let json_path = dir.join("fits.json");
    write_forecast_csv(&csv_path, out.forecast.as_ref().unwrap()).unwrap();
    write_fits_json(&json_path, &out.fits).unwrap();

    let text = std::fs::read_to_string(&csv_path).unwrap();
    assert!(text.starts_with("fiscal_year,WageBase,candidate_1,candidate_2"));
    let fits: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(fits.as_array().unwrap().len(), 4);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn unknown_target_is_a_caller_error() {
    let cfg = ForecastConfig {
        target: "MissingBase".into(),
        ..config()
    };
    let err = run_with_inputs(&cfg, inputs(), false).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn csv_ingest_feeds_the_pipeline() {
    let sample = inputs();
    let mut csv = String::from("date");
    for c in sample.features.columns() {
        csv.push(',');
        csv.push_str(c);
    }
    csv.push('\n');
    for (i, q) in sample.features.quarters().enumerate() {
        csv.push_str(&q.to_string());
        for v in sample.features.row(i) {
            csv.push_str(&format!(",{v}"));
        }
        csv.push('\n');
    }
    let table = read_feature_table(csv.as_bytes()).unwrap();
    assert_eq!(table, sample.features);
}
