//! Stationarity guide builder.
//!
//! For each column we decide, once, how to make it approximately stationary:
//!
//! 1. log it if every observed value is strictly positive, otherwise divide by
//!    the power of ten nearest its mean (keeps sign, brings values near 1)
//! 2. difference it (period 1, or 4 for year-over-year bases) until the ADF
//!    test rejects a unit root
//!
//! Policy:
//! - at least one difference is always applied
//! - columns whose name contains "Base" are never differenced more than once,
//!   even if still non-stationary

use tracing::debug;

use crate::domain::{FeatureTable, GuideEntry, Quarter, StationarityGuide};
use crate::error::{ForecastError, Result};
use crate::stats::adf_test;

/// Minimum observations for a meaningful ADF test.
pub const MIN_TEST_OBS: usize = 8;

/// Tax bases differenced year over year instead of quarter over quarter.
pub const DEFAULT_YOY_COLUMNS: [&str; 3] = ["GrossReceiptsBase", "NetIncomeBase", "NPTBase"];

#[derive(Debug, Clone)]
pub struct GuideOptions {
    pub yoy_columns: Vec<String>,
    /// ADF significance level.
    pub alpha: f64,
    /// Ignore observations after this quarter when testing (e.g. a shock year).
    pub exclude_after: Option<Quarter>,
}

impl Default for GuideOptions {
    fn default() -> Self {
        Self {
            yoy_columns: DEFAULT_YOY_COLUMNS.iter().map(|s| s.to_string()).collect(),
            alpha: 0.05,
            exclude_after: None,
        }
    }
}

/// Hook for the per-base diagnostics (the reporting side may render them).
pub trait StationarityObserver {
    fn on_base_column(&self, _variable: &str, _differenced: &[f64], _stationary: bool) {}
}

/// Emits a debug event per base column.
pub struct LoggingObserver;

impl StationarityObserver for LoggingObserver {
    fn on_base_column(&self, variable: &str, differenced: &[f64], stationary: bool) {
        debug!(variable, n = differenced.len(), stationary, "base column stationarity");
    }
}

pub fn is_base_column(name: &str) -> bool {
    name.contains("Base")
}

/// Build the guide for every column of `table`.
pub fn build_guide(table: &FeatureTable, opts: &GuideOptions) -> Result<StationarityGuide> {
    build_guide_with_observer(table, opts, &LoggingObserver)
}

pub fn build_guide_with_observer(
    table: &FeatureTable,
    opts: &GuideOptions,
    observer: &dyn StationarityObserver,
) -> Result<StationarityGuide> {
    let mut entries = Vec::with_capacity(table.columns().len());
    for (idx, name) in table.columns().iter().enumerate() {
        let entry = guide_column(table, idx, name, opts, observer)?;
        debug!(
            variable = %entry.variable,
            loggable = entry.loggable,
            norm = entry.norm,
            ndiffs = entry.ndiffs,
            periods = entry.periods,
            "guide entry"
        );
        entries.push(entry);
    }
    Ok(StationarityGuide::from_entries(entries))
}

fn guide_column(
    table: &FeatureTable,
    idx: usize,
    name: &str,
    opts: &GuideOptions,
    observer: &dyn StationarityObserver,
) -> Result<GuideEntry> {
    let observed: Vec<(Quarter, f64)> = table
        .quarters()
        .zip(table.column_at(idx).iter().copied())
        .filter(|(_, v)| !v.is_nan())
        .collect();
    if observed.is_empty() {
        return Err(ForecastError::InsufficientData(format!(
            "column `{name}` has no observations"
        )));
    }

    let loggable = observed.iter().all(|(_, v)| *v > 0.0);
    let norm = if loggable {
        1.0
    } else {
        nearest_power_of_ten(observed.iter().map(|(_, v)| *v).sum::<f64>() / observed.len() as f64)
    };

    let mut feature: Vec<f64> = observed
        .iter()
        .filter(|(q, _)| opts.exclude_after.is_none_or(|max| *q <= max))
        .map(|(_, v)| if loggable { v.ln() } else { v / norm })
        .collect();

    let periods = if opts.yoy_columns.iter().any(|c| c == name) { 4 } else { 1 };
    let is_base = is_base_column(name);

    let mut ndiffs = 0;
    let stationary = loop {
        if ndiffs >= 1 {
            let stationary = test_stationary(name, &feature, opts.alpha)?;
            if stationary || is_base {
                break stationary;
            }
        }
        feature = feature
            .iter()
            .skip(periods)
            .zip(&feature)
            .map(|(cur, prev)| cur - prev)
            .collect();
        ndiffs += 1;
    };

    if is_base {
        observer.on_base_column(name, &feature, stationary);
    }

    Ok(GuideEntry {
        variable: name.to_string(),
        loggable,
        norm,
        ndiffs,
        periods,
    })
}

fn test_stationary(name: &str, feature: &[f64], alpha: f64) -> Result<bool> {
    if feature.len() < MIN_TEST_OBS {
        return Err(ForecastError::InsufficientData(format!(
            "column `{name}` has {} observations after differencing (need {MIN_TEST_OBS})",
            feature.len()
        )));
    }
    Ok(adf_test(feature)?.is_stationary(alpha))
}

/// `10^round(log10(|mean|))`, or 1 when the mean carries no scale.
fn nearest_power_of_ten(mean: f64) -> f64 {
    let m = mean.abs();
    if !(m.is_finite() && m > 0.0) {
        return 1.0;
    }
    10f64.powf(m.log10().round())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use rand::prelude::*;
    use rand::rngs::StdRng;
    use rand_distr::Normal;

    fn table(columns: Vec<(&str, Vec<f64>)>) -> FeatureTable {
        let names = columns.iter().map(|(n, _)| n.to_string()).collect();
        let values = columns.into_iter().map(|(_, v)| v).collect();
        FeatureTable::new(Quarter::new(1995, 1).unwrap(), names, values).unwrap()
    }

    fn random_walk(n: usize, seed: u64, start: f64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let mut level = start;
        (0..n)
            .map(|_| {
                level += normal.sample(&mut rng);
                level
            })
            .collect()
    }

    #[derive(Default)]
    struct Recorder(RefCell<Vec<(String, usize, bool)>>);

    impl StationarityObserver for Recorder {
        fn on_base_column(&self, variable: &str, differenced: &[f64], stationary: bool) {
            self.0.borrow_mut().push((variable.to_string(), differenced.len(), stationary));
        }
    }

    #[test]
    fn observer_sees_each_base_column_once() {
        let t = table(vec![
            ("WageBase", random_walk(80, 7, 1000.0)),
            ("GDP", random_walk(80, 8, 500.0)),
        ]);
        let recorder = Recorder::default();
        build_guide_with_observer(&t, &GuideOptions::default(), &recorder).unwrap();
        assert_eq!(*recorder.0.borrow(), vec![("WageBase".to_string(), 79, true)]);

        let yoy = GuideOptions {
            yoy_columns: vec!["WageBase".into()],
            ..GuideOptions::default()
        };
        let recorder = Recorder::default();
        build_guide_with_observer(&t, &yoy, &recorder).unwrap();
        let calls = recorder.0.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!((calls[0].0.as_str(), calls[0].1), ("WageBase", 76));
    }

    #[test]
    fn excluding_a_late_shock_changes_the_outcome() {
        // 80 quarters of random walk (1995Q1..2014Q4), then 40 quarters
        // whose growth itself trends upward.
        let mut series = random_walk(80, 9, -10.0);
        let mut level = *series.last().unwrap();
        for k in 1..=40 {
            level += 50.0 * k as f64;
            series.push(level);
        }
        let t = table(vec![("ShockBase", series.clone()), ("Shock", series)]);
        let cutoff = Quarter::new(2014, 4).unwrap();

        let full = Recorder::default();
        let all = build_guide_with_observer(&t, &GuideOptions::default(), &full).unwrap();
        let excluded = Recorder::default();
        let opts = GuideOptions {
            exclude_after: Some(cutoff),
            ..GuideOptions::default()
        };
        let cut = build_guide_with_observer(&t, &opts, &excluded).unwrap();

        assert_eq!(cut.get("Shock").unwrap().ndiffs, 1);
        assert!(all.get("Shock").unwrap().ndiffs >= 2);
        // Scaling still uses every observation.
        assert_eq!(cut.get("Shock").unwrap().norm, all.get("Shock").unwrap().norm);
        assert!(!cut.get("Shock").unwrap().loggable);

        assert_eq!(*full.0.borrow(), vec![("ShockBase".to_string(), 119, false)]);
        assert_eq!(*excluded.0.borrow(), vec![("ShockBase".to_string(), 79, true)]);
    }

    #[test]
    fn power_of_ten_norm() {
        assert_eq!(nearest_power_of_ten(345.0), 100.0);
        assert_eq!(nearest_power_of_ten(-0.04), 0.01);
        assert_eq!(nearest_power_of_ten(0.0), 1.0);
    }

    #[test]
    fn loggable_only_when_strictly_positive() {
        let positive = random_walk(80, 1, 500.0);
        let mut signed = random_walk(80, 2, 0.0);
        signed[3] = -1.0;
        let t = table(vec![("Pos", positive), ("Signed", signed)]);
        let guide = build_guide(&t, &GuideOptions::default()).unwrap();

        let pos = guide.get("Pos").unwrap();
        assert!(pos.loggable);
        assert_eq!(pos.norm, 1.0);

        let signed = guide.get("Signed").unwrap();
        assert!(!signed.loggable);
        assert!(signed.norm > 0.0);
    }

    #[test]
    fn always_differenced_and_bases_capped_at_one() {
        // An I(2) base would need two differences; the cap keeps it at one.
        let walk = random_walk(100, 3, 0.0);
        let mut level = 1000.0;
        let i2: Vec<f64> = walk
            .iter()
            .map(|v| {
                level += 50.0 + v;
                level
            })
            .collect();
        let noise = random_walk(100, 4, 0.0)
            .windows(2)
            .map(|w| w[1] - w[0] + 5.0)
            .chain(std::iter::once(5.0))
            .collect::<Vec<_>>();

        let t = table(vec![
            ("WageBase", i2.clone()),
            ("Indicator", i2),
            ("Noise", noise),
        ]);
        let guide = build_guide(&t, &GuideOptions::default()).unwrap();
        for entry in guide.entries() {
            assert!(entry.ndiffs >= 1, "{entry:?}");
            if entry.variable.contains("Base") {
                assert_eq!(entry.ndiffs, 1);
            }
        }
        assert_eq!(guide.get("WageBase").unwrap().periods, 1);
    }

    #[test]
    fn yoy_bases_use_period_four() {
        let walk = random_walk(60, 5, 800.0);
        let t = table(vec![("NPTBase", walk)]);
        let guide = build_guide(&t, &GuideOptions::default()).unwrap();
        assert_eq!(guide.get("NPTBase").unwrap().periods, 4);
    }

    #[test]
    fn short_columns_are_insufficient() {
        let t = table(vec![("Short", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])]);
        assert!(matches!(
            build_guide(&t, &GuideOptions::default()),
            Err(ForecastError::InsufficientData(_))
        ));
    }
}
