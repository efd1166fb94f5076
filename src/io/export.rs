//! Result exports.
//!
//! - fiscal-year forecast CSV: one row per fiscal year, the average followed
//!   by each candidate's totals
//! - ranked fits JSON: the scored candidates as serialized `FitResult`s

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::FitResult;
use crate::error::AppError;
use crate::fit::AggregateForecast;

pub fn write_forecast_csv(path: &Path, forecast: &AggregateForecast) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_forecast(file, forecast)
}

pub fn write_forecast<W: Write>(writer: W, forecast: &AggregateForecast) -> Result<(), AppError> {
    let mut w = csv::Writer::from_writer(writer);
    let csv_err = |e: csv::Error| AppError::new(2, format!("Failed to write export CSV: {e}"));

    let mut header = vec!["fiscal_year".to_string(), forecast.variable.clone()];
    header.extend((1..=forecast.per_candidate.len()).map(|i| format!("candidate_{i}")));
    w.write_record(&header).map_err(csv_err)?;

    for (fy, avg) in &forecast.average {
        let mut row = vec![fy.to_string(), format!("{avg:.4}")];
        row.extend(
            forecast
                .per_candidate
                .iter()
                .map(|s| s.get(fy).map(|v| format!("{v:.4}")).unwrap_or_default()),
        );
        w.write_record(&row).map_err(csv_err)?;
    }
    w.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))
}

pub fn write_fits_json(path: &Path, fits: &[FitResult]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create fits JSON '{}': {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, fits)
        .map_err(|e| AppError::new(2, format!("Failed to write fits JSON: {e}")))?;
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush fits JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitCandidate, Quarter};

    #[test]
    fn forecast_csv_layout() {
        let candidate = FitCandidate {
            endog_cols: vec!["WageBase".into()],
            exog_cols: Default::default(),
            order: 1,
            max_fit_date: Quarter::new(2019, 4).unwrap(),
            model_quarters: false,
        };
        let agg = AggregateForecast {
            variable: "WageBase".into(),
            average: [(2025, 15.0), (2026, 20.0)].into(),
            per_candidate: vec![[(2025, 10.0), (2026, 20.0)].into(), [(2025, 20.0)].into()],
            candidates: vec![candidate.clone(), candidate],
            quarterly: Vec::new(),
        };
        let mut buf = Vec::new();
        write_forecast(&mut buf, &agg).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "fiscal_year,WageBase,candidate_1,candidate_2");
        assert_eq!(lines[1], "2025,15.0000,10.0000,20.0000");
        assert_eq!(lines[2], "2026,20.0000,20.0000,");
    }
}
