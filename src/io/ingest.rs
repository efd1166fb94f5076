//! CSV ingest for quarterly feature tables.
//!
//! Expected layout: the first column is a date (`YYYY-MM-DD`, `YYYY-MM` or
//! `YYYYQn`), every other column is numeric. Blank cells and `NA`/`NaN` are
//! gaps. Dates must be strictly increasing; missing quarters become `NaN`
//! rows.
//!
//! Schema problems are caller errors (exit code 2) and name the offending
//! line.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::domain::{FeatureTable, Quarter};
use crate::error::AppError;

/// Load a feature table from a CSV file.
pub fn load_feature_table(path: &Path) -> Result<FeatureTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_feature_table(file)
        .map_err(|e| AppError::new(e.exit_code(), format!("{} ({})", e, path.display())))
}

pub fn read_feature_table<R: Read>(reader: R) -> Result<FeatureTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    if headers.len() < 2 {
        return Err(AppError::new(2, "CSV needs a date column and at least one value column."));
    }
    let columns: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        // Header is line 1.
        let line = i + 2;
        let record = record.map_err(|e| AppError::new(2, format!("CSV line {line}: {e}")))?;
        let date = record.get(0).unwrap_or_default();
        let quarter = Quarter::parse(date).map_err(|e| AppError::new(2, format!("CSV line {line}: {e}")))?;
        let values = record
            .iter()
            .skip(1)
            .zip(&columns)
            .map(|(cell, column)| {
                parse_cell(cell).ok_or_else(|| {
                    AppError::new(2, format!("CSV line {line}: `{cell}` is not a number ({column})"))
                })
            })
            .collect::<Result<Vec<f64>, AppError>>()?;
        rows.push((quarter, values));
    }

    Ok(FeatureTable::from_rows(columns, &rows)?)
}

fn parse_cell(cell: &str) -> Option<f64> {
    match cell {
        "" | "NA" | "NaN" | "nan" | "null" => Some(f64::NAN),
        _ => cell.parse::<f64>().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_quarterly_csv_with_gaps() {
        let csv = "date,WageBase,GDP\n\
                   2020-01-01,100,5\n\
                   2020-04-01,,5.5\n\
                   2020-10-01,103,NA\n";
        let t = read_feature_table(csv.as_bytes()).unwrap();
        assert_eq!(t.columns(), &["WageBase".to_string(), "GDP".to_string()]);
        assert_eq!(t.len(), 4);
        let q = |y, n| Quarter::new(y, n).unwrap();
        assert!(t.get("WageBase", q(2020, 2)).unwrap().is_nan());
        assert!(t.get("WageBase", q(2020, 3)).unwrap().is_nan());
        assert_eq!(t.get("WageBase", q(2020, 4)), Some(103.0));
    }

    #[test]
    fn bad_cells_name_the_line() {
        let csv = "date,A\n2020Q1,1\n2020Q2,abc\n";
        let err = read_feature_table(csv.as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("line 3"), "{err}");
    }

    #[test]
    fn duplicate_dates_are_rejected() {
        let csv = "date,A\n2020-01-01,1\n2020-02-01,2\n";
        assert!(read_feature_table(csv.as_bytes()).is_err());
    }
}
