//! Quarterly feature tables.
//!
//! A `FeatureTable` is a contiguous quarterly index plus named numeric
//! columns. Gaps are represented as `NaN`, never as missing rows: every row
//! `i` corresponds to quarter `start + i`. This lets the transform and VAR
//! code work on plain slices with index arithmetic instead of date lookups.

use std::collections::HashSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::domain::Quarter;
use crate::error::{ForecastError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    start: Quarter,
    len: usize,
    columns: Vec<String>,
    /// Column-major storage: `values[col][row]`.
    values: Vec<Vec<f64>>,
}

impl FeatureTable {
    pub fn new(start: Quarter, columns: Vec<String>, values: Vec<Vec<f64>>) -> Result<Self> {
        if columns.len() != values.len() {
            return Err(ForecastError::InvalidInput(format!(
                "{} column names for {} columns",
                columns.len(),
                values.len()
            )));
        }
        let mut seen = HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(ForecastError::InvalidInput(format!("duplicate column `{name}`")));
            }
        }
        let len = values.first().map_or(0, Vec::len);
        if values.iter().any(|v| v.len() != len) {
            return Err(ForecastError::InvalidInput("ragged column lengths".to_string()));
        }
        Ok(Self {
            start,
            len,
            columns,
            values,
        })
    }

    /// A table with columns but no rows.
    pub fn empty(start: Quarter, columns: Vec<String>) -> Self {
        let values = vec![Vec::new(); columns.len()];
        Self {
            start,
            len: 0,
            columns,
            values,
        }
    }

    /// Build from dated rows, resampling onto a contiguous quarterly index.
    ///
    /// Rows must be strictly increasing by quarter; missing quarters become
    /// `NaN` rows.
    pub fn from_rows(columns: Vec<String>, rows: &[(Quarter, Vec<f64>)]) -> Result<Self> {
        let Some(&(start, _)) = rows.first() else {
            return Ok(Self::empty(Quarter::new(1970, 1)?, columns));
        };
        let end = rows[rows.len() - 1].0;
        let len = start.quarters_until(end) + 1;
        if len <= 0 {
            return Err(ForecastError::InvalidInput("rows are not increasing".to_string()));
        }
        let len = len as usize;

        let mut values = vec![vec![f64::NAN; len]; columns.len()];
        let mut prev: Option<Quarter> = None;
        for (q, row) in rows {
            if prev.is_some_and(|p| *q <= p) {
                return Err(ForecastError::InvalidInput(format!(
                    "duplicate or out-of-order date {q}"
                )));
            }
            if row.len() != columns.len() {
                return Err(ForecastError::InvalidInput(format!(
                    "row {q} has {} values, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
            let i = start.quarters_until(*q) as usize;
            for (c, v) in row.iter().enumerate() {
                values[c][i] = *v;
            }
            prev = Some(*q);
        }
        Self::new(start, columns, values)
    }

    pub fn start(&self) -> Quarter {
        self.start
    }

    /// Last quarter (or `None` for an empty table).
    pub fn end(&self) -> Option<Quarter> {
        (self.len > 0).then(|| self.start.offset(self.len as i64 - 1))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn quarter_at(&self, row: usize) -> Quarter {
        self.start.offset(row as i64)
    }

    pub fn quarters(&self) -> impl Iterator<Item = Quarter> + '_ {
        (0..self.len).map(|i| self.quarter_at(i))
    }

    /// Row index of `q`, if it lies inside the table.
    pub fn position(&self, q: Quarter) -> Option<usize> {
        let i = self.start.quarters_until(q);
        (i >= 0 && (i as usize) < self.len).then_some(i as usize)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.column_index(name).map(|i| self.values[i].as_slice())
    }

    pub fn require_column(&self, name: &str) -> Result<&[f64]> {
        self.column(name)
            .ok_or_else(|| ForecastError::UnknownColumn(name.to_string()))
    }

    pub fn column_at(&self, idx: usize) -> &[f64] {
        &self.values[idx]
    }

    pub fn get(&self, name: &str, q: Quarter) -> Option<f64> {
        let row = self.position(q)?;
        self.column(name).map(|c| c[row])
    }

    pub fn row(&self, i: usize) -> Vec<f64> {
        self.values.iter().map(|c| c[i]).collect()
    }

    /// Subset of columns, in the requested order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut columns = Vec::with_capacity(names.len());
        let mut values = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            columns.push(name.to_string());
            values.push(self.require_column(name)?.to_vec());
        }
        Self::new(self.start, columns, values)
    }

    pub fn slice_rows(&self, range: Range<usize>) -> Self {
        let range = range.start.min(self.len)..range.end.min(self.len);
        Self {
            start: self.start.offset(range.start as i64),
            len: range.len(),
            columns: self.columns.clone(),
            values: self.values.iter().map(|c| c[range.clone()].to_vec()).collect(),
        }
    }

    /// Rows up to and including `max` (pandas `loc[:max]`).
    pub fn truncate_after(&self, max: Quarter) -> Self {
        let n = self.start.quarters_until(max) + 1;
        self.slice_rows(0..n.clamp(0, self.len as i64) as usize)
    }

    /// Rows from `min` onward.
    pub fn truncate_before(&self, min: Quarter) -> Self {
        let skip = self.start.quarters_until(min).clamp(0, self.len as i64) as usize;
        self.slice_rows(skip..self.len)
    }

    /// Re-index onto `[start, start + len)`, filling new rows with `NaN`.
    pub fn reindex(&self, start: Quarter, len: usize) -> Self {
        let values = self
            .values
            .iter()
            .map(|col| {
                (0..len)
                    .map(|i| {
                        self.position(start.offset(i as i64))
                            .map_or(f64::NAN, |row| col[row])
                    })
                    .collect()
            })
            .collect();
        Self {
            start,
            len,
            columns: self.columns.clone(),
            values,
        }
    }

    /// Drop leading and trailing rows where `pred(row)` holds.
    fn trim_rows_where(&self, pred: impl Fn(&Self, usize) -> bool) -> Self {
        let first = (0..self.len).find(|&i| !pred(self, i));
        let Some(first) = first else {
            return Self::empty(self.start, self.columns.clone());
        };
        let last = (0..self.len).rev().find(|&i| !pred(self, i)).unwrap_or(first);
        self.slice_rows(first..last + 1)
    }

    /// Trim leading/trailing rows in which every column is `NaN`.
    pub fn trim_all_nan(&self) -> Self {
        self.trim_rows_where(|t, i| t.values.iter().all(|c| c[i].is_nan()))
    }

    /// Trim leading/trailing rows in which any column is `NaN`.
    pub fn trim_incomplete(&self) -> Self {
        self.trim_rows_where(|t, i| t.values.iter().any(|c| c[i].is_nan()))
    }

    pub fn has_missing(&self) -> bool {
        self.values.iter().any(|c| c.iter().any(|v| v.is_nan()))
    }

    /// Append a column (replacing an existing one of the same name).
    pub fn set_column(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.len {
            return Err(ForecastError::InvalidInput(format!(
                "column `{name}` has {} rows, table has {}",
                values.len(),
                self.len
            )));
        }
        match self.column_index(name) {
            Some(i) => self.values[i] = values,
            None => {
                self.columns.push(name.to_string());
                self.values.push(values);
            }
        }
        Ok(())
    }

    /// Stack `other` directly after `self` (same columns, contiguous quarters).
    pub fn append(&self, other: &Self) -> Result<Self> {
        if self.is_empty() {
            return Ok(other.clone());
        }
        if other.is_empty() {
            return Ok(self.clone());
        }
        if self.columns != other.columns {
            return Err(ForecastError::InvalidInput(
                "cannot append tables with different columns".to_string(),
            ));
        }
        let expected = self.start.offset(self.len as i64);
        if other.start != expected {
            return Err(ForecastError::InvalidInput(format!(
                "appended rows start at {} but {} was expected",
                other.start, expected
            )));
        }
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a.iter().chain(b).copied().collect())
            .collect();
        Self::new(self.start, self.columns.clone(), values)
    }

    /// Column-wise join on the quarter index (union of both ranges).
    pub fn join(&self, other: &Self) -> Result<Self> {
        if other.columns.is_empty() {
            return Ok(self.clone());
        }
        let (start, len) = union_range(self, other);
        let mut out = self.reindex(start, len);
        let other = other.reindex(start, len);
        for (name, values) in other.columns.iter().zip(other.values) {
            if out.column_index(name).is_some() {
                return Err(ForecastError::InvalidInput(format!("duplicate column `{name}`")));
            }
            out.columns.push(name.clone());
            out.values.push(values);
        }
        Ok(out)
    }
}

/// Smallest contiguous range covering both tables.
pub fn union_range(a: &FeatureTable, b: &FeatureTable) -> (Quarter, usize) {
    match (a.end(), b.end()) {
        (None, None) => (a.start, 0),
        (Some(_), None) => (a.start, a.len),
        (None, Some(_)) => (b.start, b.len),
        (Some(ae), Some(be)) => {
            let start = a.start.min(b.start);
            let end = ae.max(be);
            (start, start.quarters_until(end) as usize + 1)
        }
    }
}
