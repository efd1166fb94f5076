//! Calendar quarters.
//!
//! All tables in this crate are indexed by quarter-start dates. Internally we
//! store a quarter as `(year, q)` so that offsets and fiscal-year mapping are
//! integer arithmetic rather than date arithmetic.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ForecastError, Result};

/// A calendar quarter (`q` in `1..=4`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quarter {
    year: i32,
    q: u8,
}

impl Quarter {
    pub fn new(year: i32, q: u8) -> Result<Self> {
        if !(1..=4).contains(&q) {
            return Err(ForecastError::InvalidInput(format!(
                "quarter must be in 1..=4 (got {q})"
            )));
        }
        Ok(Self { year, q })
    }

    /// The quarter containing `date` (any day of the quarter maps to its start).
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            q: ((date.month0() / 3) + 1) as u8,
        }
    }

    /// Parse `YYYY-MM-DD`, `YYYY-MM` or `YYYYQn`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some((y, q)) = s.split_once(['Q', 'q']) {
            let year = y
                .parse::<i32>()
                .map_err(|_| ForecastError::InvalidInput(format!("bad quarter `{s}`")))?;
            let q = q
                .parse::<u8>()
                .map_err(|_| ForecastError::InvalidInput(format!("bad quarter `{s}`")))?;
            return Quarter::new(year, q);
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Quarter::from_date(date));
        }
        NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
            .map(Quarter::from_date)
            .map_err(|_| ForecastError::InvalidInput(format!("bad date `{s}`")))
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn quarter(self) -> u8 {
        self.q
    }

    /// First day of the quarter.
    pub fn start_date(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, u32::from(self.q) * 3 - 2, 1)
            .unwrap_or(NaiveDate::MIN)
    }

    /// Quarters since year 0, used for offsets.
    fn ordinal(self) -> i64 {
        i64::from(self.year) * 4 + i64::from(self.q - 1)
    }

    fn from_ordinal(ord: i64) -> Self {
        Self {
            year: ord.div_euclid(4) as i32,
            q: (ord.rem_euclid(4) + 1) as u8,
        }
    }

    pub fn offset(self, n: i64) -> Self {
        Self::from_ordinal(self.ordinal() + n)
    }

    pub fn next(self) -> Self {
        self.offset(1)
    }

    /// Signed number of quarters from `self` to `other`.
    pub fn quarters_until(self, other: Quarter) -> i64 {
        other.ordinal() - self.ordinal()
    }

    /// Fiscal year label: Q3(Y-1)..Q2(Y) belong to fiscal year `Y`.
    pub fn fiscal_year(self) -> i32 {
        if self.q >= 3 { self.year + 1 } else { self.year }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start_date().format("%Y-%m-%d"))
    }
}

impl Serialize for Quarter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Quarter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Quarter::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_date_maps_to_quarter_start() {
        let q = Quarter::from_date(NaiveDate::from_ymd_opt(2021, 8, 17).unwrap());
        assert_eq!(q, Quarter::new(2021, 3).unwrap());
        assert_eq!(q.start_date(), NaiveDate::from_ymd_opt(2021, 7, 1).unwrap());
    }

    #[test]
    fn offsets_cross_year_boundaries() {
        let q = Quarter::new(2020, 4).unwrap();
        assert_eq!(q.next(), Quarter::new(2021, 1).unwrap());
        assert_eq!(q.offset(-4), Quarter::new(2019, 4).unwrap());
        assert_eq!(q.quarters_until(Quarter::new(2022, 2).unwrap()), 6);
    }

    #[test]
    fn fiscal_year_starts_in_third_quarter() {
        assert_eq!(Quarter::new(2020, 3).unwrap().fiscal_year(), 2021);
        assert_eq!(Quarter::new(2020, 4).unwrap().fiscal_year(), 2021);
        assert_eq!(Quarter::new(2021, 1).unwrap().fiscal_year(), 2021);
        assert_eq!(Quarter::new(2021, 2).unwrap().fiscal_year(), 2021);
        assert_eq!(Quarter::new(2021, 3).unwrap().fiscal_year(), 2022);
    }

    #[test]
    fn parse_accepts_common_formats() {
        let expected = Quarter::new(2019, 2).unwrap();
        assert_eq!(Quarter::parse("2019-04-01").unwrap(), expected);
        assert_eq!(Quarter::parse("2019-05").unwrap(), expected);
        assert_eq!(Quarter::parse("2019Q2").unwrap(), expected);
        assert!(Quarter::parse("2019Q5").is_err());
        assert!(Quarter::parse("nonsense").is_err());
    }
}
