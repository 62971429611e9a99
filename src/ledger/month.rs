use std::{fmt, str::FromStr};

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::FinanceError;

const MAX_YEAR: i32 = 9999;

/// Calendar month in `YYYY-MM` form.
///
/// The only way to obtain a `MonthKey` is through validation, so every key that
/// reaches the store is well formed. Ordering is chronological, which matches the
/// lexicographic order of the zero-padded string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self, FinanceError> {
        if !(0..=MAX_YEAR).contains(&year) || !(1..=12).contains(&month) {
            return Err(FinanceError::MalformedMonthKey(format!(
                "{:04}-{:02}",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    /// Parses a strict `YYYY-MM` string.
    pub fn parse(raw: &str) -> Result<Self, FinanceError> {
        let malformed = || FinanceError::MalformedMonthKey(raw.to_string());
        let trimmed = raw.trim();
        let bytes = trimmed.as_bytes();
        if bytes.len() != 7 || bytes[4] != b'-' {
            return Err(malformed());
        }
        let digits_ok = bytes[..4]
            .iter()
            .chain(bytes[5..].iter())
            .all(u8::is_ascii_digit);
        if !digits_ok {
            return Err(malformed());
        }
        let year: i32 = trimmed[..4].parse().map_err(|_| malformed())?;
        let month: u32 = trimmed[5..].parse().map_err(|_| malformed())?;
        Self::new(year, month).map_err(|_| malformed())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The month before the current local date, the usual month to enter totals for.
    pub fn previous_to_today() -> Self {
        Self::from_date(Local::now().date_naive()).offset(-1)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn next(&self) -> Self {
        self.offset(1)
    }

    /// Shifts the key by `months`, rolling over year boundaries in both directions.
    /// Returns `None` when the result falls outside `0000-01..=9999-12`.
    pub fn checked_offset(&self, months: i32) -> Option<Self> {
        let index = i64::from(self.year) * 12 + i64::from(self.month) - 1 + i64::from(months);
        let year = i32::try_from(index.div_euclid(12)).ok()?;
        let month = (index.rem_euclid(12) + 1) as u32;
        Self::new(year, month).ok()
    }

    /// Like [`checked_offset`](Self::checked_offset), clamped to the first or last
    /// representable month.
    pub fn offset(&self, months: i32) -> Self {
        self.checked_offset(months).unwrap_or(if months < 0 {
            Self { year: 0, month: 1 }
        } else {
            Self {
                year: MAX_YEAR,
                month: 12,
            }
        })
    }

    /// Consecutive keys following `self`, starting with the next month.
    pub fn following(&self, count: usize) -> Result<Vec<MonthKey>, FinanceError> {
        let out_of_range = || {
            FinanceError::InvalidInput(format!(
                "{} months after {} runs past {}-12",
                count, self, MAX_YEAR
            ))
        };
        let steps = i32::try_from(count).map_err(|_| out_of_range())?;
        (1..=steps)
            .map(|step| self.checked_offset(step).ok_or_else(out_of_range))
            .collect()
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = FinanceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MonthKey> for String {
    fn from(value: MonthKey) -> Self {
        value.to_string()
    }
}
