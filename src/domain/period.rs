use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub type UserId = Uuid;
pub type LabelId = Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),

    #[error("expected YYYY-MM, got '{0}'")]
    InvalidFormat(String),
}

/// A calendar month. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(month));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The month containing today's date (UTC).
    pub fn current() -> Self {
        Self::from_date(Utc::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// January rolls back into December of the previous year.
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PeriodError::InvalidFormat(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

/// Composite identity of a monthly record: one per user, label and month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub user_id: UserId,
    pub label_id: LabelId,
    pub period: Period,
}

impl RecordKey {
    pub fn new(user_id: UserId, label_id: LabelId, period: Period) -> Self {
        Self {
            user_id,
            label_id,
            period,
        }
    }

    /// Same user and label, one month earlier.
    pub fn previous(&self) -> Self {
        Self {
            period: self.period.previous(),
            ..*self
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.user_id, self.label_id, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(year: i32, month: u32) -> Period {
        Period::new(year, month).unwrap()
    }

    #[test]
    fn test_previous_within_year() {
        assert_eq!(period(2024, 3).previous(), period(2024, 2));
        assert_eq!(period(2024, 12).previous(), period(2024, 11));
    }

    #[test]
    fn test_previous_wraps_january_to_december() {
        assert_eq!(period(2024, 1).previous(), period(2023, 12));
    }

    #[test]
    fn test_every_month_has_a_predecessor_in_range() {
        for month in 1..=12 {
            let prev = period(2024, month).previous();
            assert!((1..=12).contains(&prev.month()));
            assert!(prev < period(2024, month));
        }
    }

    #[test]
    fn test_rejects_invalid_month() {
        assert_eq!(Period::new(2024, 0), Err(PeriodError::InvalidMonth(0)));
        assert_eq!(Period::new(2024, 13), Err(PeriodError::InvalidMonth(13)));
    }

    #[test]
    fn test_parse_and_display() {
        let p: Period = "2024-03".parse().unwrap();
        assert_eq!(p, period(2024, 3));
        assert_eq!(p.to_string(), "2024-03");
        assert_eq!("2024-3".parse::<Period>(), Ok(period(2024, 3)));
    }

    #[test]
    fn test_parse_invalid() {
        assert!("2024".parse::<Period>().is_err());
        assert!("2024-xx".parse::<Period>().is_err());
        assert_eq!(
            "2024-13".parse::<Period>(),
            Err(PeriodError::InvalidMonth(13))
        );
    }

    #[test]
    fn test_ordering_is_chronological() {
        assert!(period(2023, 12) < period(2024, 1));
        assert!(period(2024, 2) < period(2024, 10));
    }

    #[test]
    fn test_key_previous_keeps_identity() {
        let key = RecordKey::new(Uuid::new_v4(), Uuid::new_v4(), period(2024, 1));
        let prev = key.previous();
        assert_eq!(prev.user_id, key.user_id);
        assert_eq!(prev.label_id, key.label_id);
        assert_eq!(prev.period, period(2023, 12));
    }
}
