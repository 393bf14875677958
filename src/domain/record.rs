use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{LabelId, Period, PeriodError, RecordKey, UserId};

pub type RecordId = Uuid;

/// Range balance for one label in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRecord {
    pub id: RecordId,
    pub user_id: UserId,
    pub label_id: LabelId,
    pub month: u32,
    pub year: i32,
    /// Range units per liter. Zero means no average has been set.
    pub diesel_average: f64,
    /// Leftover range inherited from the previous month. Fixed at creation.
    pub carried_range: f64,
    pub total_diesel_added: f64,
    pub total_km_driven: f64,
    pub remaining_range: f64,
    pub is_average_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MonthlyRecord {
    pub fn period(&self) -> Result<Period, PeriodError> {
        Period::new(self.year, self.month)
    }

    pub fn key(&self) -> Result<RecordKey, PeriodError> {
        Ok(RecordKey::new(self.user_id, self.label_id, self.period()?))
    }

    pub fn has_average(&self) -> bool {
        self.diesel_average != 0.0
    }

    /// Range contributed by fuel logged this month.
    pub fn range_added(&self) -> f64 {
        self.total_diesel_added * self.diesel_average
    }

    pub fn average_patch(&self, average: f64) -> Result<RecordPatch, RangeRuleError> {
        if self.is_average_locked {
            return Err(RangeRuleError::AverageLocked);
        }
        Ok(RecordPatch {
            diesel_average: Some(average),
            ..RecordPatch::default()
        })
    }

    /// Adding fuel converts liters to range and freezes the average for the month.
    pub fn fuel_patch(&self, liters: f64) -> Result<RecordPatch, RangeRuleError> {
        if !self.has_average() {
            return Err(RangeRuleError::AverageNotSet);
        }
        let total_diesel_added = self.total_diesel_added + liters;
        let remaining_range = (self.remaining_range + liters * self.diesel_average).max(0.0);
        if !total_diesel_added.is_finite() || !remaining_range.is_finite() {
            return Err(RangeRuleError::RangeOverflow);
        }
        Ok(RecordPatch {
            total_diesel_added: Some(total_diesel_added),
            remaining_range: Some(remaining_range),
            is_average_locked: Some(true),
            ..RecordPatch::default()
        })
    }

    pub fn distance_patch(&self, kilometers: f64) -> RecordPatch {
        RecordPatch {
            total_km_driven: Some(self.total_km_driven + kilometers),
            remaining_range: Some((self.remaining_range - kilometers).max(0.0)),
            ..RecordPatch::default()
        }
    }
}

/// Insert payload for a month that has no record yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMonthlyRecord {
    pub user_id: UserId,
    pub label_id: LabelId,
    pub month: u32,
    pub year: i32,
    pub diesel_average: f64,
    pub carried_range: f64,
    pub total_diesel_added: f64,
    pub total_km_driven: f64,
    pub remaining_range: f64,
    pub is_average_locked: bool,
}

impl NewMonthlyRecord {
    /// Opening state of a month: the carried range is also the starting balance.
    pub fn opening(key: &RecordKey, carried_range: f64) -> Self {
        Self {
            user_id: key.user_id,
            label_id: key.label_id,
            month: key.period.month(),
            year: key.period.year(),
            diesel_average: 0.0,
            carried_range,
            total_diesel_added: 0.0,
            total_km_driven: 0.0,
            remaining_range: carried_range,
            is_average_locked: false,
        }
    }

    pub fn into_record(self, id: RecordId, now: DateTime<Utc>) -> MonthlyRecord {
        MonthlyRecord {
            id,
            user_id: self.user_id,
            label_id: self.label_id,
            month: self.month,
            year: self.year,
            diesel_average: self.diesel_average,
            carried_range: self.carried_range,
            total_diesel_added: self.total_diesel_added,
            total_km_driven: self.total_km_driven,
            remaining_range: self.remaining_range,
            is_average_locked: self.is_average_locked,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Leftover range a new month inherits from its predecessor.
pub fn carried_range_from(previous: Option<&MonthlyRecord>) -> f64 {
    previous
        .map(|record| record.remaining_range)
        .filter(|range| range.is_finite() && *range > 0.0)
        .unwrap_or(0.0)
}

/// Partial update of the mutable fields of a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub diesel_average: Option<f64>,
    pub total_diesel_added: Option<f64>,
    pub total_km_driven: Option<f64>,
    pub remaining_range: Option<f64>,
    pub is_average_locked: Option<bool>,
}

impl RecordPatch {
    pub fn apply(&self, record: &mut MonthlyRecord) {
        if let Some(average) = self.diesel_average {
            record.diesel_average = average;
        }
        if let Some(total) = self.total_diesel_added {
            record.total_diesel_added = total;
        }
        if let Some(total) = self.total_km_driven {
            record.total_km_driven = total;
        }
        if let Some(range) = self.remaining_range {
            record.remaining_range = range;
        }
        if let Some(locked) = self.is_average_locked {
            record.is_average_locked = locked;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRuleError {
    AverageLocked,
    AverageNotSet,
    RangeOverflow,
}

impl std::fmt::Display for RangeRuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeRuleError::AverageLocked => {
                write!(f, "average is locked after diesel has been added this month")
            }
            RangeRuleError::AverageNotSet => {
                write!(f, "an average must be set before adding diesel")
            }
            RangeRuleError::RangeOverflow => {
                write!(f, "resulting range does not fit in a finite number")
            }
        }
    }
}

impl std::error::Error for RangeRuleError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn opening(carried: f64) -> MonthlyRecord {
        let key = RecordKey::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Period::new(2024, 3).unwrap(),
        );
        NewMonthlyRecord::opening(&key, carried).into_record(Uuid::new_v4(), Utc::now())
    }

    fn applied(mut record: MonthlyRecord, patch: RecordPatch) -> MonthlyRecord {
        patch.apply(&mut record);
        record
    }

    #[test]
    fn test_opening_record_starts_from_carried_range() {
        let record = opening(120.0);
        assert_eq!(record.carried_range, 120.0);
        assert_eq!(record.remaining_range, 120.0);
        assert_eq!(record.diesel_average, 0.0);
        assert_eq!(record.total_diesel_added, 0.0);
        assert_eq!(record.total_km_driven, 0.0);
        assert!(!record.is_average_locked);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_average_patch_only_touches_average() {
        let record = opening(0.0);
        let patch = record.average_patch(10.0).unwrap();
        assert_eq!(patch.diesel_average, Some(10.0));
        assert_eq!(patch.remaining_range, None);
        assert_eq!(patch.is_average_locked, None);
    }

    #[test]
    fn test_average_patch_rejected_when_locked() {
        let mut record = opening(0.0);
        record.is_average_locked = true;
        assert_eq!(
            record.average_patch(8.0),
            Err(RangeRuleError::AverageLocked)
        );
    }

    #[test]
    fn test_fuel_requires_average() {
        let record = opening(40.0);
        assert_eq!(record.fuel_patch(5.0), Err(RangeRuleError::AverageNotSet));
    }

    #[test]
    fn test_fuel_adds_range_and_locks() {
        let mut record = opening(40.0);
        record.diesel_average = 10.0;
        let record = applied(record.clone(), record.fuel_patch(5.0).unwrap());

        assert_eq!(record.total_diesel_added, 5.0);
        assert_eq!(record.remaining_range, 90.0);
        assert!(record.is_average_locked);
        assert_eq!(record.diesel_average, 10.0);
        assert_eq!(record.range_added(), 50.0);
    }

    #[test]
    fn test_distance_floors_at_zero() {
        let record = opening(20.0);
        let record = applied(record.clone(), record.distance_patch(30.0));
        assert_eq!(record.remaining_range, 0.0);
        assert_eq!(record.total_km_driven, 30.0);

        let record = applied(record.clone(), record.distance_patch(10.0));
        assert_eq!(record.remaining_range, 0.0);
        assert_eq!(record.total_km_driven, 40.0);
    }

    #[test]
    fn test_distance_does_not_touch_lock() {
        let mut record = opening(100.0);
        record.is_average_locked = true;
        let patch = record.distance_patch(10.0);
        assert_eq!(patch.is_average_locked, None);
        assert_eq!(patch.remaining_range, Some(90.0));
    }

    #[test]
    fn test_carried_range_from_previous() {
        let mut previous = opening(0.0);
        assert_eq!(carried_range_from(None), 0.0);
        assert_eq!(carried_range_from(Some(&previous)), 0.0);

        previous.remaining_range = 75.5;
        assert_eq!(carried_range_from(Some(&previous)), 75.5);

        previous.remaining_range = f64::NAN;
        assert_eq!(carried_range_from(Some(&previous)), 0.0);
    }

    #[test]
    fn test_fuel_rejects_overflowing_range() {
        let mut record = opening(0.0);
        record.diesel_average = f64::MAX;
        assert_eq!(record.fuel_patch(2.0), Err(RangeRuleError::RangeOverflow));

        record.diesel_average = 10.0;
        record.total_diesel_added = f64::MAX;
        assert_eq!(
            record.fuel_patch(f64::MAX),
            Err(RangeRuleError::RangeOverflow)
        );
    }

    #[test]
    fn test_negative_average_floors_fuel_range() {
        let mut record = opening(30.0);
        record.diesel_average = -5.0;
        let record = applied(record.clone(), record.fuel_patch(10.0).unwrap());
        assert_eq!(record.remaining_range, 0.0);
        assert_eq!(record.total_diesel_added, 10.0);
        assert!(record.is_average_locked);
    }

    #[test]
    fn test_record_key_comes_from_fields() {
        let record = opening(0.0);
        let key = record.key().unwrap();
        assert_eq!(key.user_id, record.user_id);
        assert_eq!(key.period, Period::new(2024, 3).unwrap());

        let mut broken = record;
        broken.month = 13;
        assert_eq!(broken.period(), Err(PeriodError::InvalidMonth(13)));
    }
}
