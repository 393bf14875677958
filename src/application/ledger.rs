use crate::domain::{
    LabelId, MonthlyRecord, NewMonthlyRecord, RecordKey, UserId, carried_range_from,
};
use crate::storage::{RecordStore, Repository, StoreError};

use super::{AppError, KeyedLocks};

/// Monthly range ledger: the primary interface for any client (CLI, API, etc.).
///
/// Every operation that touches a record runs under that record's key lock,
/// so read-modify-write sequences on one month never interleave within a process.
pub struct MonthlyLedger<S> {
    store: S,
    locks: KeyedLocks<RecordKey>,
}

impl MonthlyLedger<Repository> {
    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }
}

impl<S: RecordStore> MonthlyLedger<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the month's record, creating it from last month's leftover range if needed.
    pub async fn ensure_month(&self, key: &RecordKey) -> Result<MonthlyRecord, AppError> {
        let _guard = self.locks.acquire(key).await;
        self.resolve(key).await
    }

    /// Set the diesel average for the month. Refused once diesel has been added.
    pub async fn set_average(
        &self,
        key: &RecordKey,
        average: f64,
    ) -> Result<MonthlyRecord, AppError> {
        if !average.is_finite() {
            return Err(AppError::InvalidAmount(format!(
                "Average must be a finite number, got {}",
                average
            )));
        }

        let _guard = self.locks.acquire(key).await;
        let record = self.resolve(key).await?;
        let patch = record
            .average_patch(average)
            .map_err(|err| AppError::from_rule(err, key.period))?;

        Ok(self.store.update(record.id, &patch).await?)
    }

    /// Log diesel for the month and lock its average.
    pub async fn add_fuel(&self, key: &RecordKey, liters: f64) -> Result<MonthlyRecord, AppError> {
        validate_positive("Diesel liters", liters)?;

        let _guard = self.locks.acquire(key).await;
        let record = self.resolve(key).await?;
        let patch = record
            .fuel_patch(liters)
            .map_err(|err| AppError::from_rule(err, key.period))?;

        Ok(self.store.update(record.id, &patch).await?)
    }

    /// Log kilometers driven. The remaining range never drops below zero.
    pub async fn add_distance(
        &self,
        key: &RecordKey,
        kilometers: f64,
    ) -> Result<MonthlyRecord, AppError> {
        validate_positive("Kilometers", kilometers)?;

        let _guard = self.locks.acquire(key).await;
        let record = self.resolve(key).await?;
        let patch = record.distance_patch(kilometers);

        Ok(self.store.update(record.id, &patch).await?)
    }

    /// Look up a month without creating it.
    pub async fn get_month(&self, key: &RecordKey) -> Result<Option<MonthlyRecord>, AppError> {
        Ok(self.store.find_one(key).await?)
    }

    /// All recorded months for a label, oldest first.
    pub async fn history(
        &self,
        user_id: UserId,
        label_id: LabelId,
    ) -> Result<Vec<MonthlyRecord>, AppError> {
        Ok(self.store.list_for_label(user_id, label_id).await?)
    }

    // Callers must hold the key's lock.
    async fn resolve(&self, key: &RecordKey) -> Result<MonthlyRecord, AppError> {
        if let Some(existing) = self.store.find_one(key).await? {
            return Ok(existing);
        }

        let previous = self.store.find_one(&key.previous()).await?;
        let opening = NewMonthlyRecord::opening(key, carried_range_from(previous.as_ref()));

        match self.store.insert(opening).await {
            Ok(record) => Ok(record),
            // Another writer created the month first; theirs is the record
            Err(StoreError::Duplicate(existing)) => self
                .store
                .find_one(key)
                .await?
                .ok_or_else(|| StoreError::Duplicate(existing).into()),
            Err(err) => Err(err.into()),
        }
    }
}

fn validate_positive(what: &str, value: f64) -> Result<(), AppError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(AppError::InvalidAmount(format!(
            "{} must be positive, got {}",
            what, value
        )));
    }
    Ok(())
}
