mod memory;
mod repository;

use std::future::Future;

use thiserror::Error;

use crate::domain::{
    LabelId, MonthlyRecord, NewMonthlyRecord, RecordId, RecordKey, RecordPatch, UserId,
};

pub use memory::*;
pub use repository::*;

/// SQL migration for the monthly range table
pub const MIGRATION_001_MONTHLY_FUEL_DATA: &str =
    include_str!("migrations/001_monthly_fuel_data.sql");

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record already exists: {0}")]
    Duplicate(String),

    #[error("Record not found: {0}")]
    NotFound(RecordId),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent collection of monthly records, addressed by composite key or id.
pub trait RecordStore: Send + Sync {
    /// Exact match on user, label, month and year.
    fn find_one(
        &self,
        key: &RecordKey,
    ) -> impl Future<Output = StoreResult<Option<MonthlyRecord>>> + Send;

    /// Fails with [`StoreError::Duplicate`] if the composite key is taken.
    fn insert(
        &self,
        record: NewMonthlyRecord,
    ) -> impl Future<Output = StoreResult<MonthlyRecord>> + Send;

    /// Applies the patch, bumps `updated_at` and returns the stored row.
    fn update(
        &self,
        id: RecordId,
        patch: &RecordPatch,
    ) -> impl Future<Output = StoreResult<MonthlyRecord>> + Send;

    /// All months of one label, oldest first.
    fn list_for_label(
        &self,
        user_id: UserId,
        label_id: LabelId,
    ) -> impl Future<Output = StoreResult<Vec<MonthlyRecord>>> + Send;
}
