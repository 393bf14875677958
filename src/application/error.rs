use thiserror::Error;

use crate::domain::{Period, PeriodError, RangeRuleError};
use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Average is locked for {period}: diesel has already been added this month")]
    LockedAverage { period: Period },

    #[error("No diesel average set for {period}: set an average before adding diesel")]
    AverageNotSet { period: Period },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid period: {0}")]
    InvalidPeriod(#[from] PeriodError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl AppError {
    pub(crate) fn from_rule(err: RangeRuleError, period: Period) -> Self {
        match err {
            RangeRuleError::AverageLocked => AppError::LockedAverage { period },
            RangeRuleError::AverageNotSet => AppError::AverageNotSet { period },
            RangeRuleError::RangeOverflow => {
                AppError::InvalidAmount(format!("{err} for {period}"))
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Persistence(StoreError::Database(err))
    }
}
