// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use fuelbook::application::MonthlyLedger;
use fuelbook::domain::{Period, RecordKey};
use fuelbook::storage::Repository;
use tempfile::TempDir;
use uuid::Uuid;

/// Helper to create a test ledger with a temporary database
pub async fn test_ledger() -> Result<(MonthlyLedger<Repository>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let ledger = MonthlyLedger::init(db_path.to_str().unwrap()).await?;
    Ok((ledger, temp_dir))
}

/// Helper to parse a "YYYY-MM" string into a Period
pub fn period(s: &str) -> Period {
    s.parse().unwrap()
}

/// Test fixture: one user with one label
pub struct Truck {
    pub user_id: Uuid,
    pub label_id: Uuid,
}

impl Truck {
    pub fn new() -> Self {
        Self {
            user_id: Uuid::new_v4(),
            label_id: Uuid::new_v4(),
        }
    }

    pub fn at(&self, month: &str) -> RecordKey {
        RecordKey::new(self.user_id, self.label_id, period(month))
    }

    /// Set the average and log fuel for a month
    pub async fn fuel_up(
        &self,
        ledger: &MonthlyLedger<Repository>,
        month: &str,
        average: f64,
        liters: f64,
    ) -> Result<()> {
        let key = self.at(month);
        ledger.set_average(&key, average).await?;
        ledger.add_fuel(&key, liters).await?;
        Ok(())
    }
}
