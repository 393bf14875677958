use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::MonthlyLedger;
use crate::domain::{LabelId, MonthlyRecord, UserId};
use crate::storage::RecordStore;

/// Month-by-month snapshot of one label, for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelHistory {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub user_id: UserId,
    pub label_id: LabelId,
    pub months: Vec<MonthlyRecord>,
}

/// Exporter for writing a label's monthly records to various formats
pub struct Exporter<'a, S> {
    ledger: &'a MonthlyLedger<S>,
}

impl<'a, S: RecordStore> Exporter<'a, S> {
    pub fn new(ledger: &'a MonthlyLedger<S>) -> Self {
        Self { ledger }
    }

    /// Export a label's history to CSV format
    pub async fn export_history_csv<W: Write>(
        &self,
        user_id: UserId,
        label_id: LabelId,
        writer: W,
    ) -> Result<usize> {
        let months = self.ledger.history(user_id, label_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        // Write header
        csv_writer.write_record([
            "period",
            "month",
            "year",
            "diesel_average",
            "carried_range",
            "total_diesel_added",
            "total_km_driven",
            "remaining_range",
            "is_average_locked",
            "updated_at",
        ])?;

        let mut count = 0;
        for record in &months {
            csv_writer.write_record(&[
                record.period()?.to_string(),
                record.month.to_string(),
                record.year.to_string(),
                record.diesel_average.to_string(),
                record.carried_range.to_string(),
                record.total_diesel_added.to_string(),
                record.total_km_driven.to_string(),
                record.remaining_range.to_string(),
                record.is_average_locked.to_string(),
                record.updated_at.to_rfc3339(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export a label's history as a JSON snapshot
    pub async fn export_history_json<W: Write>(
        &self,
        user_id: UserId,
        label_id: LabelId,
        mut writer: W,
    ) -> Result<LabelHistory> {
        let months = self.ledger.history(user_id, label_id).await?;

        let history = LabelHistory {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            user_id,
            label_id,
            months,
        };

        let json = serde_json::to_string_pretty(&history)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(history)
    }
}
