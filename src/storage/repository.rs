use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{
    LabelId, MonthlyRecord, NewMonthlyRecord, RecordId, RecordKey, RecordPatch, UserId,
};

use super::{MIGRATION_001_MONTHLY_FUEL_DATA, RecordStore, StoreError, StoreResult};

const RECORD_COLUMNS: &str = "id, user_id, label_id, month, year, diesel_average, carried_range, \
     total_diesel_added, total_km_driven, remaining_range, is_average_locked, created_at, updated_at";

/// SQLite-backed store for monthly records.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to run more than once.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_MONTHLY_FUEL_DATA)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        debug!("applied migration 001_monthly_fuel_data");
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Count all stored records.
    pub async fn count_records(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM monthly_fuel_data")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count monthly records")?;
        Ok(row.get("count"))
    }

    async fn fetch_by_key(&self, key: &RecordKey) -> Result<Option<MonthlyRecord>> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM monthly_fuel_data \
             WHERE user_id = ? AND label_id = ? AND month = ? AND year = ?"
        );
        let row = sqlx::query(&query)
            .bind(key.user_id.to_string())
            .bind(key.label_id.to_string())
            .bind(key.period.month())
            .bind(key.period.year())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch monthly record")?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<MonthlyRecord> {
        let id_str: String = row.get("id");
        let user_id_str: String = row.get("user_id");
        let label_id_str: String = row.get("label_id");
        let month: i64 = row.get("month");
        let year: i64 = row.get("year");
        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");

        Ok(MonthlyRecord {
            id: Uuid::parse_str(&id_str).context("Invalid record ID")?,
            user_id: Uuid::parse_str(&user_id_str).context("Invalid user ID")?,
            label_id: Uuid::parse_str(&label_id_str).context("Invalid label ID")?,
            month: u32::try_from(month).context("Invalid month")?,
            year: i32::try_from(year).context("Invalid year")?,
            diesel_average: row.get("diesel_average"),
            carried_range: row.get("carried_range"),
            total_diesel_added: row.get("total_diesel_added"),
            total_km_driven: row.get("total_km_driven"),
            remaining_range: row.get("remaining_range"),
            is_average_locked: row.get::<i32, _>("is_average_locked") != 0,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
                .context("Invalid updated_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

impl RecordStore for Repository {
    async fn find_one(&self, key: &RecordKey) -> StoreResult<Option<MonthlyRecord>> {
        Ok(self.fetch_by_key(key).await?)
    }

    async fn insert(&self, record: NewMonthlyRecord) -> StoreResult<MonthlyRecord> {
        let record = record.into_record(Uuid::new_v4(), Utc::now());

        let result = sqlx::query(
            r#"
            INSERT INTO monthly_fuel_data (id, user_id, label_id, month, year, diesel_average, carried_range, total_diesel_added, total_km_driven, remaining_range, is_average_locked, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.user_id.to_string())
        .bind(record.label_id.to_string())
        .bind(record.month)
        .bind(record.year)
        .bind(record.diesel_average)
        .bind(record.carried_range)
        .bind(record.total_diesel_added)
        .bind(record.total_km_driven)
        .bind(record.remaining_range)
        .bind(record.is_average_locked)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(
                    id = %record.id,
                    month = record.month,
                    year = record.year,
                    carried_range = record.carried_range,
                    "inserted monthly record"
                );
                Ok(record)
            }
            Err(err) if is_unique_violation(&err) => {
                let key = format!(
                    "{}/{}/{:04}-{:02}",
                    record.user_id, record.label_id, record.year, record.month
                );
                warn!(%key, "monthly record already exists");
                Err(StoreError::Duplicate(key))
            }
            Err(err) => Err(anyhow::Error::new(err)
                .context("Failed to insert monthly record")
                .into()),
        }
    }

    async fn update(&self, id: RecordId, patch: &RecordPatch) -> StoreResult<MonthlyRecord> {
        // Build the SET clause from the fields present in the patch
        let mut assignments = Vec::new();
        if patch.diesel_average.is_some() {
            assignments.push("diesel_average = ?");
        }
        if patch.total_diesel_added.is_some() {
            assignments.push("total_diesel_added = ?");
        }
        if patch.total_km_driven.is_some() {
            assignments.push("total_km_driven = ?");
        }
        if patch.remaining_range.is_some() {
            assignments.push("remaining_range = ?");
        }
        if patch.is_average_locked.is_some() {
            assignments.push("is_average_locked = ?");
        }
        assignments.push("updated_at = ?");

        let query = format!(
            "UPDATE monthly_fuel_data SET {} WHERE id = ? RETURNING {RECORD_COLUMNS}",
            assignments.join(", ")
        );

        let mut sql_query = sqlx::query(&query);
        if let Some(average) = patch.diesel_average {
            sql_query = sql_query.bind(average);
        }
        if let Some(total) = patch.total_diesel_added {
            sql_query = sql_query.bind(total);
        }
        if let Some(total) = patch.total_km_driven {
            sql_query = sql_query.bind(total);
        }
        if let Some(range) = patch.remaining_range {
            sql_query = sql_query.bind(range);
        }
        if let Some(locked) = patch.is_average_locked {
            sql_query = sql_query.bind(locked);
        }

        let row = sql_query
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update monthly record")?;

        let row = row.ok_or(StoreError::NotFound(id))?;
        let record = Self::row_to_record(&row)?;
        debug!(
            %id,
            remaining_range = record.remaining_range,
            is_average_locked = record.is_average_locked,
            "updated monthly record"
        );
        Ok(record)
    }

    async fn list_for_label(
        &self,
        user_id: UserId,
        label_id: LabelId,
    ) -> StoreResult<Vec<MonthlyRecord>> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM monthly_fuel_data \
             WHERE user_id = ? AND label_id = ? ORDER BY year, month"
        );
        let rows = sqlx::query(&query)
            .bind(user_id.to_string())
            .bind(label_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list monthly records")?;

        Ok(rows
            .iter()
            .map(Self::row_to_record)
            .collect::<Result<Vec<_>>>()?)
    }
}
