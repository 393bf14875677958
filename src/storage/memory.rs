use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::domain::{LabelId, MonthlyRecord, NewMonthlyRecord, RecordId, RecordKey, RecordPatch, UserId};

use super::{RecordStore, StoreError, StoreResult};

/// In-process record store. Each call yields to the runtime first so that
/// concurrent callers interleave the way they would against a remote store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: DashMap<RecordKey, MonthlyRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record as-is, replacing any record with the same key.
    pub fn seed(&self, record: MonthlyRecord) -> StoreResult<()> {
        let key = record_key(&record)?;
        self.records.insert(key, record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn record_key(record: &MonthlyRecord) -> StoreResult<RecordKey> {
    record
        .key()
        .map_err(|err| StoreError::Database(anyhow::Error::new(err)))
}

impl RecordStore for InMemoryStore {
    async fn find_one(&self, key: &RecordKey) -> StoreResult<Option<MonthlyRecord>> {
        tokio::task::yield_now().await;
        Ok(self.records.get(key).map(|record| record.value().clone()))
    }

    async fn insert(&self, record: NewMonthlyRecord) -> StoreResult<MonthlyRecord> {
        tokio::task::yield_now().await;
        let record = record.into_record(Uuid::new_v4(), Utc::now());
        let key = record_key(&record)?;

        match self.records.entry(key) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn update(&self, id: RecordId, patch: &RecordPatch) -> StoreResult<MonthlyRecord> {
        tokio::task::yield_now().await;
        let mut record = self
            .records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(StoreError::NotFound(id))?;
        patch.apply(record.value_mut());
        record.updated_at = Utc::now();
        Ok(record.value().clone())
    }

    async fn list_for_label(
        &self,
        user_id: UserId,
        label_id: LabelId,
    ) -> StoreResult<Vec<MonthlyRecord>> {
        tokio::task::yield_now().await;
        let mut months: Vec<MonthlyRecord> = self
            .records
            .iter()
            .filter(|record| record.user_id == user_id && record.label_id == label_id)
            .map(|record| record.value().clone())
            .collect();
        months.sort_by_key(|record| (record.year, record.month));
        Ok(months)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Period;

    fn key(period: Period) -> RecordKey {
        RecordKey::new(Uuid::new_v4(), Uuid::new_v4(), period)
    }

    #[tokio::test]
    async fn test_insert_then_find() {
        let store = InMemoryStore::new();
        let key = key(Period::new(2024, 3).unwrap());

        let inserted = store
            .insert(NewMonthlyRecord::opening(&key, 12.0))
            .await
            .unwrap();
        let found = store.find_one(&key).await.unwrap();

        assert_eq!(found, Some(inserted));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let store = InMemoryStore::new();
        let key = key(Period::new(2024, 3).unwrap());

        store
            .insert(NewMonthlyRecord::opening(&key, 0.0))
            .await
            .unwrap();
        let second = store.insert(NewMonthlyRecord::opening(&key, 0.0)).await;

        assert!(matches!(second, Err(StoreError::Duplicate(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        let result = store.update(id, &RecordPatch::default()).await;
        assert!(matches!(result, Err(StoreError::NotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn test_list_for_label_is_chronological() {
        let store = InMemoryStore::new();
        let first = key(Period::new(2024, 2).unwrap());
        for period in ["2024-02", "2023-11", "2024-01"] {
            let key = RecordKey::new(first.user_id, first.label_id, period.parse().unwrap());
            store
                .insert(NewMonthlyRecord::opening(&key, 0.0))
                .await
                .unwrap();
        }
        // Another label must not leak in
        store
            .insert(NewMonthlyRecord::opening(&key(Period::new(2024, 1).unwrap()), 0.0))
            .await
            .unwrap();

        let months = store
            .list_for_label(first.user_id, first.label_id)
            .await
            .unwrap();
        let order: Vec<(i32, u32)> = months.iter().map(|r| (r.year, r.month)).collect();
        assert_eq!(order, vec![(2023, 11), (2024, 1), (2024, 2)]);
    }
}
