//! In-memory store, for tests and dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{CursorKey, HarvestCursor, HarvestedRecord};
use crate::services::identity::Identity;
use crate::storage::{CursorStore, RecordStore, UpsertOutcome};

/// Store keeping records and cursors in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(&'static str, Identity), HarvestedRecord>>,
    cursors: RwLock<HashMap<CursorKey, HarvestCursor>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.records
            .read()
            .await
            .keys()
            .filter(|(c, _)| *c == collection)
            .count()
    }

    /// Total number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert_if_absent(&self, record: &HarvestedRecord) -> Result<UpsertOutcome> {
        let key = (record.collection(), record.identity.clone());
        let mut records = self.records.write().await;
        if records.contains_key(&key) {
            return Ok(UpsertOutcome::Conflict);
        }
        records.insert(key, record.clone());
        Ok(UpsertOutcome::Inserted)
    }
}

#[async_trait]
impl CursorStore for MemoryStore {
    async fn get_cursor(&self, key: &CursorKey) -> Result<Option<HarvestCursor>> {
        Ok(self.cursors.read().await.get(key).cloned())
    }

    async fn set_cursor(&self, cursor: &HarvestCursor) -> Result<()> {
        self.cursors
            .write()
            .await
            .insert(cursor.key(), cursor.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Criterion, RecordBody};
    use chrono::Utc;

    fn record(source: &str) -> HarvestedRecord {
        HarvestedRecord::new(
            "acme",
            "twitter",
            "rockets",
            source,
            Utc::now(),
            RecordBody::Message {
                author: "a".into(),
                text: "t".into(),
            },
        )
    }

    #[tokio::test]
    async fn duplicate_identity_conflicts() {
        let store = MemoryStore::new();
        assert_eq!(
            store.upsert_if_absent(&record("1")).await.unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            store.upsert_if_absent(&record("1")).await.unwrap(),
            UpsertOutcome::Conflict
        );
        assert_eq!(store.count("messages").await, 1);
    }

    #[tokio::test]
    async fn cursor_set_is_an_upsert() {
        let store = MemoryStore::new();
        let key = CursorKey::new("acme", "twitter", &Criterion::keyword("rockets"));
        assert!(store.get_cursor(&key).await.unwrap().is_none());

        let first = HarvestCursor::empty(&key).advance(None, 3);
        store.set_cursor(&first).await.unwrap();
        let second = first.advance(None, 4);
        store.set_cursor(&second).await.unwrap();

        let loaded = store.get_cursor(&key).await.unwrap().unwrap();
        assert_eq!(loaded.pages_harvested, 2);
        assert_eq!(loaded.items_harvested, 7);
    }
}
