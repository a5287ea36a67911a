//! In-memory storage
//!
//! Process-local collections for tests, local development and benchmarks.
//! Each collection is guarded by its own lock so writers to different stream
//! types never contend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use super::{Collection, StorageBackend};
use crate::event_store::record::{EventRecord, FieldSpec, SnapshotRecord};
use crate::event_store::EventStoreError;

#[derive(Debug)]
struct MemoryCollection {
    schema: &'static [FieldSpec],
    records: RwLock<Vec<EventRecord>>,
}

/// In-memory [`StorageBackend`]
#[derive(Debug, Default)]
pub struct MemoryStorage {
    collections: DashMap<String, Arc<MemoryCollection>>,
    creations: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, collection: &Collection) -> Result<Arc<MemoryCollection>, EventStoreError> {
        self.collections
            .get(collection.name())
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| EventStoreError::UnknownCollection(collection.name().to_string()))
    }

    /// Schema a collection was provisioned with
    pub fn schema(&self, name: &str) -> Option<&'static [FieldSpec]> {
        self.collections.get(name).map(|c| c.schema)
    }

    /// Names of all provisioned collections, sorted
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.iter().map(|c| c.key().clone()).collect();
        names.sort();
        names
    }

    /// Raw records of a collection in insertion order, empty if it was never
    /// provisioned
    pub fn records(&self, name: &str) -> Vec<EventRecord> {
        self.collections
            .get(name)
            .map(|c| c.records.read().clone())
            .unwrap_or_default()
    }

    /// Number of times a collection was physically created
    pub fn creation_count(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn create_collection(&self, collection: &Collection) -> Result<(), EventStoreError> {
        self.collections
            .entry(collection.name().to_string())
            .or_insert_with(|| {
                self.creations.fetch_add(1, Ordering::SeqCst);
                Arc::new(MemoryCollection {
                    schema: collection.schema(),
                    records: RwLock::new(Vec::new()),
                })
            });
        Ok(())
    }

    async fn insert_event(
        &self,
        collection: &Collection,
        record: &EventRecord,
    ) -> Result<(), EventStoreError> {
        self.collection(collection)?.records.write().push(record.clone());
        Ok(())
    }

    async fn insert_snapshot(
        &self,
        collection: &Collection,
        record: &SnapshotRecord,
    ) -> Result<(), EventStoreError> {
        let record: &EventRecord = record;
        self.collection(collection)?.records.write().push(record.clone());
        Ok(())
    }

    async fn scan_events(
        &self,
        collection: &Collection,
        aggregate_identifier: &str,
        after: Option<i64>,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        Ok(self
            .records(collection.name())
            .into_iter()
            .filter(|r| r.aggregate_identifier == aggregate_identifier)
            .filter(|r| after.map_or(true, |floor| r.sequence_number > floor))
            .collect())
    }

    async fn scan_snapshots(
        &self,
        collection: &Collection,
        stream_type: &str,
        aggregate_identifier: &str,
    ) -> Result<Vec<SnapshotRecord>, EventStoreError> {
        Ok(self
            .records(collection.name())
            .into_iter()
            .filter(|r| r.stream_type == stream_type && r.aggregate_identifier == aggregate_identifier)
            .map(SnapshotRecord::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, seq: i64) -> EventRecord {
        EventRecord {
            stream_type: "Doc".to_string(),
            aggregate_identifier: id.to_string(),
            sequence_number: seq,
            timestamp: "2010-10-10T10:10:10.000+00:00".to_string(),
            body: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn test_create_collection_is_idempotent() {
        let storage = MemoryStorage::new();
        let collection = Collection::events("Doc", "events_Doc");

        storage.create_collection(&collection).await.unwrap();
        storage.create_collection(&collection).await.unwrap();

        assert_eq!(storage.creation_count(), 1);
        assert_eq!(storage.collection_names(), vec!["events_Doc".to_string()]);
        assert_eq!(storage.schema("events_Doc").unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_insert_into_unknown_collection_fails() {
        let storage = MemoryStorage::new();
        let err = storage
            .insert_event(&Collection::events("Missing", "events_Missing"), &record("1", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, EventStoreError::UnknownCollection(ref name) if name == "events_Missing"));
        assert!(err.is_storage_failure());
    }

    #[tokio::test]
    async fn test_scan_of_unprovisioned_collection_is_empty() {
        let storage = MemoryStorage::new();

        let events = storage
            .scan_events(&Collection::events("Missing", "events_Missing"), "1", None)
            .await
            .unwrap();
        let latest = storage
            .latest_snapshot(&Collection::snapshots("snapshot_events"), "Missing", "1")
            .await
            .unwrap();

        assert!(events.is_empty());
        assert!(latest.is_none());
        assert!(storage.collection_names().is_empty());
    }

    #[tokio::test]
    async fn test_scan_filters_identifier_and_floor() {
        let storage = MemoryStorage::new();
        let collection = Collection::events("Doc", "events_Doc");
        storage.create_collection(&collection).await.unwrap();

        for r in [record("1", 2), record("2", 5), record("1", 1), record("1", 4)] {
            storage.insert_event(&collection, &r).await.unwrap();
        }

        let all: Vec<i64> = storage
            .scan_events(&collection, "1", None)
            .await
            .unwrap()
            .iter()
            .map(|r| r.sequence_number)
            .collect();
        assert_eq!(all, vec![2, 1, 4]);

        let above: Vec<i64> = storage
            .scan_events(&collection, "1", Some(1))
            .await
            .unwrap()
            .iter()
            .map(|r| r.sequence_number)
            .collect();
        assert_eq!(above, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_latest_snapshot_uses_default_selection() {
        let storage = MemoryStorage::new();
        let collection = Collection::snapshots("snapshot_events");
        storage.create_collection(&collection).await.unwrap();

        for seq in [3, 6, 2] {
            storage
                .insert_snapshot(&collection, &record("1", seq).into())
                .await
                .unwrap();
        }

        let mut other = record("1", 9);
        other.stream_type = "Other".to_string();
        storage.insert_snapshot(&collection, &other.into()).await.unwrap();

        let latest = storage
            .latest_snapshot(&collection, "Doc", "1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.sequence_number, 6);
    }
}
