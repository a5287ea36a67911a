//! Storage backends
//!
//! The store talks to an already-open storage session through
//! [`StorageBackend`]. Backends only provision, insert and scan; ordering,
//! snapshot selection and decoding happen above them.

mod memory;
mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;

use async_trait::async_trait;

use super::record::{EventRecord, FieldSpec, SnapshotRecord, EVENT_FIELDS, SNAPSHOT_FIELDS};
use super::snapshot::select_latest;
use super::EventStoreError;

/// What a collection holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// Events of a single stream type
    Events,
    /// Snapshots of every stream type
    Snapshots,
}

/// Handle to a provisioned storage collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Collection {
    name: String,
    kind: CollectionKind,
    stream_type: Option<String>,
}

impl Collection {
    pub fn events(stream_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CollectionKind::Events,
            stream_type: Some(stream_type.into()),
        }
    }

    pub fn snapshots(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CollectionKind::Snapshots,
            stream_type: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Stream type owning an event collection; `None` for the snapshot collection
    pub fn stream_type(&self) -> Option<&str> {
        self.stream_type.as_deref()
    }

    /// Field schema this collection is provisioned with
    pub fn schema(&self) -> &'static [FieldSpec] {
        match self.kind {
            CollectionKind::Events => EVENT_FIELDS,
            CollectionKind::Snapshots => SNAPSHOT_FIELDS,
        }
    }
}

/// Interface for record persistence.
///
/// Implementations:
/// - `PostgresStorage`: one table per stream type plus a shared snapshot table
/// - `MemoryStorage`: in-process collections for tests and benchmarks
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Provision a collection with its schema.
    ///
    /// Must be idempotent: provisioning an existing collection is a no-op.
    async fn create_collection(&self, collection: &Collection) -> Result<(), EventStoreError>;

    /// Insert one event record. The record is visible completely or not at all.
    async fn insert_event(
        &self,
        collection: &Collection,
        record: &EventRecord,
    ) -> Result<(), EventStoreError>;

    /// Insert one snapshot record into the shared snapshot collection
    async fn insert_snapshot(
        &self,
        collection: &Collection,
        record: &SnapshotRecord,
    ) -> Result<(), EventStoreError>;

    /// Records of one aggregate with a sequence number greater than `after`
    /// (all of them when `after` is `None`), in insertion order.
    async fn scan_events(
        &self,
        collection: &Collection,
        aggregate_identifier: &str,
        after: Option<i64>,
    ) -> Result<Vec<EventRecord>, EventStoreError>;

    /// Snapshots of one (stream type, aggregate) pair, in insertion order
    async fn scan_snapshots(
        &self,
        collection: &Collection,
        stream_type: &str,
        aggregate_identifier: &str,
    ) -> Result<Vec<SnapshotRecord>, EventStoreError>;

    /// Snapshot with the greatest sequence number for the pair.
    ///
    /// Backends with a native max query should override this; the result must
    /// agree with [`select_latest`] over `scan_snapshots`.
    async fn latest_snapshot(
        &self,
        collection: &Collection,
        stream_type: &str,
        aggregate_identifier: &str,
    ) -> Result<Option<SnapshotRecord>, EventStoreError> {
        let snapshots = self
            .scan_snapshots(collection, stream_type, aggregate_identifier)
            .await?;
        Ok(select_latest(snapshots))
    }
}
