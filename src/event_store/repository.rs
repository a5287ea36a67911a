//! Event Store Repository
//!
//! Append and read paths of the store. Appends write one record per event
//! into the stream type's own collection (snapshots go to the shared
//! snapshot collection). Reads combine the active snapshot with the newer
//! events of the aggregate into an ordered [`DomainEventStream`].

use std::sync::Arc;

use crate::domain::{AggregateIdentifier, DomainEvent, EventSerializer, JsonEventSerializer};

use super::backend::StorageBackend;
use super::record::{EventRecord, SnapshotRecord};
use super::registry::{StoreOptions, TypeRegistry};
use super::snapshot::SnapshotIndex;
use super::stream::DomainEventStream;
use super::EventStoreError;

/// Event Store for persisting and retrieving events
pub struct EventStore<B> {
    backend: Arc<B>,
    registry: Arc<TypeRegistry<B>>,
    snapshots: SnapshotIndex<B>,
    serializer: Arc<dyn EventSerializer>,
}

impl<B> Clone for EventStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            registry: Arc::clone(&self.registry),
            snapshots: self.snapshots.clone(),
            serializer: Arc::clone(&self.serializer),
        }
    }
}

impl<B: StorageBackend> EventStore<B> {
    /// Create a new EventStore over a storage backend with default naming
    /// and JSON bodies
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, StoreOptions::default())
    }

    /// Create a new EventStore with explicit collection naming
    pub fn with_options(backend: B, options: StoreOptions) -> Self {
        let backend = Arc::new(backend);
        Self {
            registry: Arc::new(TypeRegistry::new(Arc::clone(&backend), options)),
            snapshots: SnapshotIndex::new(Arc::clone(&backend)),
            serializer: Arc::new(JsonEventSerializer),
            backend,
        }
    }

    /// Replace the body serializer
    pub fn with_serializer(mut self, serializer: Arc<dyn EventSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &TypeRegistry<B> {
        &self.registry
    }

    // =========================================================================
    // Append
    // =========================================================================

    /// Append a batch of events for one stream type.
    ///
    /// Every event is validated before anything is written, so a schema
    /// violation rejects the whole batch. Records are then written one by
    /// one; a storage failure part-way leaves the earlier records in place.
    /// Sequence numbers are stored as given, without duplicate or ordering
    /// checks. Returns the number of records written.
    pub async fn append_events(
        &self,
        stream_type: &str,
        events: &[DomainEvent],
    ) -> Result<usize, EventStoreError> {
        let records = events
            .iter()
            .map(|event| EventRecord::from_event(stream_type, event, self.serializer.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let collection = self.registry.ensure_collection(stream_type).await?;

        for record in &records {
            self.backend.insert_event(&collection, record).await?;
        }

        tracing::debug!(
            "Appended {} events to {} ({})",
            records.len(),
            stream_type,
            collection.name()
        );

        Ok(records.len())
    }

    /// Append a snapshot of one aggregate to the shared snapshot collection
    pub async fn append_snapshot_event(
        &self,
        stream_type: &str,
        event: &DomainEvent,
    ) -> Result<(), EventStoreError> {
        // Snapshots of unusable stream types could never be read back
        self.registry.options().collection_name(stream_type)?;

        let record = SnapshotRecord::from_event(stream_type, event, self.serializer.as_ref())?;
        let collection = self.registry.ensure_snapshot_collection().await?;

        self.backend.insert_snapshot(&collection, &record).await?;

        tracing::debug!(
            "Snapshot for {} aggregate {} stored at sequence {}",
            stream_type,
            record.aggregate_identifier,
            record.sequence_number
        );

        Ok(())
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Reconstruct the event history of one aggregate.
    ///
    /// The stream starts with the aggregate's latest snapshot, if any,
    /// followed by every event with a greater sequence number in ascending
    /// order. Without a snapshot the full history is returned. An unknown
    /// aggregate yields an empty stream. Reads never provision collections.
    pub async fn read_events(
        &self,
        stream_type: &str,
        aggregate_identifier: &AggregateIdentifier,
    ) -> Result<DomainEventStream, EventStoreError> {
        let collection = self.registry.collection_for(stream_type)?;
        let snapshot_collection = self.registry.snapshot_collection();

        let snapshot = self
            .snapshots
            .latest(&snapshot_collection, stream_type, aggregate_identifier)
            .await?;
        let floor = snapshot.as_ref().map(|s| s.sequence_number);

        let events = self
            .backend
            .scan_events(&collection, aggregate_identifier.as_str(), floor)
            .await?;

        tracing::debug!(
            "Read {} events for {} aggregate {} (snapshot: {:?})",
            events.len(),
            stream_type,
            aggregate_identifier,
            floor
        );

        Ok(DomainEventStream::new(
            snapshot,
            events,
            Arc::clone(&self.serializer),
        ))
    }

    /// Read and decode the whole stream at once
    pub async fn load_events(
        &self,
        stream_type: &str,
        aggregate_identifier: &AggregateIdentifier,
    ) -> Result<Vec<DomainEvent>, EventStoreError> {
        self.read_events(stream_type, aggregate_identifier)
            .await?
            .collect()
    }
}
