//! Domain event stream
//!
//! Forward-only view over one aggregate's reconstructed history: the active
//! snapshot (if any) followed by the newer events in ascending sequence
//! order. Records are decoded one at a time as the stream is consumed.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::domain::{DomainEvent, EventSerializer};

use super::record::{EventRecord, SnapshotRecord};
use super::EventStoreError;

/// Ordered, finite, single-pass event stream
pub struct DomainEventStream {
    records: VecDeque<EventRecord>,
    snapshot_sequence_number: Option<i64>,
    serializer: Arc<dyn EventSerializer>,
}

impl DomainEventStream {
    /// Assemble a stream from the active snapshot and the events above it.
    ///
    /// `events` are sorted here by sequence number. The sort is stable, so
    /// records sharing a sequence number keep their storage (insertion) order.
    pub fn new(
        snapshot: Option<SnapshotRecord>,
        mut events: Vec<EventRecord>,
        serializer: Arc<dyn EventSerializer>,
    ) -> Self {
        events.sort_by_key(|r| r.sequence_number);

        let snapshot_sequence_number = snapshot.as_ref().map(|s| s.sequence_number);
        let mut records = VecDeque::with_capacity(events.len() + 1);
        records.extend(snapshot.map(SnapshotRecord::into_record));
        records.extend(events);

        Self {
            records,
            snapshot_sequence_number,
            serializer,
        }
    }

    /// An empty stream
    pub fn empty(serializer: Arc<dyn EventSerializer>) -> Self {
        Self::new(None, Vec::new(), serializer)
    }

    pub fn has_next(&self) -> bool {
        !self.records.is_empty()
    }

    /// Next record without consuming it
    pub fn peek(&self) -> Option<&EventRecord> {
        self.records.front()
    }

    /// Sequence number of the snapshot heading this stream
    pub fn snapshot_sequence_number(&self) -> Option<i64> {
        self.snapshot_sequence_number
    }
}

impl Iterator for DomainEventStream {
    type Item = Result<DomainEvent, EventStoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.records
            .pop_front()
            .map(|record| record.into_event(self.serializer.as_ref()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.records.len(), Some(self.records.len()))
    }
}

impl ExactSizeIterator for DomainEventStream {}

impl std::fmt::Debug for DomainEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainEventStream")
            .field("remaining", &self.records.len())
            .field("snapshot_sequence_number", &self.snapshot_sequence_number)
            .finish()
    }
}
