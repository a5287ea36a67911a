//! Snapshot Index
//!
//! Finds the active snapshot of an aggregate: the one with the greatest
//! sequence number among all snapshots stored for its (stream type,
//! aggregate identifier) pair.

use std::sync::Arc;

use crate::domain::AggregateIdentifier;

use super::backend::{Collection, StorageBackend};
use super::record::SnapshotRecord;
use super::EventStoreError;

/// Pick the snapshot with the greatest sequence number.
///
/// Input is expected in insertion order. When several snapshots share the
/// greatest sequence number the most recently written one wins.
pub fn select_latest<I>(snapshots: I) -> Option<SnapshotRecord>
where
    I: IntoIterator<Item = SnapshotRecord>,
{
    let mut latest: Option<SnapshotRecord> = None;

    for snapshot in snapshots {
        let current = latest.as_ref().map(|s| s.sequence_number);
        match current {
            Some(seq) if snapshot.sequence_number < seq => {}
            Some(seq) if snapshot.sequence_number == seq => {
                warn_duplicate_snapshot(&snapshot);
                latest = Some(snapshot);
            }
            _ => latest = Some(snapshot),
        }
    }

    latest
}

/// Logged whenever several snapshots share the winning sequence number
pub(crate) fn warn_duplicate_snapshot(winner: &SnapshotRecord) {
    tracing::warn!(
        "Duplicate snapshot sequence {} for {} aggregate {}, using the latest written",
        winner.sequence_number,
        winner.stream_type,
        winner.aggregate_identifier
    );
}

/// Lookup of the active snapshot per aggregate
#[derive(Debug)]
pub struct SnapshotIndex<B> {
    backend: Arc<B>,
}

impl<B> Clone for SnapshotIndex<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: StorageBackend> SnapshotIndex<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Latest snapshot for the pair, or `None` if the aggregate has none
    pub async fn latest(
        &self,
        collection: &Collection,
        stream_type: &str,
        aggregate_identifier: &AggregateIdentifier,
    ) -> Result<Option<SnapshotRecord>, EventStoreError> {
        let snapshot = self
            .backend
            .latest_snapshot(collection, stream_type, aggregate_identifier.as_str())
            .await?;

        if let Some(ref s) = snapshot {
            tracing::debug!(
                "Active snapshot for {} aggregate {} at sequence {}",
                stream_type,
                aggregate_identifier,
                s.sequence_number
            );
        }

        Ok(snapshot)
    }
}
