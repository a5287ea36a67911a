//! Type Registry
//!
//! Lazily provisions one isolated event collection per stream type and the
//! shared snapshot collection. Provisioning is guarded per stream type: racing
//! first users of the same type produce exactly one physical creation, while
//! first users of different types never wait on each other.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use super::backend::{Collection, StorageBackend};
use super::EventStoreError;

/// Longest table name PostgreSQL keeps without truncation
const MAX_COLLECTION_NAME_LEN: usize = 63;

/// Collection naming options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Prefix of every per-type event collection name
    pub table_prefix: String,
    /// Name of the shared snapshot collection
    pub snapshot_collection: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            table_prefix: "events_".to_string(),
            snapshot_collection: "snapshot_events".to_string(),
        }
    }
}

impl StoreOptions {
    /// Collection name for a stream type.
    ///
    /// Stream types must be plain identifiers (`[A-Za-z_][A-Za-z0-9_]*`) so
    /// they can name a table.
    pub fn collection_name(&self, stream_type: &str) -> Result<String, EventStoreError> {
        let mut chars = stream_type.chars();
        let valid_start = chars
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
        let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_start || !valid_rest {
            return Err(EventStoreError::InvalidStreamType(stream_type.to_string()));
        }

        let name = format!("{}{}", self.table_prefix, stream_type);
        if name.len() > MAX_COLLECTION_NAME_LEN || name == self.snapshot_collection {
            return Err(EventStoreError::InvalidStreamType(stream_type.to_string()));
        }
        Ok(name)
    }
}

/// Registry of provisioned collections
pub struct TypeRegistry<B> {
    backend: Arc<B>,
    options: StoreOptions,
    collections: DashMap<String, Arc<OnceCell<Collection>>>,
    snapshots: OnceCell<Collection>,
}

impl<B: StorageBackend> TypeRegistry<B> {
    pub fn new(backend: Arc<B>, options: StoreOptions) -> Self {
        Self {
            backend,
            options,
            collections: DashMap::new(),
            snapshots: OnceCell::new(),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Event collection of a stream type, created on first use
    pub async fn ensure_collection(&self, stream_type: &str) -> Result<Collection, EventStoreError> {
        // The map shard lock is only held while fetching the cell
        let cell = match self.collections.get(stream_type) {
            Some(cell) => Arc::clone(cell.value()),
            None => {
                self.options.collection_name(stream_type)?;
                let entry = self
                    .collections
                    .entry(stream_type.to_string())
                    .or_insert_with(|| Arc::new(OnceCell::new()));
                Arc::clone(entry.value())
            }
        };

        let collection = cell
            .get_or_try_init(|| async {
                let name = self.options.collection_name(stream_type)?;
                let collection = Collection::events(stream_type, name);
                self.backend.create_collection(&collection).await?;
                tracing::info!(
                    "Event collection {} ready for stream type {}",
                    collection.name(),
                    stream_type
                );
                Ok::<_, EventStoreError>(collection)
            })
            .await?;

        Ok(collection.clone())
    }

    /// The shared snapshot collection, created on first use
    pub async fn ensure_snapshot_collection(&self) -> Result<Collection, EventStoreError> {
        let collection = self
            .snapshots
            .get_or_try_init(|| async {
                let collection = Collection::snapshots(self.options.snapshot_collection.clone());
                self.backend.create_collection(&collection).await?;
                tracing::info!("Snapshot collection {} ready", collection.name());
                Ok::<_, EventStoreError>(collection)
            })
            .await?;

        Ok(collection.clone())
    }

    /// Handle to the event collection of a stream type without provisioning it.
    ///
    /// Reads go through this: scanning a collection that was never created
    /// finds nothing.
    pub fn collection_for(&self, stream_type: &str) -> Result<Collection, EventStoreError> {
        if let Some(collection) = self
            .collections
            .get(stream_type)
            .and_then(|cell| cell.value().get().cloned())
        {
            return Ok(collection);
        }
        let name = self.options.collection_name(stream_type)?;
        Ok(Collection::events(stream_type, name))
    }

    /// Handle to the shared snapshot collection without provisioning it
    pub fn snapshot_collection(&self) -> Collection {
        match self.snapshots.get() {
            Some(collection) => collection.clone(),
            None => Collection::snapshots(self.options.snapshot_collection.clone()),
        }
    }

    /// Stream types provisioned so far
    pub fn stream_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .collections
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect();
        types.sort();
        types
    }
}
