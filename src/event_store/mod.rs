//! Event Store module
//!
//! Append-only persistence of domain events, one isolated collection per
//! stream type, with snapshot-compacted reads.

pub mod backend;
mod error;
pub mod record;
mod registry;
mod repository;
mod snapshot;
mod stream;

pub use backend::{Collection, CollectionKind, MemoryStorage, PostgresStorage, StorageBackend};
pub use error::EventStoreError;
pub use record::{EventRecord, FieldSpec, FieldType, SnapshotRecord, EVENT_FIELDS, SNAPSHOT_FIELDS};
pub use registry::{StoreOptions, TypeRegistry};
pub use repository::EventStore;
pub use snapshot::{select_latest, SnapshotIndex};
pub use stream::DomainEventStream;
