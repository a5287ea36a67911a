//! typed_event_store Library
//!
//! Append-only event store for event-sourced aggregates. Each aggregate type
//! gets its own collection; snapshots live in one shared collection and cut
//! short the history returned by reads.

pub mod config;
pub mod db;
pub mod domain;
pub mod event_store;

pub use config::{Config, ConfigError};
pub use domain::{AggregateIdentifier, DomainEvent, EventSerializer, JsonEventSerializer};
pub use event_store::{
    DomainEventStream, EventStore, EventStoreError, MemoryStorage, PostgresStorage, StoreOptions,
};
