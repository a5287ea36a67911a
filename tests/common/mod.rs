//! Common test utilities

#![allow(dead_code)]

use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use typed_event_store::{
    AggregateIdentifier, DomainEvent, DomainEventStream, EventStore, MemoryStorage,
    PostgresStorage, StoreOptions,
};

/// Fresh in-memory store
pub fn memory_store() -> EventStore<MemoryStorage> {
    EventStore::new(MemoryStorage::new())
}

/// Store over the test database, with table names unique to this test run
pub async fn postgres_store(tag: &str) -> EventStore<PostgresStorage> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool: PgPool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    let run = uuid::Uuid::new_v4().simple().to_string();
    let options = StoreOptions {
        table_prefix: format!("t{}_{}_", &run[..8], tag),
        snapshot_collection: format!("t{}_{}_snapshots", &run[..8], tag),
    };
    EventStore::with_options(PostgresStorage::new(pool), options)
}

pub fn agg_id(id: &str) -> AggregateIdentifier {
    AggregateIdentifier::from(id)
}

/// Events built from paired sequence numbers and aggregate ids, each with a
/// distinct payload
pub fn create_events(sequence_numbers: &[i64], ids: &[&str]) -> Vec<DomainEvent> {
    assert_eq!(
        sequence_numbers.len(),
        ids.len(),
        "Amount of sequence numbers should be equal to amount of aggregate IDs"
    );
    sequence_numbers
        .iter()
        .zip(ids)
        .enumerate()
        .map(|(i, (seq, id))| DomainEvent::new(*id, *seq, json!({"value": format!("val{}-{}", i, id)})))
        .collect()
}

pub fn snapshot_event(id: &str, seq: i64) -> DomainEvent {
    DomainEvent::new(id, seq, json!({"snapshot": true, "state": format!("state-{}", seq)}))
}

pub fn sort_by_sequence_number(events: &[DomainEvent]) -> Vec<DomainEvent> {
    let mut sorted = events.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);
    sorted
}

/// Assert the stream yields exactly the expected events, in order
pub fn assert_stream_equals(expected: &[DomainEvent], stream: DomainEventStream) {
    let read: Vec<DomainEvent> = stream
        .collect::<Result<_, _>>()
        .expect("stream should decode");
    assert_eq!(read, expected);
}
