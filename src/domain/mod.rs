//! Domain module
//!
//! Event types exchanged with the framework and the body serializer seam.

pub mod events;
pub mod serializer;

pub use events::{
    format_timestamp, parse_timestamp, AggregateIdentifier, DomainEvent, TIMESTAMP_LEN,
};
pub use serializer::{EventSerializer, JsonEventSerializer};
