//! Event body serialization
//!
//! The store persists event bodies as opaque bytes. How a payload becomes
//! bytes is decided by an [`EventSerializer`]; the store never looks inside.

use crate::event_store::EventStoreError;

/// Converts event payloads to and from their stored byte form
pub trait EventSerializer: Send + Sync {
    fn serialize(&self, payload: &serde_json::Value) -> Result<Vec<u8>, EventStoreError>;

    fn deserialize(&self, body: &[u8]) -> Result<serde_json::Value, EventStoreError>;
}

/// JSON body serializer (the default)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEventSerializer;

impl EventSerializer for JsonEventSerializer {
    fn serialize(&self, payload: &serde_json::Value) -> Result<Vec<u8>, EventStoreError> {
        Ok(serde_json::to_vec(payload)?)
    }

    fn deserialize(&self, body: &[u8]) -> Result<serde_json::Value, EventStoreError> {
        Ok(serde_json::from_slice(body)?)
    }
}
