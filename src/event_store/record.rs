//! Record Model
//!
//! Persisted shape of event and snapshot records, and the field schema every
//! collection is provisioned with. Records are validated against the schema
//! before they reach a storage backend.

use std::ops::Deref;

use crate::domain::{
    format_timestamp, parse_timestamp, AggregateIdentifier, DomainEvent, EventSerializer,
    TIMESTAMP_LEN,
};

use super::EventStoreError;

/// Storage type of a persisted field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Long,
    Binary,
}

/// Declared constraints of one persisted field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub mandatory: bool,
    pub not_null: bool,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
}

impl FieldSpec {
    const fn required(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            mandatory: true,
            not_null: true,
            min_len: None,
            max_len: None,
        }
    }

    const fn fixed_len(mut self, len: usize) -> Self {
        self.min_len = Some(len);
        self.max_len = Some(len);
        self
    }
}

pub const AGGREGATE_IDENTIFIER: &str = "aggregate_identifier";
pub const SEQUENCE_NUMBER: &str = "sequence_number";
pub const TIMESTAMP: &str = "timestamp";
pub const BODY: &str = "body";
pub const STREAM_TYPE: &str = "stream_type";

/// Fields of a per-type event collection
pub const EVENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::required(AGGREGATE_IDENTIFIER, FieldType::String),
    FieldSpec::required(SEQUENCE_NUMBER, FieldType::Long),
    FieldSpec::required(TIMESTAMP, FieldType::String).fixed_len(TIMESTAMP_LEN),
    FieldSpec::required(BODY, FieldType::Binary),
];

/// Fields of the shared snapshot collection: the event fields plus the
/// stream type discriminator
pub const SNAPSHOT_FIELDS: &[FieldSpec] = &[
    FieldSpec::required(STREAM_TYPE, FieldType::String),
    FieldSpec::required(AGGREGATE_IDENTIFIER, FieldType::String),
    FieldSpec::required(SEQUENCE_NUMBER, FieldType::Long),
    FieldSpec::required(TIMESTAMP, FieldType::String).fixed_len(TIMESTAMP_LEN),
    FieldSpec::required(BODY, FieldType::Binary),
];

/// One persisted domain event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub stream_type: String,
    pub aggregate_identifier: String,
    pub sequence_number: i64,
    pub timestamp: String,
    pub body: Vec<u8>,
}

impl EventRecord {
    /// Build a validated record from a domain event
    pub fn from_event(
        stream_type: &str,
        event: &DomainEvent,
        serializer: &dyn EventSerializer,
    ) -> Result<Self, EventStoreError> {
        let record = Self {
            stream_type: stream_type.to_string(),
            aggregate_identifier: event.aggregate_identifier.as_str().to_string(),
            sequence_number: event.sequence_number,
            timestamp: format_timestamp(&event.timestamp),
            body: serializer.serialize(&event.payload)?,
        };
        record.validate()?;
        Ok(record)
    }

    /// Check the record against the string constraints of [`EVENT_FIELDS`].
    ///
    /// An empty aggregate identifier counts as null.
    pub fn validate(&self) -> Result<(), EventStoreError> {
        if self.aggregate_identifier.is_empty() {
            return Err(EventStoreError::schema(
                AGGREGATE_IDENTIFIER,
                "mandatory field is empty",
            ));
        }

        let len = self.timestamp.chars().count();
        if len != TIMESTAMP_LEN {
            return Err(EventStoreError::schema(
                TIMESTAMP,
                format!("length {}, expected {}", len, TIMESTAMP_LEN),
            ));
        }

        Ok(())
    }

    /// Decode the record back into a domain event
    pub fn into_event(self, serializer: &dyn EventSerializer) -> Result<DomainEvent, EventStoreError> {
        let timestamp = parse_timestamp(&self.timestamp).map_err(|e| {
            EventStoreError::CorruptRecord(format!(
                "{} #{} has unreadable timestamp {:?}: {}",
                self.aggregate_identifier, self.sequence_number, self.timestamp, e
            ))
        })?;

        Ok(DomainEvent {
            aggregate_identifier: AggregateIdentifier::new(self.aggregate_identifier),
            sequence_number: self.sequence_number,
            timestamp,
            payload: serializer.deserialize(&self.body)?,
        })
    }
}

/// A snapshot: stands in for every event of its aggregate up to and
/// including its sequence number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord(EventRecord);

impl SnapshotRecord {
    pub fn from_event(
        stream_type: &str,
        event: &DomainEvent,
        serializer: &dyn EventSerializer,
    ) -> Result<Self, EventStoreError> {
        EventRecord::from_event(stream_type, event, serializer).map(Self)
    }

    pub fn into_record(self) -> EventRecord {
        self.0
    }
}

impl From<EventRecord> for SnapshotRecord {
    fn from(record: EventRecord) -> Self {
        Self(record)
    }
}

impl Deref for SnapshotRecord {
    type Target = EventRecord;

    fn deref(&self) -> &EventRecord {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JsonEventSerializer;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn event(id: &str, seq: i64) -> DomainEvent {
        DomainEvent::new(id, seq, json!({"value": "val"}))
    }

    #[test]
    fn test_event_schema_declares_four_required_fields() {
        assert_eq!(EVENT_FIELDS.len(), 4);
        assert!(EVENT_FIELDS.iter().all(|f| f.mandatory && f.not_null));

        let ts = EVENT_FIELDS.iter().find(|f| f.name == TIMESTAMP).unwrap();
        assert_eq!(ts.field_type, FieldType::String);
        assert_eq!(ts.min_len, Some(29));
        assert_eq!(ts.max_len, Some(29));

        let seq = EVENT_FIELDS.iter().find(|f| f.name == SEQUENCE_NUMBER).unwrap();
        assert_eq!(seq.field_type, FieldType::Long);

        let body = EVENT_FIELDS.iter().find(|f| f.name == BODY).unwrap();
        assert_eq!(body.field_type, FieldType::Binary);
    }

    #[test]
    fn test_snapshot_schema_adds_stream_type() {
        assert_eq!(SNAPSHOT_FIELDS.len(), EVENT_FIELDS.len() + 1);
        assert_eq!(SNAPSHOT_FIELDS[0].name, STREAM_TYPE);
        assert!(EVENT_FIELDS.iter().all(|f| SNAPSHOT_FIELDS.contains(f)));
    }

    #[test]
    fn test_record_from_event_maps_fields() {
        let e = event("1", 7);
        let record = EventRecord::from_event("Doc", &e, &JsonEventSerializer).unwrap();

        assert_eq!(record.stream_type, "Doc");
        assert_eq!(record.aggregate_identifier, "1");
        assert_eq!(record.sequence_number, 7);
        assert_eq!(record.timestamp, format_timestamp(&e.timestamp));
        assert_eq!(record.body, br#"{"value":"val"}"#.to_vec());
    }

    #[test]
    fn test_record_decodes_to_same_event() {
        let e = event("agg-9", 42);
        let record = EventRecord::from_event("Doc", &e, &JsonEventSerializer).unwrap();
        assert_eq!(record.into_event(&JsonEventSerializer).unwrap(), e);
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let err = EventRecord::from_event("Doc", &event("", 1), &JsonEventSerializer).unwrap_err();
        assert!(matches!(
            err,
            EventStoreError::SchemaViolation { field: AGGREGATE_IDENTIFIER, .. }
        ));
    }

    #[test]
    fn test_wide_timestamp_rejected() {
        let far_future = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        let e = event("1", 1).with_timestamp(far_future);

        let err = EventRecord::from_event("Doc", &e, &JsonEventSerializer).unwrap_err();
        assert!(matches!(
            err,
            EventStoreError::SchemaViolation { field: TIMESTAMP, .. }
        ));
    }

    #[test]
    fn test_unreadable_timestamp_is_corrupt_record() {
        let record = EventRecord {
            stream_type: "Doc".to_string(),
            aggregate_identifier: "1".to_string(),
            sequence_number: 1,
            timestamp: "x".repeat(29),
            body: b"{}".to_vec(),
        };
        let err = record.into_event(&JsonEventSerializer).unwrap_err();
        assert!(matches!(err, EventStoreError::CorruptRecord(_)));
    }
}
