//! Domain Events
//!
//! The event shape exchanged with the surrounding event-sourcing framework.
//! Events are immutable facts about one aggregate, positioned by a
//! caller-assigned sequence number.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Length of the canonical timestamp representation
/// (`2010-10-10T10:10:10.000+00:00`).
pub const TIMESTAMP_LEN: usize = 29;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// Opaque identifier of an aggregate instance.
///
/// Only the string representation is persisted, so any identifier scheme
/// (UUIDs, natural keys, counters) can be used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateIdentifier(String);

impl AggregateIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregateIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AggregateIdentifier {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AggregateIdentifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<Uuid> for AggregateIdentifier {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

/// A domain event as handed to (and returned by) the event store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub aggregate_identifier: AggregateIdentifier,
    pub sequence_number: i64,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl DomainEvent {
    /// Create an event stamped with the current time.
    ///
    /// The timestamp is truncated to milliseconds, the precision of the
    /// persisted representation, so a stored event reads back unchanged.
    pub fn new(
        aggregate_identifier: impl Into<AggregateIdentifier>,
        sequence_number: i64,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            aggregate_identifier: aggregate_identifier.into(),
            sequence_number,
            timestamp: Utc::now().trunc_subsecs(3),
            payload,
        }
    }

    /// Override the event time
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Render a timestamp in the fixed-width persisted form.
///
/// Years outside 0..=9999 produce a string of a different length, which the
/// record schema rejects.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a persisted timestamp back into UTC
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_is_fixed_width() {
        let ts = Utc.with_ymd_and_hms(2010, 10, 10, 10, 10, 10).unwrap();
        let formatted = format_timestamp(&ts);

        assert_eq!(formatted, "2010-10-10T10:10:10.000+00:00");
        assert_eq!(formatted.len(), TIMESTAMP_LEN);
    }

    #[test]
    fn test_timestamp_round_trip_keeps_millis() {
        let ts = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let parsed = parse_timestamp(&format_timestamp(&ts)).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_out_of_range_year_changes_width() {
        let ts = Utc.with_ymd_and_hms(12000, 1, 1, 0, 0, 0).unwrap();
        assert_ne!(format_timestamp(&ts).len(), TIMESTAMP_LEN);
    }

    #[test]
    fn test_new_event_truncates_to_millis() {
        let event = DomainEvent::new("1", 1, serde_json::json!({"value": "val"}));
        assert_eq!(event.timestamp.timestamp_subsec_nanos() % 1_000_000, 0);
        assert_eq!(event.aggregate_identifier.as_str(), "1");
    }

    #[test]
    fn test_aggregate_identifier_from_uuid() {
        let id = Uuid::new_v4();
        let agg: AggregateIdentifier = id.into();
        assert_eq!(agg.to_string(), id.to_string());
    }
}
