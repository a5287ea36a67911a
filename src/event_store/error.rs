//! Event Store Errors
//!
//! Error types for event store operations.

/// Errors that can occur in the event store
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// A record does not satisfy the collection schema
    #[error("Schema violation on field '{field}': {reason}")]
    SchemaViolation { field: &'static str, reason: String },

    /// Stream type cannot be used as a collection name
    #[error("Invalid stream type: {0:?}")]
    InvalidStreamType(String),

    /// Storage layer failure
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),

    /// Write or scan against a collection that was never provisioned
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored record could not be decoded
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl EventStoreError {
    pub(crate) fn schema(field: &'static str, reason: impl Into<String>) -> Self {
        EventStoreError::SchemaViolation {
            field,
            reason: reason.into(),
        }
    }

    /// Check if this error is a schema violation
    pub fn is_schema_violation(&self) -> bool {
        matches!(self, EventStoreError::SchemaViolation { .. })
    }

    /// Check if this error came from the storage layer.
    ///
    /// These are surfaced unchanged; retrying is up to the caller.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            EventStoreError::StorageUnavailable(_) | EventStoreError::UnknownCollection(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let violation = EventStoreError::schema("timestamp", "length 30, expected 29");
        assert!(violation.is_schema_violation());
        assert!(!violation.is_storage_failure());
        assert_eq!(
            violation.to_string(),
            "Schema violation on field 'timestamp': length 30, expected 29"
        );

        let storage = EventStoreError::StorageUnavailable(sqlx::Error::PoolTimedOut);
        assert!(storage.is_storage_failure());
        assert!(!storage.is_schema_violation());
    }
}
