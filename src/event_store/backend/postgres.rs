//! PostgreSQL storage
//!
//! One table per stream type and one shared snapshot table. Table columns
//! are generated from the collection's field schema so the database enforces
//! the same constraints the record model validates.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use super::{Collection, CollectionKind, StorageBackend};
use crate::event_store::record::{
    EventRecord, FieldSpec, FieldType, SnapshotRecord, AGGREGATE_IDENTIFIER, SEQUENCE_NUMBER,
};
use crate::event_store::snapshot::warn_duplicate_snapshot;
use crate::event_store::EventStoreError;

/// Longest identifier PostgreSQL keeps without truncation
const MAX_IDENTIFIER_LEN: usize = 63;

/// Hex digits of the table-name digest in an index name
const INDEX_DIGEST_LEN: usize = 16;

/// Readable part of a generated index name: `<prefix>_<digest>_idx`
const INDEX_NAME_PREFIX_LEN: usize = MAX_IDENTIFIER_LEN - INDEX_DIGEST_LEN - "__idx".len();

/// SQLSTATE `undefined_table`
const UNDEFINED_TABLE: &str = "42P01";

type RecordRow = (String, String, i64, String, Vec<u8>);

/// PostgreSQL [`StorageBackend`] over a connection pool
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Create a new PostgresStorage with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column_definition(field: &FieldSpec) -> String {
    let sql_type = match field.field_type {
        FieldType::String => "TEXT",
        FieldType::Long => "BIGINT",
        FieldType::Binary => "BYTEA",
    };
    let column = quote(field.name);

    let mut def = format!("{} {}", column, sql_type);
    if field.mandatory || field.not_null {
        def.push_str(" NOT NULL");
    }
    match (field.min_len, field.max_len) {
        (Some(min), Some(max)) if min == max => {
            def.push_str(&format!(" CHECK (char_length({}) = {})", column, min));
        }
        (min, max) => {
            if let Some(min) = min {
                def.push_str(&format!(" CHECK (char_length({}) >= {})", column, min));
            }
            if let Some(max) = max {
                def.push_str(&format!(" CHECK (char_length({}) <= {})", column, max));
            }
        }
    }
    def
}

/// `CREATE TABLE` statement for a collection
pub(crate) fn create_table_sql(collection: &Collection) -> String {
    let mut columns = vec!["\"id\" BIGSERIAL PRIMARY KEY".to_string()];
    columns.extend(collection.schema().iter().map(column_definition));

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(collection.name()),
        columns.join(", ")
    )
}

/// Name of a collection's lookup index.
///
/// A readable prefix of the table name followed by a digest of the full name,
/// at most 63 bytes.
pub(crate) fn index_name(table: &str) -> String {
    let mut prefix_end = 0;
    for (idx, c) in table.char_indices() {
        if idx + c.len_utf8() > INDEX_NAME_PREFIX_LEN {
            break;
        }
        prefix_end = idx + c.len_utf8();
    }

    let digest = Sha256::digest(table.as_bytes());
    format!(
        "{}_{}_idx",
        &table[..prefix_end],
        &hex::encode(digest)[..INDEX_DIGEST_LEN]
    )
}

/// A scan of a table that was never provisioned finds nothing
fn is_undefined_table(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNDEFINED_TABLE))
}

fn absent_as_empty<T>(result: Result<Vec<T>, sqlx::Error>) -> Result<Vec<T>, EventStoreError> {
    match result {
        Ok(rows) => Ok(rows),
        Err(err) if is_undefined_table(&err) => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

/// First of the rows ordered by sequence descending, newest first.
///
/// A second row with the same sequence number means duplicate snapshots.
fn first_of_descending(rows: Vec<RecordRow>) -> Option<SnapshotRecord> {
    let mut rows = rows.into_iter().map(|row| SnapshotRecord::from(into_record(row)));
    let latest = rows.next()?;
    if rows.next().map(|next| next.sequence_number) == Some(latest.sequence_number) {
        warn_duplicate_snapshot(&latest);
    }
    Some(latest)
}

/// Lookup index for a collection
pub(crate) fn create_index_sql(collection: &Collection) -> String {
    let key = match collection.kind() {
        CollectionKind::Events => format!("{}, {}", quote(AGGREGATE_IDENTIFIER), quote(SEQUENCE_NUMBER)),
        CollectionKind::Snapshots => format!(
            "\"stream_type\", {}, {}",
            quote(AGGREGATE_IDENTIFIER),
            quote(SEQUENCE_NUMBER)
        ),
    };

    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
        quote(&index_name(collection.name())),
        quote(collection.name()),
        key
    )
}

fn into_record(row: RecordRow) -> EventRecord {
    let (stream_type, aggregate_identifier, sequence_number, timestamp, body) = row;
    EventRecord {
        stream_type,
        aggregate_identifier,
        sequence_number,
        timestamp,
        body,
    }
}

#[async_trait]
impl StorageBackend for PostgresStorage {
    async fn create_collection(&self, collection: &Collection) -> Result<(), EventStoreError> {
        let mut tx = self.pool.begin().await?;

        // Serialises concurrent provisioning of the same table across processes
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(collection.name())
            .execute(&mut *tx)
            .await?;

        sqlx::query(&create_table_sql(collection))
            .execute(&mut *tx)
            .await?;

        sqlx::query(&create_index_sql(collection))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Collection {} provisioned", collection.name());
        Ok(())
    }

    async fn insert_event(
        &self,
        collection: &Collection,
        record: &EventRecord,
    ) -> Result<(), EventStoreError> {
        let sql = format!(
            r#"
            INSERT INTO {} ("aggregate_identifier", "sequence_number", "timestamp", "body")
            VALUES ($1, $2, $3, $4)
            "#,
            quote(collection.name())
        );

        sqlx::query(&sql)
            .bind(&record.aggregate_identifier)
            .bind(record.sequence_number)
            .bind(&record.timestamp)
            .bind(&record.body)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn insert_snapshot(
        &self,
        collection: &Collection,
        record: &SnapshotRecord,
    ) -> Result<(), EventStoreError> {
        let sql = format!(
            r#"
            INSERT INTO {} ("stream_type", "aggregate_identifier", "sequence_number", "timestamp", "body")
            VALUES ($1, $2, $3, $4, $5)
            "#,
            quote(collection.name())
        );

        sqlx::query(&sql)
            .bind(&record.stream_type)
            .bind(&record.aggregate_identifier)
            .bind(record.sequence_number)
            .bind(&record.timestamp)
            .bind(&record.body)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn scan_events(
        &self,
        collection: &Collection,
        aggregate_identifier: &str,
        after: Option<i64>,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        let sql = format!(
            r#"
            SELECT $3::TEXT AS "stream_type", "aggregate_identifier", "sequence_number", "timestamp", "body"
            FROM {}
            WHERE "aggregate_identifier" = $1
              AND ($2::BIGINT IS NULL OR "sequence_number" > $2)
            ORDER BY "id" ASC
            "#,
            quote(collection.name())
        );

        let rows: Vec<RecordRow> = absent_as_empty(
            sqlx::query_as(&sql)
                .bind(aggregate_identifier)
                .bind(after)
                .bind(collection.stream_type().unwrap_or_default())
                .fetch_all(&self.pool)
                .await,
        )?;

        Ok(rows.into_iter().map(into_record).collect())
    }

    async fn scan_snapshots(
        &self,
        collection: &Collection,
        stream_type: &str,
        aggregate_identifier: &str,
    ) -> Result<Vec<SnapshotRecord>, EventStoreError> {
        let sql = format!(
            r#"
            SELECT "stream_type", "aggregate_identifier", "sequence_number", "timestamp", "body"
            FROM {}
            WHERE "stream_type" = $1 AND "aggregate_identifier" = $2
            ORDER BY "id" ASC
            "#,
            quote(collection.name())
        );

        let rows: Vec<RecordRow> = absent_as_empty(
            sqlx::query_as(&sql)
                .bind(stream_type)
                .bind(aggregate_identifier)
                .fetch_all(&self.pool)
                .await,
        )?;

        Ok(rows
            .into_iter()
            .map(|row| into_record(row).into())
            .collect())
    }

    async fn latest_snapshot(
        &self,
        collection: &Collection,
        stream_type: &str,
        aggregate_identifier: &str,
    ) -> Result<Option<SnapshotRecord>, EventStoreError> {
        let sql = format!(
            r#"
            SELECT "stream_type", "aggregate_identifier", "sequence_number", "timestamp", "body"
            FROM {}
            WHERE "stream_type" = $1 AND "aggregate_identifier" = $2
            ORDER BY "sequence_number" DESC, "id" DESC
            LIMIT 2
            "#,
            quote(collection.name())
        );

        let rows: Vec<RecordRow> = absent_as_empty(
            sqlx::query_as(&sql)
                .bind(stream_type)
                .bind(aggregate_identifier)
                .fetch_all(&self.pool)
                .await,
        )?;

        Ok(first_of_descending(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_table_ddl_follows_schema() {
        let sql = create_table_sql(&Collection::events("Doc", "events_Doc"));

        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"events_Doc\""));
        assert!(sql.contains("\"aggregate_identifier\" TEXT NOT NULL"));
        assert!(sql.contains("\"sequence_number\" BIGINT NOT NULL"));
        assert!(sql.contains("\"timestamp\" TEXT NOT NULL CHECK (char_length(\"timestamp\") = 29)"));
        assert!(sql.contains("\"body\" BYTEA NOT NULL"));
        assert!(!sql.contains("\"stream_type\""));
    }

    #[test]
    fn test_snapshot_table_ddl_has_discriminator() {
        let collection = Collection::snapshots("snapshot_events");
        assert!(create_table_sql(&collection).contains("\"stream_type\" TEXT NOT NULL"));
        assert!(create_index_sql(&collection).contains("(\"stream_type\", \"aggregate_identifier\", \"sequence_number\")"));
    }

    #[test]
    fn test_index_names_fit_and_stay_distinct() {
        let long_a = format!("events_{}A", "x".repeat(60));
        let long_b = format!("events_{}B", "x".repeat(60));

        let a = index_name(&long_a);
        let b = index_name(&long_b);

        assert_ne!(a, b);
        assert!(a.len() <= MAX_IDENTIFIER_LEN);
        assert!(b.len() <= MAX_IDENTIFIER_LEN);
        assert!(a.starts_with("events_xxx"));
        assert_eq!(index_name(&long_a), a);

        let short = index_name("events_Doc");
        assert!(short.starts_with("events_Doc_"));
        assert!(short.ends_with("_idx"));
        assert!(create_index_sql(&Collection::events("Doc", "events_Doc")).contains(&quote(&short)));
    }

    #[test]
    fn test_first_of_descending_prefers_newest_row() {
        let row = |seq: i64, body: &str| -> RecordRow {
            (
                "Aggregate".to_string(),
                "1".to_string(),
                seq,
                "2010-10-10T10:10:10.000+00:00".to_string(),
                body.as_bytes().to_vec(),
            )
        };

        assert!(first_of_descending(Vec::new()).is_none());

        let tied = first_of_descending(vec![row(6, "newest"), row(6, "older")]).unwrap();
        assert_eq!(tied.body, b"newest".to_vec());

        let single = first_of_descending(vec![row(6, "b"), row(3, "a")]).unwrap();
        assert_eq!(single.sequence_number, 6);
    }

    #[test]
    fn test_quote_escapes_embedded_quotes() {
        assert_eq!(quote("a\"b"), "\"a\"\"b\"");
    }
}
