//! Database module
//!
//! Connection pool setup for the PostgreSQL backend.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;

/// Open a connection pool from configuration and verify it
pub async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config.require_database_url()?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(database_url)
        .await?;

    verify_connection(&pool).await?;
    tracing::info!("Database connected successfully");

    Ok(pool)
}

/// Check that the database answers queries
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Event tables currently present for a prefix
pub async fn list_event_tables(pool: &PgPool, prefix: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT table_name::TEXT FROM information_schema.tables
        WHERE table_schema = current_schema() AND starts_with(table_name, $1)
        ORDER BY table_name
        "#,
    )
    .bind(prefix)
    .fetch_all(pool)
    .await
}
