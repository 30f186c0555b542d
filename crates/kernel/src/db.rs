//! Database connection pool management.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Schema for the resource document table.
const RESOURCE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS resource (
    project     TEXT   NOT NULL,
    environment TEXT   NOT NULL,
    category    TEXT   NOT NULL,
    id          TEXT   NOT NULL,
    data        JSONB  NOT NULL,
    changed     BIGINT NOT NULL,
    PRIMARY KEY (project, environment, category, id)
)
"#;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    Ok(pool)
}

/// Create the resource table if it does not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(RESOURCE_TABLE)
        .execute(pool)
        .await
        .context("failed to create resource table")?;

    Ok(())
}

/// Check if the database connection is healthy.
pub async fn check_health(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}
