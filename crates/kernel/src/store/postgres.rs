//! PostgreSQL resource store.
//!
//! Documents live in a single JSONB table keyed by
//! `(project, environment, category, id)`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;

use super::{ResourceStore, Scope};

/// PostgreSQL-backed resource store.
#[derive(Clone)]
pub struct PgResourceStore {
    pool: PgPool,
}

impl PgResourceStore {
    /// Create a store over an existing pool. Call [`crate::db::ensure_schema`] first.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ResourceStore for PgResourceStore {
    async fn find(&self, scope: &Scope, category: &str, id: &str) -> Result<Option<Value>> {
        let row: Option<(Value,)> = sqlx::query_as(
            r#"
            SELECT data FROM resource
            WHERE project = $1 AND environment = $2 AND category = $3 AND id = $4
            "#,
        )
        .bind(&scope.project)
        .bind(&scope.environment)
        .bind(category)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch resource")?;

        Ok(row.map(|(data,)| data))
    }

    async fn list(&self, scope: &Scope, category: &str) -> Result<Vec<Value>> {
        let rows: Vec<(Value,)> = sqlx::query_as(
            r#"
            SELECT data FROM resource
            WHERE project = $1 AND environment = $2 AND category = $3
            ORDER BY id
            "#,
        )
        .bind(&scope.project)
        .bind(&scope.environment)
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .context("failed to list resources")?;

        Ok(rows.into_iter().map(|(data,)| data).collect())
    }

    async fn upsert(
        &self,
        scope: &Scope,
        category: &str,
        id: &str,
        document: &Value,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO resource (project, environment, category, id, data, changed)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (project, environment, category, id) DO UPDATE SET
                data = EXCLUDED.data,
                changed = EXCLUDED.changed
            "#,
        )
        .bind(&scope.project)
        .bind(&scope.environment)
        .bind(category)
        .bind(id)
        .bind(document)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("failed to upsert resource")?;

        Ok(())
    }

    async fn merge(
        &self,
        scope: &Scope,
        category: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        // `||` replaces only the named top-level keys, inside the row update.
        let result = sqlx::query(
            r#"
            UPDATE resource SET data = data || $5, changed = $6
            WHERE project = $1 AND environment = $2 AND category = $3 AND id = $4
            "#,
        )
        .bind(&scope.project)
        .bind(&scope.environment)
        .bind(category)
        .bind(id)
        .bind(Value::Object(fields.clone()))
        .bind(now)
        .execute(&self.pool)
        .await
        .context("failed to merge resource")?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, scope: &Scope, category: &str, id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM resource
            WHERE project = $1 AND environment = $2 AND category = $3 AND id = $4
            "#,
        )
        .bind(&scope.project)
        .bind(&scope.environment)
        .bind(category)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("failed to delete resource")?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_project(&self, project: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM resource WHERE project = $1")
            .bind(project)
            .execute(&self.pool)
            .await
            .context("failed to delete project resources")?;

        Ok(result.rows_affected())
    }

    async fn healthy(&self) -> bool {
        crate::db::check_health(&self.pool).await
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

impl std::fmt::Debug for PgResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgResourceStore").finish()
    }
}
