//! Resource storage abstraction.
//!
//! All resources (content, schemas, connections, projects, users) are JSON
//! documents addressed by scope, category, and id. Every read and write goes
//! through [`ResourceStore`], so the PostgreSQL and in-memory backends are
//! interchangeable.
//!
//! ```ignore
//! let content: Option<Content> = store::load(&*store, &scope, category::CONTENT, "abc").await?;
//! ```

mod memory;
mod postgres;

use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use memory::MemoryResourceStore;
pub use postgres::PgResourceStore;

/// Resource category names.
pub mod category {
    pub const CONTENT: &str = "content";
    pub const SCHEMAS: &str = "schemas";
    pub const CONNECTIONS: &str = "connections";
    pub const PROJECTS: &str = "projects";
    pub const USERS: &str = "users";
}

/// Where a resource lives.
///
/// Project-level resources are scoped to a project environment; projects and
/// users themselves live in the global scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub project: String,
    pub environment: String,
}

impl Scope {
    pub fn new(project: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            environment: environment.into(),
        }
    }

    /// Scope for server-wide resources.
    pub fn global() -> Self {
        Self::new("", "")
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.environment)
    }
}

/// Storage backend for resource documents.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Load one document.
    async fn find(&self, scope: &Scope, category: &str, id: &str) -> Result<Option<Value>>;

    /// List all documents of a category, ordered by id.
    async fn list(&self, scope: &Scope, category: &str) -> Result<Vec<Value>>;

    /// Insert or replace a document.
    async fn upsert(&self, scope: &Scope, category: &str, id: &str, document: &Value)
    -> Result<()>;

    /// Overwrite top-level fields of an existing document in place, leaving
    /// its other fields as currently stored. Returns whether it existed.
    async fn merge(
        &self,
        scope: &Scope,
        category: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<bool>;

    /// Delete a document. Returns whether it existed.
    async fn delete(&self, scope: &Scope, category: &str, id: &str) -> Result<bool>;

    /// Delete every document in every environment of a project.
    async fn delete_project(&self, project: &str) -> Result<u64>;

    /// Whether the backend is reachable.
    async fn healthy(&self) -> bool;

    /// Backend name for health output.
    fn backend(&self) -> &'static str;
}

/// Load and deserialize one resource.
pub async fn load<T: DeserializeOwned>(
    store: &dyn ResourceStore,
    scope: &Scope,
    category: &str,
    id: &str,
) -> Result<Option<T>> {
    match store.find(scope, category, id).await? {
        Some(doc) => {
            let typed = serde_json::from_value(doc)
                .with_context(|| format!("malformed {category} document \"{id}\""))?;
            Ok(Some(typed))
        }
        None => Ok(None),
    }
}

/// Load and deserialize every resource of a category.
///
/// Malformed documents are skipped with a warning rather than failing the list.
pub async fn load_all<T: DeserializeOwned>(
    store: &dyn ResourceStore,
    scope: &Scope,
    category: &str,
) -> Result<Vec<T>> {
    let docs = store.list(scope, category).await?;
    let mut items = Vec::with_capacity(docs.len());
    for doc in docs {
        match serde_json::from_value(doc) {
            Ok(item) => items.push(item),
            Err(e) => {
                tracing::warn!(%scope, category, error = %e, "skipping malformed document");
            }
        }
    }
    Ok(items)
}

/// Serialize and store a resource.
pub async fn save<T: Serialize>(
    store: &dyn ResourceStore,
    scope: &Scope,
    category: &str,
    id: &str,
    item: &T,
) -> Result<()> {
    let doc = serde_json::to_value(item)
        .with_context(|| format!("failed to serialize {category} \"{id}\""))?;
    store.upsert(scope, category, id, &doc).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Thing {
        id: String,
        size: u32,
    }

    #[tokio::test]
    async fn typed_round_trip() {
        let store = MemoryResourceStore::new();
        let scope = Scope::new("p", "live");
        let thing = Thing {
            id: "a".to_string(),
            size: 3,
        };

        save(&store, &scope, "things", "a", &thing).await.unwrap();
        let loaded: Option<Thing> = load(&store, &scope, "things", "a").await.unwrap();
        assert_eq!(loaded, Some(thing));
    }

    #[tokio::test]
    async fn load_all_skips_malformed() {
        let store = MemoryResourceStore::new();
        let scope = Scope::new("p", "live");
        store
            .upsert(&scope, "things", "a", &json!({ "id": "a", "size": 1 }))
            .await
            .unwrap();
        store
            .upsert(&scope, "things", "b", &json!({ "id": "b", "size": "big" }))
            .await
            .unwrap();

        let things: Vec<Thing> = load_all(&store, &scope, "things").await.unwrap();
        assert_eq!(things.len(), 1);
        assert_eq!(things[0].id, "a");
    }

    #[tokio::test]
    async fn load_reports_malformed() {
        let store = MemoryResourceStore::new();
        let scope = Scope::global();
        store
            .upsert(&scope, "things", "x", &json!({ "nope": true }))
            .await
            .unwrap();
        let result: Result<Option<Thing>> = load(&store, &scope, "things", "x").await;
        assert!(result.is_err());
    }

    #[test]
    fn scope_display() {
        assert_eq!(Scope::new("demo", "live").to_string(), "demo/live");
    }
}
