//! In-memory resource store.
//!
//! Used when no database is configured and by the test suite. Contents are
//! lost on restart.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::{ResourceStore, Scope};

type Key = (String, String, String, String);

/// Process-local document map.
#[derive(Default)]
pub struct MemoryResourceStore {
    documents: RwLock<BTreeMap<Key, Value>>,
}

impl MemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(scope: &Scope, category: &str, id: &str) -> Key {
        (
            scope.project.clone(),
            scope.environment.clone(),
            category.to_string(),
            id.to_string(),
        )
    }

    /// Number of stored documents across all scopes.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl ResourceStore for MemoryResourceStore {
    async fn find(&self, scope: &Scope, category: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .documents
            .read()
            .get(&Self::key(scope, category, id))
            .cloned())
    }

    async fn list(&self, scope: &Scope, category: &str) -> Result<Vec<Value>> {
        let docs = self.documents.read();
        Ok(docs
            .iter()
            .filter(|((p, e, c, _), _)| {
                p == &scope.project && e == &scope.environment && c == category
            })
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn upsert(
        &self,
        scope: &Scope,
        category: &str,
        id: &str,
        document: &Value,
    ) -> Result<()> {
        self.documents
            .write()
            .insert(Self::key(scope, category, id), document.clone());
        Ok(())
    }

    async fn merge(
        &self,
        scope: &Scope,
        category: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<bool> {
        let mut docs = self.documents.write();
        let Some(document) = docs.get_mut(&Self::key(scope, category, id)) else {
            return Ok(false);
        };
        match document.as_object_mut() {
            Some(existing) => existing.extend(fields.clone()),
            None => *document = Value::Object(fields.clone()),
        }
        Ok(true)
    }

    async fn delete(&self, scope: &Scope, category: &str, id: &str) -> Result<bool> {
        Ok(self
            .documents
            .write()
            .remove(&Self::key(scope, category, id))
            .is_some())
    }

    async fn delete_project(&self, project: &str) -> Result<u64> {
        let mut docs = self.documents.write();
        let before = docs.len();
        docs.retain(|(p, _, _, _), _| p != project);
        Ok((before - docs.len()) as u64)
    }

    async fn healthy(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryResourceStore")
            .field("documents", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn scopes_are_isolated() {
        let store = MemoryResourceStore::new();
        let live = Scope::new("p", "live");
        let staging = Scope::new("p", "staging");

        store
            .upsert(&live, "content", "a", &json!({ "id": "a" }))
            .await
            .unwrap();

        assert!(store.find(&live, "content", "a").await.unwrap().is_some());
        assert!(store.find(&staging, "content", "a").await.unwrap().is_none());
        assert!(store.list(&staging, "content").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_is_ordered_by_id() {
        let store = MemoryResourceStore::new();
        let scope = Scope::new("p", "live");
        for id in ["c", "a", "b"] {
            store
                .upsert(&scope, "content", id, &json!({ "id": id }))
                .await
                .unwrap();
        }
        let ids: Vec<_> = store
            .list(&scope, "content")
            .await
            .unwrap()
            .into_iter()
            .map(|v| v["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn merge_keeps_unrelated_fields() {
        let store = MemoryResourceStore::new();
        let scope = Scope::new("p", "live");
        store
            .upsert(&scope, "content", "a", &json!({ "id": "a", "title": "One" }))
            .await
            .unwrap();

        let fields = json!({ "viewedBy": "alice" });
        let fields = fields.as_object().unwrap();
        assert!(store.merge(&scope, "content", "a", fields).await.unwrap());
        assert!(!store.merge(&scope, "content", "b", fields).await.unwrap());

        let doc = store.find(&scope, "content", "a").await.unwrap().unwrap();
        assert_eq!(doc, json!({ "id": "a", "title": "One", "viewedBy": "alice" }));
        assert!(store.find(&scope, "content", "b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = MemoryResourceStore::new();
        let scope = Scope::global();
        store.upsert(&scope, "users", "u", &json!({})).await.unwrap();
        assert!(store.delete(&scope, "users", "u").await.unwrap());
        assert!(!store.delete(&scope, "users", "u").await.unwrap());
    }

    #[tokio::test]
    async fn delete_project_spans_environments() {
        let store = MemoryResourceStore::new();
        store
            .upsert(&Scope::new("p", "live"), "content", "a", &json!({}))
            .await
            .unwrap();
        store
            .upsert(&Scope::new("p", "staging"), "content", "b", &json!({}))
            .await
            .unwrap();
        store
            .upsert(&Scope::new("q", "live"), "content", "c", &json!({}))
            .await
            .unwrap();

        assert_eq!(store.delete_project("p").await.unwrap(), 2);
        assert_eq!(store.len(), 1);
    }
}
