//! Schema service.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::{ServiceError, ServiceResult};
use crate::connection::path_component_check;
use crate::models::{Content, Schema};
use crate::store::{self, ResourceStore, Scope, category};

/// Schema service.
#[derive(Clone)]
pub struct SchemaService {
    store: Arc<dyn ResourceStore>,
}

impl SchemaService {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, scope: &Scope) -> ServiceResult<Vec<Schema>> {
        Ok(store::load_all(&*self.store, scope, category::SCHEMAS).await?)
    }

    pub async fn find(&self, scope: &Scope, id: &str) -> ServiceResult<Option<Schema>> {
        Ok(store::load(&*self.store, scope, category::SCHEMAS, id).await?)
    }

    pub async fn get(&self, scope: &Scope, id: &str) -> ServiceResult<Schema> {
        self.find(scope, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("schema", id))
    }

    /// A schema with the fields of all its ancestors merged in.
    ///
    /// Fields declared closer to the schema win over inherited ones.
    pub async fn get_resolved(&self, scope: &Scope, id: &str) -> ServiceResult<Schema> {
        let schema = self.get(scope, id).await?;

        let mut fields = BTreeMap::new();
        let mut seen = HashSet::from([schema.id.clone()]);
        let mut next = schema.parent_schema_id.clone();

        while let Some(parent_id) = next.take() {
            if !seen.insert(parent_id.clone()) {
                return Err(ServiceError::invalid(format!(
                    "schema \"{id}\" has a circular parent chain"
                )));
            }
            let parent = self.get(scope, &parent_id).await?;
            for (name, field) in parent.fields {
                fields.entry(name).or_insert(field);
            }
            next = parent.parent_schema_id;
        }

        let mut resolved = schema;
        for (name, field) in std::mem::take(&mut resolved.fields) {
            fields.insert(name, field);
        }
        resolved.fields = fields;
        Ok(resolved)
    }

    /// Icon of every schema, keyed by id.
    pub async fn icons(&self, scope: &Scope) -> ServiceResult<BTreeMap<String, String>> {
        Ok(self
            .list(scope)
            .await?
            .into_iter()
            .map(|s| {
                let icon = s.icon_or_default().to_string();
                (s.id, icon)
            })
            .collect())
    }

    /// Store a schema under `id`.
    pub async fn set(
        &self,
        scope: &Scope,
        id: &str,
        mut schema: Schema,
        user: &str,
    ) -> ServiceResult<Schema> {
        path_component_check("id", id)?;
        if id.is_empty() {
            return Err(ServiceError::invalid("schema id must not be empty"));
        }
        if schema.parent_schema_id.as_deref() == Some(id) {
            return Err(ServiceError::invalid("a schema cannot extend itself"));
        }
        if let Some(parent_id) = schema.parent_schema_id.as_deref() {
            self.get(scope, parent_id).await?;
        }

        schema.id = id.to_string();
        schema.viewed_by = Some(user.to_string());
        schema.viewed_on = Some(Utc::now());
        store::save(&*self.store, scope, category::SCHEMAS, id, &schema).await?;

        info!(%scope, schema = %id, "schema saved");
        Ok(schema)
    }

    /// Remove a schema no content or child schema depends on.
    pub async fn remove(&self, scope: &Scope, id: &str) -> ServiceResult<()> {
        self.get(scope, id).await?;

        let children = self
            .list(scope)
            .await?
            .into_iter()
            .filter(|s| s.parent_schema_id.as_deref() == Some(id))
            .count();
        if children > 0 {
            return Err(ServiceError::Conflict(format!(
                "schema \"{id}\" is extended by {children} other schema(s)"
            )));
        }

        let content: Vec<Content> = store::load_all(&*self.store, scope, category::CONTENT).await?;
        let users = content.iter().filter(|c| c.schema_id == id).count();
        if users > 0 {
            return Err(ServiceError::Conflict(format!(
                "schema \"{id}\" is used by {users} content node(s)"
            )));
        }

        self.store.delete(scope, category::SCHEMAS, id).await?;
        info!(%scope, schema = %id, "schema removed");
        Ok(())
    }
}

impl std::fmt::Debug for SchemaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaService").finish()
    }
}
