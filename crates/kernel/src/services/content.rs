//! Content service.
//!
//! CRUD over the content tree plus the tree operations the editor needs:
//! inserting a node at a position, removing a subtree, and walking ancestors.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::edit_lease::{EditLease, EditLeaseService};
use super::project::ProjectService;
use super::schema::SchemaService;
use super::{ServiceError, ServiceResult};
use crate::connection::path_component_check;
use crate::models::Content;
use crate::models::content::{SORT_INDEX_GAP, next_sort_index};
use crate::models::Schema;
use crate::store::{self, ResourceStore, Scope, category};

/// Content service.
#[derive(Clone)]
pub struct ContentService {
    store: Arc<dyn ResourceStore>,
    projects: ProjectService,
    schemas: SchemaService,
    leases: EditLeaseService,
}

impl ContentService {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        projects: ProjectService,
        schemas: SchemaService,
        leases: EditLeaseService,
    ) -> Self {
        Self {
            store,
            projects,
            schemas,
            leases,
        }
    }

    /// All content in the environment, ordered by sort index.
    pub async fn get_all(&self, scope: &Scope) -> ServiceResult<Vec<Content>> {
        let mut all: Vec<Content> = store::load_all(&*self.store, scope, category::CONTENT).await?;
        all.sort_by(|a, b| a.sort.cmp(&b.sort).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    pub async fn find(&self, scope: &Scope, id: &str) -> ServiceResult<Option<Content>> {
        Ok(store::load(&*self.store, scope, category::CONTENT, id).await?)
    }

    pub async fn get_by_id(&self, scope: &Scope, id: &str) -> ServiceResult<Content> {
        self.find(scope, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("content", id))
    }

    async fn save(&self, scope: &Scope, content: &Content) -> ServiceResult<()> {
        store::save(&*self.store, scope, category::CONTENT, &content.id, content).await?;
        Ok(())
    }

    async fn default_language(&self, scope: &Scope) -> ServiceResult<String> {
        Ok(self
            .projects
            .get(&scope.project)
            .await?
            .default_language()
            .to_string())
    }

    /// Create a node under `parent_id`, appended after its siblings.
    pub async fn create(
        &self,
        scope: &Scope,
        schema_id: &str,
        parent_id: Option<&str>,
        user: &str,
        properties: Map<String, Value>,
    ) -> ServiceResult<Content> {
        if schema_id.is_empty() {
            return Err(ServiceError::invalid("schemaId is required"));
        }
        let schema = self.schemas.get_resolved(scope, schema_id).await?;

        let parent_id = parent_id.filter(|p| !p.is_empty());
        if let Some(parent_id) = parent_id {
            self.get_by_id(scope, parent_id).await?;
        }

        let all = self.get_all(scope).await?;
        let sort = next_sort_index(all.iter().filter(|c| c.is_child_of(parent_id)));

        let language = self.default_language(scope).await?;
        let now = Utc::now();

        let mut content = Content::new(uuid::Uuid::new_v4().simple().to_string(), schema_id);
        content.parent_id = parent_id.map(str::to_string);
        content.sort = sort;
        content.properties = sanitize_properties(properties, &schema, &language);
        content.created_by = Some(user.to_string());
        content.created_on = Some(now);
        content.updated_by = Some(user.to_string());
        content.updated_on = Some(now);

        self.save(scope, &content).await?;
        info!(%scope, content = %content.id, schema = %schema_id, "content created");
        Ok(content)
    }

    /// Store `content` under `id`. Unless `create` is set the node must exist.
    pub async fn set_by_id(
        &self,
        scope: &Scope,
        id: &str,
        mut content: Content,
        user: &str,
        create: bool,
    ) -> ServiceResult<Content> {
        if id.is_empty() {
            return Err(ServiceError::invalid("content id must not be empty"));
        }
        path_component_check("id", id)?;

        let existing = self.find(scope, id).await?;
        if existing.is_none() && !create {
            return Err(ServiceError::not_found("content", id));
        }
        if content.parent_id.as_deref() == Some(id) {
            return Err(ServiceError::invalid("content cannot be its own parent"));
        }

        let language = self.default_language(scope).await?;
        match self.schemas.get_resolved(scope, &content.schema_id).await {
            Ok(schema) => {
                content.properties =
                    sanitize_properties(std::mem::take(&mut content.properties), &schema, &language);
            }
            Err(ServiceError::NotFound { .. }) => {
                warn!(%scope, content = %id, schema = %content.schema_id, "schema missing, storing properties unchecked");
            }
            Err(e) => return Err(e),
        }

        let now = Utc::now();
        content.id = id.to_string();
        match &existing {
            Some(old) => {
                content.created_by = old.created_by.clone();
                content.created_on = old.created_on;
            }
            None => {
                content.created_by = content.created_by.or_else(|| Some(user.to_string()));
                content.created_on = content.created_on.or(Some(now));
            }
        }
        content.updated_by = Some(user.to_string());
        content.updated_on = Some(now);

        self.save(scope, &content).await?;
        info!(%scope, content = %id, created = existing.is_none(), "content saved");
        Ok(content)
    }

    /// Move a node under `parent_id` at `position` among its new siblings.
    ///
    /// Sibling sort indices are renumbered with the usual gap.
    pub async fn insert(
        &self,
        scope: &Scope,
        user: &str,
        content_id: &str,
        parent_id: Option<&str>,
        position: usize,
    ) -> ServiceResult<Content> {
        let mut content = self.get_by_id(scope, content_id).await?;
        let parent_id = parent_id.filter(|p| !p.is_empty());

        if let Some(parent_id) = parent_id {
            let lineage = self.get_ancestors(scope, parent_id, true).await?;
            if lineage.iter().any(|c| c.id == content_id) {
                return Err(ServiceError::invalid(format!(
                    "content \"{content_id}\" cannot be moved below itself"
                )));
            }
        }

        let mut siblings: Vec<Content> = self
            .get_all(scope)
            .await?
            .into_iter()
            .filter(|c| c.id != content_id && c.is_child_of(parent_id))
            .collect();

        content.parent_id = parent_id.map(str::to_string);
        content.updated_by = Some(user.to_string());
        content.updated_on = Some(Utc::now());
        siblings.insert(position.min(siblings.len()), content);

        for (index, sibling) in siblings.iter_mut().enumerate() {
            let sort = (index as i64 + 1) * SORT_INDEX_GAP;
            let moved = sibling.id == content_id;
            if sibling.sort != sort || moved {
                sibling.sort = sort;
                self.save(scope, sibling).await?;
            }
        }

        info!(%scope, content = %content_id, parent = ?parent_id, position, "content inserted");
        siblings
            .into_iter()
            .find(|c| c.id == content_id)
            .ok_or_else(|| ServiceError::not_found("content", content_id))
    }

    /// Remove a node. Returns the ids removed.
    ///
    /// With `remove_children` the whole subtree goes; otherwise the direct
    /// children move up to the removed node's parent.
    pub async fn remove_by_id(
        &self,
        scope: &Scope,
        id: &str,
        remove_children: bool,
    ) -> ServiceResult<Vec<String>> {
        let target = self.get_by_id(scope, id).await?;
        let all = self.get_all(scope).await?;
        let mut removed = Vec::new();

        if remove_children {
            let mut queue = VecDeque::from([id.to_string()]);
            let mut seen = HashSet::new();
            while let Some(current) = queue.pop_front() {
                if !seen.insert(current.clone()) {
                    continue;
                }
                for child in all.iter().filter(|c| c.is_child_of(Some(current.as_str()))) {
                    queue.push_back(child.id.clone());
                }
                removed.push(current);
            }
        } else {
            for child in all.iter().filter(|c| c.is_child_of(Some(id))) {
                let mut child = child.clone();
                child.parent_id = target.parent_id.clone();
                self.save(scope, &child).await?;
            }
            removed.push(id.to_string());
        }

        for removed_id in &removed {
            self.store.delete(scope, category::CONTENT, removed_id).await?;
        }

        info!(%scope, content = %id, removed = removed.len(), remove_children, "content removed");
        Ok(removed)
    }

    /// Ancestor chain of `id`, root first.
    pub async fn get_ancestors(
        &self,
        scope: &Scope,
        id: &str,
        include_self: bool,
    ) -> ServiceResult<Vec<Content>> {
        let start = self.get_by_id(scope, id).await?;
        let mut chain = Vec::new();
        let mut seen = HashSet::from([start.id.clone()]);
        let mut next = start.parent_id.clone().filter(|p| !p.is_empty());

        if include_self {
            chain.push(start);
        }

        while let Some(parent_id) = next.take() {
            if !seen.insert(parent_id.clone()) {
                warn!(%scope, content = %id, "content tree has a cycle");
                break;
            }
            let Some(parent) = self.find(scope, &parent_id).await? else {
                break;
            };
            next = parent.parent_id.clone().filter(|p| !p.is_empty());
            chain.push(parent);
        }

        chain.reverse();
        Ok(chain)
    }

    /// Flag a node as published or not.
    pub async fn set_published(
        &self,
        scope: &Scope,
        id: &str,
        published: bool,
    ) -> ServiceResult<Content> {
        let mut content = self.get_by_id(scope, id).await?;
        if content.is_published != published {
            content.is_published = published;
            self.save(scope, &content).await?;
        }
        Ok(content)
    }

    /// Refresh the advisory edit lease on a node.
    pub async fn heartbeat(&self, scope: &Scope, id: &str, user: &str) -> ServiceResult<EditLease> {
        self.leases.heartbeat(scope, category::CONTENT, id, user).await
    }

    /// Lease held by another editor, if any.
    pub async fn lease(&self, scope: &Scope, id: &str, user: &str) -> ServiceResult<Option<EditLease>> {
        self.leases
            .held_by_other(scope, category::CONTENT, id, user)
            .await
    }
}

/// Apply each field's multilingual setting to the matching property.
pub fn sanitize_properties(
    properties: Map<String, Value>,
    schema: &Schema,
    language: &str,
) -> Map<String, Value> {
    properties
        .into_iter()
        .map(|(name, value)| match schema.fields.get(&name) {
            Some(field) => {
                let value = field.sanitize(value, language);
                (name, value)
            }
            None => (name, value),
        })
        .collect()
}

impl std::fmt::Debug for ContentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentService").finish()
    }
}
