//! Connection service.
//!
//! Stores connection records, turns them into live [`Connection`]s through
//! the strategy registry, and fans publish requests out over connections.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::project::ProjectService;
use super::{ServiceError, ServiceResult};
use crate::connection::{
    Connection, ConnectionRecord, LanguageSource, StrategyRegistry, path_component_check,
};
use crate::models::Content;
use crate::store::{self, ResourceStore, Scope, category};

/// Options for [`ConnectionService::save`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    /// Also make this connection the environment's media provider.
    pub is_media_provider: bool,
}

/// Outcome of publishing through one connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    pub connection_id: String,
    pub languages: Vec<String>,
}

/// Connection service.
#[derive(Clone)]
pub struct ConnectionService {
    store: Arc<dyn ResourceStore>,
    registry: StrategyRegistry,
    projects: ProjectService,
}

impl ConnectionService {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        registry: StrategyRegistry,
        projects: ProjectService,
    ) -> Self {
        Self {
            store,
            registry,
            projects,
        }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub async fn list(&self, scope: &Scope) -> ServiceResult<Vec<ConnectionRecord>> {
        Ok(store::load_all(&*self.store, scope, category::CONNECTIONS).await?)
    }

    pub async fn get(&self, scope: &Scope, id: &str) -> ServiceResult<ConnectionRecord> {
        store::load(&*self.store, scope, category::CONNECTIONS, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("connection", id))
    }

    /// A live connection with its strategies instantiated.
    pub async fn connection(&self, scope: &Scope, id: &str) -> ServiceResult<Connection> {
        let record = self.get(scope, id).await?;
        Ok(Connection::adopt(record, scope.clone(), &self.registry))
    }

    /// Create an empty connection with a fresh id.
    pub async fn create(&self, scope: &Scope, user: &str) -> ServiceResult<ConnectionRecord> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let now = Utc::now();

        let mut record = ConnectionRecord::new(&id, "New connection");
        record.created_by = Some(user.to_string());
        record.created_on = Some(now);
        record.updated_by = Some(user.to_string());
        record.updated_on = Some(now);

        store::save(&*self.store, scope, category::CONNECTIONS, &id, &record).await?;
        info!(%scope, connection = %id, "connection created");
        Ok(record)
    }

    /// Validate and store a connection record.
    ///
    /// Strategy aliases that are set must be registered and their settings
    /// must build. With `options.is_media_provider` the connection also
    /// becomes the environment's media provider.
    pub async fn save(
        &self,
        scope: &Scope,
        id: &str,
        mut record: ConnectionRecord,
        user: &str,
        options: SaveOptions,
    ) -> ServiceResult<ConnectionRecord> {
        if id.is_empty() {
            return Err(ServiceError::invalid("connection id must not be empty"));
        }
        path_component_check("id", id)?;

        if !record.processor.is_empty() {
            self.registry.processor(&record.processor)?;
        }
        if !record.deployer.is_empty() {
            self.registry.deployer(&record.deployer)?;
        }

        let existing: Option<ConnectionRecord> =
            store::load(&*self.store, scope, category::CONNECTIONS, id).await?;
        let now = Utc::now();
        record.id = id.to_string();
        match existing {
            Some(old) => {
                record.created_by = old.created_by;
                record.created_on = old.created_on;
            }
            None => {
                record.created_by = Some(user.to_string());
                record.created_on = Some(now);
            }
        }
        record.updated_by = Some(user.to_string());
        record.updated_on = Some(now);

        store::save(&*self.store, scope, category::CONNECTIONS, id, &record).await?;

        if options.is_media_provider {
            self.projects.set_media_provider(scope, Some(id)).await?;
        }

        info!(%scope, connection = %id, media_provider = options.is_media_provider, "connection saved");
        Ok(record)
    }

    /// Remove a connection, clearing it as media provider if it was one.
    pub async fn remove(&self, scope: &Scope, id: &str) -> ServiceResult<()> {
        if !self.store.delete(scope, category::CONNECTIONS, id).await? {
            return Err(ServiceError::not_found("connection", id));
        }

        if self.projects.get_media_provider(scope).await?.as_deref() == Some(id) {
            self.projects.set_media_provider(scope, None).await?;
        }

        info!(%scope, connection = %id, "connection removed");
        Ok(())
    }

    /// The connection storing media for the environment.
    pub async fn media_provider(&self, scope: &Scope) -> ServiceResult<Connection> {
        let id = self
            .projects
            .get_media_provider(scope)
            .await?
            .ok_or_else(|| ServiceError::not_found("media provider", scope.to_string()))?;
        self.connection(scope, &id).await
    }

    async fn targets(
        &self,
        scope: &Scope,
        connection_id: Option<&str>,
    ) -> ServiceResult<Vec<Connection>> {
        match connection_id.filter(|id| !id.is_empty()) {
            Some(id) => Ok(vec![self.connection(scope, id).await?]),
            None => {
                let records = self.list(scope).await?;
                if records.is_empty() {
                    return Err(ServiceError::invalid(format!(
                        "no connections configured in {scope}"
                    )));
                }
                Ok(records
                    .into_iter()
                    .map(|record| Connection::adopt(record, scope.clone(), &self.registry))
                    .collect())
            }
        }
    }

    /// Publish `content` through one connection, or through all of them.
    ///
    /// Connections are handled in order; the first failure stops the run.
    /// An environment without connections is an invalid request.
    pub async fn publish(
        &self,
        scope: &Scope,
        content: &Content,
        connection_id: Option<&str>,
    ) -> ServiceResult<Vec<PublishReport>> {
        let languages: &dyn LanguageSource = &self.projects;
        let mut reports = Vec::new();

        for connection in self.targets(scope, connection_id).await? {
            let published = connection.publish_content(content, languages).await?;
            reports.push(PublishReport {
                connection_id: connection.id().to_string(),
                languages: published,
            });
        }
        Ok(reports)
    }

    /// Unpublish `content` from one connection, or from all of them.
    pub async fn unpublish(
        &self,
        scope: &Scope,
        content: &Content,
        connection_id: Option<&str>,
    ) -> ServiceResult<Vec<PublishReport>> {
        let languages: &dyn LanguageSource = &self.projects;
        let mut reports = Vec::new();

        for connection in self.targets(scope, connection_id).await? {
            let removed = connection.unpublish_content(content, languages).await?;
            reports.push(PublishReport {
                connection_id: connection.id().to_string(),
                languages: removed,
            });
        }
        Ok(reports)
    }
}

impl std::fmt::Debug for ConnectionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionService")
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::connection::{DeployerContext, StrategySettings};
    use crate::store::MemoryResourceStore;
    use serde_json::json;

    struct Fixture {
        connections: ConnectionService,
        projects: ProjectService,
        registry: StrategyRegistry,
        scope: Scope,
    }

    async fn fixture() -> Fixture {
        let store: Arc<dyn ResourceStore> = Arc::new(MemoryResourceStore::new());
        let projects = ProjectService::new(store.clone());
        let registry = StrategyRegistry::with_defaults(DeployerContext::new("/tmp"));
        projects.create(Some("demo"), "Demo").await.unwrap();
        projects
            .set_languages("demo", &["en".to_string(), "nl".to_string()])
            .await
            .unwrap();

        Fixture {
            connections: ConnectionService::new(store, registry.clone(), projects.clone()),
            projects,
            registry,
            scope: Scope::new("demo", "live"),
        }
    }

    fn memory_record(volume: &str) -> ConnectionRecord {
        serde_json::from_value(json!({
            "id": "",
            "title": "Preview",
            "processor": { "alias": "json" },
            "deployer": { "alias": "memory", "volume": volume }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn save_validates_aliases() {
        let f = fixture().await;
        let mut record = memory_record("v");
        record.processor = StrategySettings::new("nope");

        let err = f
            .connections
            .save(&f.scope, "c1", record, "u", SaveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Connection(e) if e.is_validation()));
    }

    #[tokio::test]
    async fn media_provider_follows_save_and_remove() {
        let f = fixture().await;
        f.connections
            .save(
                &f.scope,
                "c1",
                memory_record("media"),
                "u",
                SaveOptions {
                    is_media_provider: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(
            f.projects.get_media_provider(&f.scope).await.unwrap().as_deref(),
            Some("c1")
        );
        assert_eq!(f.connections.media_provider(&f.scope).await.unwrap().id(), "c1");

        f.connections.remove(&f.scope, "c1").await.unwrap();
        assert_eq!(f.projects.get_media_provider(&f.scope).await.unwrap(), None);
        assert!(matches!(
            f.connections.media_provider(&f.scope).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn publish_fans_out_over_connections() {
        let f = fixture().await;
        for (id, volume) in [("a", "site-a"), ("b", "site-b")] {
            f.connections
                .save(&f.scope, id, memory_record(volume), "u", SaveOptions::default())
                .await
                .unwrap();
        }
        let content = Content::new("abc", "page").with_property("title", json!("x"));

        let reports = f.connections.publish(&f.scope, &content, None).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].languages, vec!["en", "nl"]);

        let volumes = &f.registry.context().memory;
        assert_eq!(
            volumes.paths("site-a"),
            vec!["content/en/abc.json", "content/nl/abc.json"]
        );
        assert_eq!(volumes.paths("site-b").len(), 2);

        f.connections
            .unpublish(&f.scope, &content, Some("b"))
            .await
            .unwrap();
        assert!(volumes.paths("site-b").is_empty());
        assert_eq!(volumes.paths("site-a").len(), 2);
    }

    #[tokio::test]
    async fn create_then_get() {
        let f = fixture().await;
        let created = f.connections.create(&f.scope, "u").await.unwrap();
        let loaded = f.connections.get(&f.scope, &created.id).await.unwrap();
        assert_eq!(loaded.title, "New connection");
        assert_eq!(f.connections.list(&f.scope).await.unwrap().len(), 1);
    }
}
