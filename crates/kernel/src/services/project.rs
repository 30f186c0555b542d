//! Project service.
//!
//! Projects, their languages, and per-environment settings (media provider,
//! sync). Projects live in the global scope of the resource store.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;

use super::{ServiceError, ServiceResult};
use crate::connection::{LanguageSource, path_component_check};
use crate::models::project::normalize_languages;
use crate::models::{Project, SyncSettings};
use crate::store::{self, ResourceStore, Scope, category};

/// Project service.
#[derive(Clone)]
pub struct ProjectService {
    store: Arc<dyn ResourceStore>,
}

impl ProjectService {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// All projects, ordered by id.
    pub async fn list(&self) -> ServiceResult<Vec<Project>> {
        Ok(store::load_all(&*self.store, &Scope::global(), category::PROJECTS).await?)
    }

    pub async fn find(&self, id: &str) -> ServiceResult<Option<Project>> {
        Ok(store::load(&*self.store, &Scope::global(), category::PROJECTS, id).await?)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Project> {
        self.find(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("project", id))
    }

    /// The project behind `scope`, provided the environment exists.
    pub async fn require_scope(&self, scope: &Scope) -> ServiceResult<Project> {
        let project = self.get(&scope.project).await?;
        if project.environment(&scope.environment).is_none() {
            return Err(ServiceError::not_found(
                "environment",
                scope.environment.clone(),
            ));
        }
        Ok(project)
    }

    async fn save(&self, project: &Project) -> ServiceResult<()> {
        store::save(
            &*self.store,
            &Scope::global(),
            category::PROJECTS,
            &project.id,
            project,
        )
        .await?;
        Ok(())
    }

    /// Create a project. The id defaults to a fresh UUID.
    pub async fn create(&self, id: Option<&str>, name: &str) -> ServiceResult<Project> {
        let id = match id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => uuid::Uuid::new_v4().simple().to_string(),
        };
        path_component_check("id", &id)?;

        if self.find(&id).await?.is_some() {
            return Err(ServiceError::Conflict(format!("project \"{id}\" already exists")));
        }

        let name = if name.trim().is_empty() { id.as_str() } else { name.trim() };
        let project = Project::new(&id, name);
        self.save(&project).await?;

        info!(project = %id, "project created");
        Ok(project)
    }

    /// Remove a project and every resource in its environments.
    pub async fn remove(&self, id: &str) -> ServiceResult<()> {
        let existed = self
            .store
            .delete(&Scope::global(), category::PROJECTS, id)
            .await?;
        if !existed {
            return Err(ServiceError::not_found("project", id));
        }

        let removed = self
            .store
            .delete_project(id)
            .await
            .with_context(|| format!("failed to remove resources of project {id}"))?;
        info!(project = %id, resources = removed, "project removed");
        Ok(())
    }

    pub async fn get_languages(&self, id: &str) -> ServiceResult<Vec<String>> {
        Ok(self.get(id).await?.languages)
    }

    /// Replace the language list. Codes are validated and deduplicated.
    pub async fn set_languages(&self, id: &str, languages: &[String]) -> ServiceResult<Vec<String>> {
        let languages =
            normalize_languages(languages).map_err(|e| ServiceError::invalid(e.to_string()))?;

        let mut project = self.get(id).await?;
        project.languages = languages.clone();
        self.save(&project).await?;

        info!(project = %id, languages = ?languages, "languages updated");
        Ok(languages)
    }

    /// Connection id storing media for the environment.
    pub async fn get_media_provider(&self, scope: &Scope) -> ServiceResult<Option<String>> {
        let project = self.require_scope(scope).await?;
        Ok(project
            .environment(&scope.environment)
            .and_then(|env| env.media_provider.clone()))
    }

    /// Record which connection stores media for the environment.
    pub async fn set_media_provider(
        &self,
        scope: &Scope,
        connection_id: Option<&str>,
    ) -> ServiceResult<()> {
        let mut project = self.require_scope(scope).await?;
        project.environment_mut(&scope.environment).media_provider =
            connection_id.map(str::to_string);
        self.save(&project).await?;

        info!(%scope, connection = ?connection_id, "media provider updated");
        Ok(())
    }

    pub async fn get_sync_settings(&self, scope: &Scope) -> ServiceResult<SyncSettings> {
        let project = self.require_scope(scope).await?;
        Ok(project
            .environment(&scope.environment)
            .map(|env| env.sync.clone())
            .unwrap_or_default())
    }

    pub async fn set_sync_settings(
        &self,
        scope: &Scope,
        settings: SyncSettings,
    ) -> ServiceResult<SyncSettings> {
        if settings.enabled {
            let url = settings.url.as_deref().unwrap_or("");
            url::Url::parse(url)
                .map_err(|e| ServiceError::invalid(format!("invalid sync url \"{url}\": {e}")))?;
        }

        let mut project = self.require_scope(scope).await?;
        project.environment_mut(&scope.environment).sync = settings.clone();
        self.save(&project).await?;

        info!(%scope, enabled = settings.enabled, "sync settings updated");
        Ok(settings)
    }
}

#[async_trait]
impl LanguageSource for ProjectService {
    async fn languages(&self, project: &str) -> anyhow::Result<Option<Vec<String>>> {
        let project: Option<Project> =
            store::load(&*self.store, &Scope::global(), category::PROJECTS, project).await?;
        Ok(project.map(|p| p.languages))
    }
}

impl std::fmt::Debug for ProjectService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectService")
            .field("backend", &self.store.backend())
            .finish()
    }
}
