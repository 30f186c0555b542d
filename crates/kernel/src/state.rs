//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::connection::{DeployerContext, StrategyRegistry};
use crate::db;
use crate::services::{
    ConnectionService, ContentService, EditLeaseService, ProjectService, SchemaService,
    SyncService, UserService,
};
use crate::store::{MemoryResourceStore, PgResourceStore, ResourceStore};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Resource documents (PostgreSQL or in-memory).
    store: Arc<dyn ResourceStore>,

    /// Processor and deployer factories, fixed at startup.
    registry: StrategyRegistry,

    config: Config,

    projects: ProjectService,
    schemas: SchemaService,
    content: ContentService,
    connections: ConnectionService,
    leases: EditLeaseService,
    users: UserService,
    sync: SyncService,
}

impl AppState {
    /// Create application state from configuration.
    ///
    /// Connects to PostgreSQL when `DATABASE_URL` is set and keeps resources
    /// in memory otherwise. Installs the bootstrap admin token if configured.
    pub async fn new(config: &Config) -> Result<Self> {
        let store: Arc<dyn ResourceStore> = match &config.database_url {
            Some(url) => {
                let pool = db::create_pool(url, config.database_max_connections)
                    .await
                    .context("failed to create database pool")?;
                db::ensure_schema(&pool)
                    .await
                    .context("failed to prepare database schema")?;
                info!("PostgreSQL resource store ready");
                Arc::new(PgResourceStore::new(pool))
            }
            None => {
                warn!("DATABASE_URL not set; resources are kept in memory and lost on restart");
                Arc::new(MemoryResourceStore::new())
            }
        };

        let registry =
            StrategyRegistry::with_defaults(DeployerContext::new(config.storage_dir.clone()));
        let state = Self::with_store(store, registry, config.clone());

        if let Some(token) = &config.admin_token {
            state
                .users()
                .ensure_admin_token(token)
                .await
                .context("failed to install bootstrap admin token")?;
        }

        Ok(state)
    }

    /// Assemble state around an existing store and registry.
    pub fn with_store(
        store: Arc<dyn ResourceStore>,
        registry: StrategyRegistry,
        config: Config,
    ) -> Self {
        let projects = ProjectService::new(store.clone());
        let schemas = SchemaService::new(store.clone());
        let leases = EditLeaseService::new(store.clone());
        let content = ContentService::new(
            store.clone(),
            projects.clone(),
            schemas.clone(),
            leases.clone(),
        );
        let connections = ConnectionService::new(store.clone(), registry.clone(), projects.clone());
        let users = UserService::new(store.clone());
        let sync = SyncService::new(projects.clone());

        Self {
            inner: Arc::new(AppStateInner {
                store,
                registry,
                config,
                projects,
                schemas,
                content,
                connections,
                leases,
                users,
                sync,
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.inner.store
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn projects(&self) -> &ProjectService {
        &self.inner.projects
    }

    pub fn schemas(&self) -> &SchemaService {
        &self.inner.schemas
    }

    pub fn content(&self) -> &ContentService {
        &self.inner.content
    }

    pub fn connections(&self) -> &ConnectionService {
        &self.inner.connections
    }

    pub fn leases(&self) -> &EditLeaseService {
        &self.inner.leases
    }

    pub fn users(&self) -> &UserService {
        &self.inner.users
    }

    pub fn sync(&self) -> &SyncService {
        &self.inner.sync
    }

    /// Check if the resource store is reachable.
    pub async fn store_healthy(&self) -> bool {
        self.inner.store.healthy().await
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.inner.store.backend())
            .field("registry", &self.inner.registry)
            .finish()
    }
}
