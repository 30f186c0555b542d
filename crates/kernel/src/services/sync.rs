//! Sync with a remote HashBrown instance.
//!
//! Each project environment may point at a remote server. Resources are
//! pulled from and pushed to the same category/id on the remote side.

use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::project::ProjectService;
use super::{ServiceError, ServiceResult};
use crate::store::Scope;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Resolved remote endpoint for one scope.
#[derive(Debug, Clone)]
struct Remote {
    base: Url,
    token: Option<String>,
    project: String,
    environment: String,
}

impl Remote {
    fn item_url(&self, category: &str, id: &str) -> ServiceResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ServiceError::invalid(format!("sync url \"{}\" cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(["api", self.project.as_str(), self.environment.as_str(), category, id]);
        Ok(url)
    }
}

/// Sync service.
#[derive(Clone)]
pub struct SyncService {
    projects: ProjectService,
    client: reqwest::Client,
}

impl SyncService {
    pub fn new(projects: ProjectService) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self { projects, client }
    }

    async fn remote(&self, scope: &Scope) -> ServiceResult<Remote> {
        let settings = self.projects.get_sync_settings(scope).await?;
        if !settings.enabled {
            return Err(ServiceError::invalid(format!("sync is not enabled for {scope}")));
        }

        let raw = settings.url.unwrap_or_default();
        let base = Url::parse(&raw)
            .map_err(|e| ServiceError::invalid(format!("invalid sync url \"{raw}\": {e}")))?;

        Ok(Remote {
            base,
            token: settings.token.filter(|t| !t.is_empty()),
            project: settings.project.unwrap_or_else(|| scope.project.clone()),
            environment: settings
                .environment
                .unwrap_or_else(|| scope.environment.clone()),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder, remote: &Remote) -> reqwest::RequestBuilder {
        match &remote.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Fetch one resource from the remote instance.
    pub async fn get_resource_item(
        &self,
        scope: &Scope,
        category: &str,
        id: &str,
    ) -> ServiceResult<Value> {
        let remote = self.remote(scope).await?;
        let url = self.item_url_checked(&remote, category, id)?;
        debug!(%scope, %url, "pulling remote resource");

        let response = self
            .authorize(self.client.get(url.clone()), &remote)
            .send()
            .await
            .with_context(|| format!("sync request to {url} failed"))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::not_found(category_kind(category), id));
        }
        if !status.is_success() {
            return Err(anyhow::anyhow!("remote {url} answered {status}").into());
        }

        let item = response
            .json::<Value>()
            .await
            .with_context(|| format!("remote {url} returned invalid JSON"))?;
        Ok(item)
    }

    /// Send one local resource to the remote instance, creating it there if
    /// needed.
    pub async fn set_resource_item(
        &self,
        scope: &Scope,
        category: &str,
        id: &str,
        item: &Value,
    ) -> ServiceResult<()> {
        let remote = self.remote(scope).await?;
        let mut url = self.item_url_checked(&remote, category, id)?;
        url.query_pairs_mut().append_pair("create", "true");

        let response = self
            .authorize(self.client.post(url.clone()), &remote)
            .json(item)
            .send()
            .await
            .with_context(|| format!("sync request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("remote {url} answered {status}").into());
        }

        info!(%scope, category, id, remote = %remote.base, "resource pushed");
        Ok(())
    }

    fn item_url_checked(&self, remote: &Remote, category: &str, id: &str) -> ServiceResult<Url> {
        crate::connection::path_component_check("category", category)?;
        crate::connection::path_component_check("id", id)?;
        remote.item_url(category, id)
    }
}

fn category_kind(category: &str) -> &'static str {
    match category {
        crate::store::category::CONTENT => "content",
        crate::store::category::SCHEMAS => "schema",
        crate::store::category::CONNECTIONS => "connection",
        _ => "resource",
    }
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService").finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::SyncSettings;
    use crate::store::{MemoryResourceStore, ResourceStore, category};
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    async fn remote_server() -> String {
        async fn item(
            Path((project, env, category, id)): Path<(String, String, String, String)>,
            headers: HeaderMap,
        ) -> Result<Json<Value>, StatusCode> {
            if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer t0k") {
                return Err(StatusCode::UNAUTHORIZED);
            }
            if id == "missing" {
                return Err(StatusCode::NOT_FOUND);
            }
            Ok(Json(json!({ "id": id, "from": format!("{project}/{env}/{category}") })))
        }

        async fn store(
            Query(query): Query<HashMap<String, String>>,
            Json(body): Json<Value>,
        ) -> StatusCode {
            if query.get("create").map(String::as_str) == Some("true") && body["id"] == "abc" {
                StatusCode::OK
            } else {
                StatusCode::BAD_REQUEST
            }
        }

        let app = Router::new().route(
            "/api/{project}/{env}/{category}/{id}",
            get(item).post(store),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn service(settings: SyncSettings) -> (SyncService, Scope) {
        let store: Arc<dyn ResourceStore> = Arc::new(MemoryResourceStore::new());
        let projects = ProjectService::new(store);
        projects.create(Some("demo"), "Demo").await.unwrap();
        let scope = Scope::new("demo", "live");
        projects.set_sync_settings(&scope, settings).await.unwrap();
        (SyncService::new(projects), scope)
    }

    #[tokio::test]
    async fn disabled_sync_is_invalid() {
        let (sync, scope) = service(SyncSettings::default()).await;
        assert!(matches!(
            sync.get_resource_item(&scope, category::CONTENT, "abc").await,
            Err(ServiceError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn pulls_and_pushes_against_remote() {
        let base = remote_server().await;
        let (sync, scope) = service(SyncSettings {
            enabled: true,
            url: Some(base),
            token: Some("t0k".into()),
            project: Some("remote".into()),
            environment: None,
        })
        .await;

        let item = sync
            .get_resource_item(&scope, category::CONTENT, "abc")
            .await
            .unwrap();
        assert_eq!(item["from"], json!("remote/live/content"));

        assert!(matches!(
            sync.get_resource_item(&scope, category::CONTENT, "missing").await,
            Err(ServiceError::NotFound { .. })
        ));

        sync.set_resource_item(&scope, category::CONTENT, "abc", &json!({ "id": "abc" }))
            .await
            .unwrap();
        assert!(sync
            .set_resource_item(&scope, category::CONTENT, "abc", &json!({ "id": "other" }))
            .await
            .is_err());
    }

    #[test]
    fn item_url_appends_segments() {
        let remote = Remote {
            base: Url::parse("https://cms.example.com/base/").unwrap(),
            token: None,
            project: "p".into(),
            environment: "live".into(),
        };
        assert_eq!(
            remote.item_url("content", "abc").unwrap().as_str(),
            "https://cms.example.com/base/api/p/live/content/abc"
        );
    }
}
