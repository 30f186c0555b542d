#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Every test builds its own [`TestApp`] around the REAL kernel router with
//! an in-memory resource store, so tests are isolated and need no database.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use hashbrown_kernel::connection::deployer::MemoryVolumes;
use hashbrown_kernel::connection::{DeployerContext, StrategyRegistry};
use hashbrown_kernel::{AppState, Config, MemoryResourceStore, build_router};

/// Bootstrap admin token installed in every test app.
pub const ADMIN_TOKEN: &str = "test-admin-token";

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    /// Storage dir for filesystem deployers; removed on drop.
    pub storage: tempfile::TempDir,
}

impl TestApp {
    /// Create a new test application with an empty in-memory store.
    pub async fn new() -> Self {
        let storage = tempfile::tempdir().expect("Failed to create storage dir");
        let config = Config::in_memory(storage.path());
        let registry = StrategyRegistry::with_defaults(DeployerContext::new(storage.path()));
        let state = AppState::with_store(Arc::new(MemoryResourceStore::new()), registry, config);

        state
            .users()
            .ensure_admin_token(ADMIN_TOKEN)
            .await
            .expect("Failed to install admin token");

        Self {
            router: build_router(state.clone()),
            state,
            storage,
        }
    }

    /// Create a test app with project `demo` (languages `en`, `nl`) and the
    /// `page` schema.
    pub async fn with_demo_project() -> Self {
        let app = Self::new().await;
        let (status, _) = app
            .post("/api/projects/new", serde_json::json!({ "id": "demo", "name": "Demo" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = app
            .post("/api/projects/demo/languages", serde_json::json!(["en", "nl"]))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .post(
                "/api/demo/live/schemas/page",
                hashbrown_test_utils::schemas::page_schema(),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        app
    }

    /// In-memory deployer volumes shared by every `memory` connection.
    pub fn volumes(&self) -> &MemoryVolumes {
        &self.state.registry().context().memory
    }

    /// Send a request with an explicit token (or none).
    pub async fn request_as(
        &self,
        token: Option<&str>,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();

        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    /// Send a request as the bootstrap admin.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.request_as(Some(ADMIN_TOKEN), method, uri, body).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn post_empty(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::POST, uri, None).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, None).await
    }

    /// Create a user through the API and return its token.
    pub async fn create_user(&self, username: &str, is_admin: bool) -> String {
        let (status, body) = self
            .post(
                "/api/users/new",
                serde_json::json!({ "username": username, "isAdmin": is_admin }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Save a connection under `id` and return the stored record.
    pub async fn save_connection(&self, id: &str, record: Value, media_provider: bool) -> Value {
        let uri = if media_provider {
            format!("/api/demo/live/connections/{id}?isMediaProvider=true")
        } else {
            format!("/api/demo/live/connections/{id}")
        };
        let (status, body) = self.post(&uri, record).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }

    /// Bind the router to a local port and serve it in the background.
    ///
    /// Returns the base URL.
    pub async fn spawn_server(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }
}
