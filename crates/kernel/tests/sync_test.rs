#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Sync between two live instances.

mod common;

use axum::http::StatusCode;
use common::{ADMIN_TOKEN, TestApp};
use hashbrown_test_utils::test_content;
use serde_json::json;

/// A local app whose `demo/live` environment syncs with a served remote.
async fn linked_pair() -> (TestApp, TestApp) {
    let remote = TestApp::with_demo_project().await;
    let url = remote.spawn_server().await;

    let local = TestApp::with_demo_project().await;
    let (status, settings) = local
        .post(
            "/api/demo/live/sync",
            json!({ "enabled": true, "url": url, "token": ADMIN_TOKEN }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{settings}");
    (local, remote)
}

#[tokio::test]
async fn settings_round_trip() {
    let app = TestApp::with_demo_project().await;

    let (_, initial) = app.get("/api/demo/live/sync").await;
    assert_eq!(initial["enabled"], false);

    let (status, _) = app
        .post(
            "/api/demo/live/sync",
            json!({ "enabled": true, "url": "https://remote.example.com", "project": "site" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, saved) = app.get("/api/demo/live/sync").await;
    assert_eq!(saved["project"], "site");
    assert!(saved.get("environment").is_none());
}

#[tokio::test]
async fn disabled_sync_is_a_bad_request() {
    let app = TestApp::with_demo_project().await;
    app.post(
        "/api/demo/live/content/abc?create=true",
        test_content("page").with_id("abc").to_json(),
    )
    .await;

    let (status, body) = app.post_empty("/api/demo/live/content/push/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("sync"));

    let (status, _) = app.post_empty("/api/demo/live/content/pull/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn push_then_pull_changes() {
    let (local, remote) = linked_pair().await;
    let content = test_content("page")
        .with_id("abc")
        .with_translations("title", &[("en", "Hello")])
        .to_json();
    local
        .post("/api/demo/live/content/abc?create=true", content)
        .await;

    let (status, body) = local.post_empty("/api/demo/live/content/push/abc").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, "abc");

    let (status, pushed) = remote.get("/api/demo/live/content/abc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pushed["properties"]["title"]["en"], "Hello");

    // Edit on the remote, then pull the change back.
    let mut edited = pushed.clone();
    edited["properties"]["title"]["en"] = json!("Hello again");
    let (status, _) = remote.post("/api/demo/live/content/abc", edited).await;
    assert_eq!(status, StatusCode::OK);

    let (status, pulled) = local.post_empty("/api/demo/live/content/pull/abc").await;
    assert_eq!(status, StatusCode::OK, "{pulled}");
    assert_eq!(pulled["properties"]["title"]["en"], "Hello again");

    let (_, stored) = local.get("/api/demo/live/content/abc").await;
    assert_eq!(stored["properties"]["title"]["en"], "Hello again");
}

#[tokio::test]
async fn pulling_a_missing_remote_item_is_not_found() {
    let (local, _remote) = linked_pair().await;

    let (status, _) = local.post_empty("/api/demo/live/content/pull/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pull_creates_missing_local_items() {
    let (local, remote) = linked_pair().await;
    remote
        .post(
            "/api/demo/live/content/fresh?create=true",
            test_content("page").with_id("fresh").to_json(),
        )
        .await;

    let (status, _) = local.get("/api/demo/live/content/fresh").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = local.post_empty("/api/demo/live/content/pull/fresh").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = local.get("/api/demo/live/content/fresh").await;
    assert_eq!(status, StatusCode::OK);
}
