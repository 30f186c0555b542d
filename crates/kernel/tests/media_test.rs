#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Media API integration tests.

mod common;

use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::TestApp;
use hashbrown_test_utils::connections;
use serde_json::json;

async fn app_with_provider() -> TestApp {
    let app = TestApp::with_demo_project().await;
    app.save_connection("cdn", connections::memory_connection("CDN", "media"), true)
        .await;
    app
}

fn upload(name: &str, bytes: &[u8], clear: bool) -> serde_json::Value {
    json!({ "name": name, "base64": STANDARD.encode(bytes), "clear": clear })
}

#[tokio::test]
async fn media_needs_a_provider() {
    let app = TestApp::with_demo_project().await;

    let (status, body) = app.get("/api/demo/live/media").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("media provider"));

    let (_, provider) = app.get("/api/demo/live/media/provider").await;
    assert_eq!(provider["connectionId"], serde_json::Value::Null);
}

#[tokio::test]
async fn upload_then_resolve_urls() {
    let app = app_with_provider().await;

    let (status, body) = app
        .post("/api/demo/live/media/logo", upload("logo.png", b"png", false))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["url"], "media/logo/logo.png");
    assert_eq!(
        app.volumes().read("media", "media/logo/logo.png").unwrap(),
        b"png"
    );

    // Thumbnails never count as the media file itself.
    app.post("/api/demo/live/media/photo", upload("thumbnail.jpg", b"t", false))
        .await;
    let (_, photo) = app.get("/api/demo/live/media/photo").await;
    assert!(photo["url"].is_null());
    app.post("/api/demo/live/media/photo", upload("photo.jpg", b"p", false))
        .await;

    let (_, web) = app.get("/api/demo/live/media/logo?ensureWebUrl=true").await;
    assert_eq!(web["url"], "https://cdn.example.com/media/logo/logo.png");

    let (status, all) = app.get("/api/demo/live/media").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        all,
        json!({ "logo": "media/logo/logo.png", "photo": "media/photo/photo.jpg" })
    );
}

#[tokio::test]
async fn clear_replaces_existing_files() {
    let app = app_with_provider().await;
    app.post("/api/demo/live/media/logo", upload("old.png", b"old", false))
        .await;

    let (status, body) = app
        .post("/api/demo/live/media/logo", upload("new.png", b"new", true))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "media/logo/new.png");
    assert_eq!(app.volumes().paths("media"), vec!["media/logo/new.png"]);

    // Clearing a folder that does not exist yet is fine.
    let (status, _) = app
        .post("/api/demo/live/media/fresh", upload("a.png", b"a", true))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn delete_removes_folder() {
    let app = app_with_provider().await;
    app.post("/api/demo/live/media/logo", upload("logo.png", b"png", false))
        .await;

    let (status, _) = app.delete("/api/demo/live/media/logo").await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.volumes().paths("media").is_empty());

    let (status, _) = app.delete("/api/demo/live/media/logo").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn illegal_media_names_are_rejected() {
    let app = app_with_provider().await;

    let (status, _) = app
        .post("/api/demo/live/media/logo", upload("../escape.png", b"x", false))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/demo/live/media/logo", upload("", b"x", false))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.volumes().paths("media").is_empty());
}

#[tokio::test]
async fn provider_can_be_switched() {
    let app = app_with_provider().await;
    app.save_connection("other", connections::memory_connection("Other", "other"), false)
        .await;

    let (status, body) = app
        .post("/api/demo/live/media/provider", json!({ "connectionId": "other" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connectionId"], "other");

    app.post("/api/demo/live/media/x", upload("x.png", b"x", false))
        .await;
    assert_eq!(app.volumes().paths("other"), vec!["media/x/x.png"]);

    let (status, _) = app
        .post("/api/demo/live/media/provider", json!({ "connectionId": "ghost" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Removing the provider connection clears the setting.
    app.delete("/api/demo/live/connections/other").await;
    let (_, provider) = app.get("/api/demo/live/media/provider").await;
    assert!(provider["connectionId"].is_null());
}
