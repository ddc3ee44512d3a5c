//! Integration tests for the HTTP API

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use nvshu::core::{create_router, AppState, GlyphRegistry, TableGateway};
use nvshu::types::{GlyphCode, GlyphRecord, NegotiationConfig};
use nvshu::DEFAULT_POEM;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

fn config() -> NegotiationConfig {
    NegotiationConfig {
        seed: Some(17),
        ..Default::default()
    }
}

fn create_test_router(registry: GlyphRegistry, path: Option<PathBuf>) -> axum::Router {
    let gateway = TableGateway::demo(17).unwrap();
    create_router(AppState::new(Arc::new(gateway), registry, path, config()))
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_router(GlyphRegistry::new(), None);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["registry_records"], 0);
}

#[tokio::test]
async fn test_negotiate_concludes() {
    let app = create_test_router(GlyphRegistry::new(), None);

    let body = serde_json::json!({ "poem": DEFAULT_POEM }).to_string();
    let response = app.oneshot(post_json("/negotiate", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "concluded");
    let outcome = &json["outcome"];
    assert!(outcome["target_character"].is_string());
    assert_eq!(outcome["glyph"].as_array().unwrap().len(), 3);
    let attempts = outcome["attempts"].as_array().unwrap().len();
    assert!((1..=5).contains(&attempts));
    assert_eq!(json["guess_poems"].as_array().unwrap().len(), attempts);
    assert!(json.get("merge").is_none());
}

#[tokio::test]
async fn test_negotiate_skips_known_poem() {
    let mut registry = GlyphRegistry::new();
    for (i, c) in "江永女书奇闺中秘语稀".chars().enumerate() {
        registry.insert(c, GlyphRecord::new(GlyphCode::new([i as u8, 1, 2]).unwrap(), ""));
    }
    let app = create_test_router(registry, None);

    let body = serde_json::json!({ "poem": DEFAULT_POEM }).to_string();
    let response = app.oneshot(post_json("/negotiate", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "skipped");
    assert!(json["message"].as_str().unwrap().contains("Nothing new"));
}

#[tokio::test]
async fn test_negotiate_rejects_short_poem() {
    let app = create_test_router(GlyphRegistry::new(), None);

    let response = app
        .oneshot(post_json("/negotiate", r#"{"poem": "江永"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["reason"], "R401_INVALID_INPUT");
}

#[tokio::test]
async fn test_gateway_failure_is_generic_500() {
    let app = create_test_router(GlyphRegistry::new(), None);

    let response = app
        .oneshot(post_json("/negotiate", r#"{"poem": "ABCDEFG"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["reason"], "R403_GATEWAY_FAILURE");
    assert_eq!(json["message"], nvshu::types::GENERIC_FAILURE_MESSAGE);
}

#[tokio::test]
async fn test_commit_persists_registry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");
    let app = create_test_router(GlyphRegistry::new(), Some(path.clone()));

    let body = serde_json::json!({
        "poem": DEFAULT_POEM,
        "commit": true,
        "translation": "poem-word"
    })
    .to_string();
    let response = app.clone().oneshot(post_json("/negotiate", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["merge"], "appended");
    let character = json["outcome"]["target_character"].as_str().unwrap().to_string();

    let saved = GlyphRegistry::load(&path).unwrap();
    let c = character.chars().next().unwrap();
    assert_eq!(saved.lookup(c).unwrap().translation, "poem-word");

    let uri = format!("/dictionary/{}", urlencode(&character));
    let response = app.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let record = body_json(response).await;
    assert_eq!(record["translation"], "poem-word");
    assert!(record["provenance"].is_string());
}

#[tokio::test]
async fn test_dictionary_add_search_and_lookup() {
    let app = create_test_router(GlyphRegistry::new(), None);

    let response = app
        .clone()
        .oneshot(post_json(
            "/dictionary",
            r#"{"character": "奇", "code": [3, 7, 11], "translation": "strange"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "appended");

    // Append-only: the code stays, the translation changes
    let response = app
        .clone()
        .oneshot(post_json(
            "/dictionary",
            r#"{"character": "奇", "code": [1, 1, 1], "translation": "odd"}"#,
        ))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["status"], "translation_updated");
    assert_eq!(json["record"]["code"], serde_json::json!([3, 7, 11]));

    let response = app
        .clone()
        .oneshot(get("/dictionary/search?term=ODD"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json.get("奇").is_some());

    let response = app.clone().oneshot(get("/dictionary")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["version"], 2);

    let response = app
        .clone()
        .oneshot(get(&format!("/dictionary/{}", urlencode("江"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/dictionary/search?term=")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dictionary_add_persists_registry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("registry.json");
    let app = create_test_router(GlyphRegistry::new(), Some(path.clone()));

    for (character, code) in [("奇", "[3, 7, 11]"), ("江", "[14, 0, 16]")] {
        let body = format!(r#"{{"character": "{}", "code": {}}}"#, character, code);
        let response = app
            .clone()
            .oneshot(post_json("/dictionary", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let saved = GlyphRegistry::load(&path).unwrap();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved.lookup('奇').unwrap().code, GlyphCode::new([3, 7, 11]).unwrap());
    assert!(!path.with_extension("json.tmp").exists());
}

#[tokio::test]
async fn test_dictionary_rejects_bad_records() {
    let app = create_test_router(GlyphRegistry::new(), None);

    let response = app
        .clone()
        .oneshot(post_json(
            "/dictionary",
            r#"{"character": "江永", "code": [1, 2, 3]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(post_json(
            "/dictionary",
            r#"{"character": "江", "code": [1, 2, 300]}"#,
        ))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_poem_hints() {
    let mut registry = GlyphRegistry::new();
    registry.insert('江', GlyphRecord::new(GlyphCode::new([1, 2, 3]).unwrap(), ""));
    let app = create_test_router(registry, None);

    let body = serde_json::json!({ "poem": DEFAULT_POEM }).to_string();
    let response = app.oneshot(post_json("/poem/hints", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["text"], "[1-2-3]永女书奇，闺中秘语稀。");
    assert_eq!(json["replaced"], serde_json::json!([0]));
}

/// Percent-encode a path segment
fn urlencode(s: &str) -> String {
    s.bytes().map(|b| format!("%{:02X}", b)).collect()
}
