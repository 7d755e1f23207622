use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::util::ServiceExt;

use super::harness::{TestHarness, decode_json};

#[tokio::test]
async fn rebuild_returns_summary_counts() {
    let harness = TestHarness::setup();
    let response = harness
        .router
        .clone()
        .oneshot(harness.json("POST", "/api/admin/rebuild-index", json!({})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let payload: serde_json::Value = decode_json(response).await;
    assert_eq!(payload["stats"]["assignments"], 2);
    assert_eq!(payload["stats"]["subjects"], 2);
    assert!(
        payload["stats"]["lastUpdated"]
            .as_str()
            .is_some_and(|x| !x.is_empty())
    );
}

#[tokio::test]
async fn rebuild_requires_a_token() {
    let harness = TestHarness::setup();
    let response = harness
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/rebuild-index")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rebuild_picks_up_documents_written_behind_the_cache() {
    let harness = TestHarness::setup();
    harness
        .state
        .app
        .store
        .write_document("History", "Ancient Rome.json", r#"{"id":"7"}"#)
        .expect("seed behind cache");

    let response = harness
        .router
        .clone()
        .oneshot(harness.json("POST", "/api/admin/rebuild-index", json!({})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload: serde_json::Value = decode_json(response).await;
    assert_eq!(payload["stats"]["assignments"], 3);
    assert_eq!(payload["stats"]["subjects"], 3);
}
