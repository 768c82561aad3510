use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use bridge_core::{HandoffPolicy, MemorySlotStore, PollTimings, RendezvousEngine};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use crate::create_app;
use crate::handlers::{AppState, PAD_BYTES};

fn test_json() -> Value {
    json!({
        "command": "POST",
        "url": "http://somehost:9999/v1/commands/session/open",
        "params": null,
        "data": {"file": "galFiltered.cys"},
        "headers": {"Content-Type": "application/json", "Accept": "application/json"}
    })
}

fn test_app_with_policy(policy: HandoffPolicy, pad_responses: bool) -> Router {
    let timings = PollTimings {
        dequeue_timeout: Duration::from_millis(100),
        fast_poll: Duration::from_millis(10),
        slow_poll: Duration::from_millis(10),
        allowed_fast_polls: 10,
        ..PollTimings::default()
    };
    let engine = Arc::new(RendezvousEngine::new(
        Arc::new(MemorySlotStore::new()),
        timings,
        policy,
    ));
    create_app(AppState {
        engine,
        pad_responses,
    })
}

fn test_app() -> Router {
    test_app_with_policy(HandoffPolicy::Relaxed, true)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, content_type: &str, body: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body.to_vec()))
        .unwrap()
}

async fn read_body(response: axum::response::Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

fn cors_header(response: &axum::response::Response) -> Option<&str> {
    response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .and_then(|value| value.to_str().ok())
}

fn content_type(response: &axum::response::Response) -> Option<&str> {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
}

#[tokio::test]
async fn ping_reports_version() {
    let app = test_app();

    let response = app.oneshot(get("/ping")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cors_header(&response), Some("*"));
    let body = String::from_utf8(read_body(response).await).unwrap();
    assert_eq!(body, format!("pong {}", env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn queue_request_requires_channel() {
    let app = test_app();

    let response = app
        .oneshot(post("/queue_request", "application/json", b"{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(cors_header(&response), Some("*"));
    assert_eq!(content_type(&response), Some("text/plain"));
    let body = String::from_utf8(read_body(response).await).unwrap();
    assert_eq!(body, "Channel is missing in parameter list");
}

#[tokio::test]
async fn queue_request_rejects_wrong_content_type() {
    let app = test_app();

    let response = app
        .oneshot(post("/queue_request?channel=test", "text/plain", b"{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = String::from_utf8(read_body(response).await).unwrap();
    assert_eq!(body, "Payload must be application/json");
}

#[tokio::test]
async fn queue_reply_rejects_wrong_content_type() {
    let app = test_app();

    let response = app
        .oneshot(post("/queue_reply?channel=test", "application/json", b"ok"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = String::from_utf8(read_body(response).await).unwrap();
    assert_eq!(body, "Payload must be text/plain");
}

#[tokio::test]
async fn request_round_trip_and_timeout() {
    let app = test_app();
    let payload = serde_json::to_vec(&test_json()).unwrap();

    let response = app
        .clone()
        .oneshot(post("/queue_request?channel=test", "application/json", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cors_header(&response), Some("*"));

    let response = app
        .clone()
        .oneshot(get("/dequeue_request?channel=test"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), Some("application/json"));
    let body = read_body(response).await;
    assert_eq!(body.len(), payload.len() + PAD_BYTES);
    // The trailing padding is whitespace, which the JSON parser ignores.
    let round_tripped: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(round_tripped, test_json());

    // Nothing further is pending, so the next long-poll times out.
    let response = app
        .oneshot(get("/dequeue_request?channel=test"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
}

#[tokio::test]
async fn second_post_before_dequeue_is_rejected() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(post("/queue_reply?channel=test", "text/plain", b"first"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post("/queue_reply?channel=test", "text/plain", b"second"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = String::from_utf8(read_body(response).await).unwrap();
    assert!(body.contains("unprocessed message"), "body was: {body}");

    // The parked message is the first one, untouched.
    let response = app
        .oneshot(get("/dequeue_reply?channel=test"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_body(response).await;
    assert!(body.starts_with(b"first"));
}

#[tokio::test]
async fn relaxed_handoff_drops_stale_reply() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(post("/queue_reply?channel=test", "text/plain", b"prior"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Default policy: the new request wins and the stale reply is dropped.
    let response = app
        .clone()
        .oneshot(post("/queue_request?channel=test", "application/json", b"{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get("/dequeue_reply?channel=test"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
}

#[tokio::test]
async fn strict_handoff_rejects_request_over_pending_reply() {
    let app = test_app_with_policy(HandoffPolicy::Strict, true);

    let response = app
        .clone()
        .oneshot(post("/queue_reply?channel=test", "text/plain", b"prior"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post("/queue_request?channel=test", "application/json", b"{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = String::from_utf8(read_body(response).await).unwrap();
    assert!(body.contains("not picked up"), "body was: {body}");
}

#[tokio::test]
async fn dequeue_times_out_with_408() {
    let app = test_app();
    let channel = Uuid::new_v4();

    let response = app
        .oneshot(get(&format!("/dequeue_reply?channel={channel}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(cors_header(&response), Some("*"));
    assert!(read_body(response).await.is_empty());
}

#[tokio::test]
async fn reset_flag_clears_orphaned_request() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(post("/queue_request?channel=test", "application/json", b"{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The original reader died; its replacement resets the slot and finds
    // nothing to consume.
    let response = app
        .clone()
        .oneshot(get("/dequeue_request?channel=test&reset"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

    // The slot accepts a fresh request, which a plain dequeue delivers.
    let response = app
        .clone()
        .oneshot(post(
            "/queue_request?channel=test",
            "application/json",
            br#"{"command":"GET"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get("/dequeue_request?channel=test"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let delivered: Value = serde_json::from_slice(&read_body(response).await).unwrap();
    assert_eq!(delivered, json!({"command": "GET"}));
}

#[tokio::test]
async fn delivery_reaches_waiter_that_started_first() {
    let app = test_app();

    let waiter = {
        let app = app.clone();
        tokio::spawn(async move { app.oneshot(get("/dequeue_reply?channel=test")).await })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    let response = app
        .oneshot(post("/queue_reply?channel=test", "text/plain", b"hi"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = waiter.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_body(response).await;
    assert!(body.starts_with(b"hi"));
}

#[tokio::test]
async fn padding_can_be_disabled() {
    let app = test_app_with_policy(HandoffPolicy::Relaxed, false);

    let response = app
        .clone()
        .oneshot(post("/queue_reply?channel=test", "text/plain", b"exact"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get("/dequeue_reply?channel=test"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_body(response).await, b"exact".to_vec());
}

#[tokio::test]
async fn status_reports_channel_metadata() {
    let app = test_app();
    let payload = serde_json::to_vec(&test_json()).unwrap();

    let response = app
        .clone()
        .oneshot(post("/queue_request?channel=test", "application/json", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        content_type(&response).is_some_and(|ct| ct.starts_with("application/json"))
    );
    let snapshot: Value = serde_json::from_slice(&read_body(response).await).unwrap();
    assert_eq!(snapshot["test"]["request"]["message"], test_json());
    assert!(
        snapshot["test"]["request"]["posted_time"]
            .as_str()
            .is_some_and(|t| !t.is_empty())
    );
}
