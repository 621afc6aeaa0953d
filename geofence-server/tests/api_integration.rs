//! Integration tests for the HTTP API

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use geofence_server::{create_router, AppState, ServerConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

fn create_test_router() -> Router {
    let state = AppState::new(&ServerConfig::default()).unwrap();
    create_router(state)
}

fn home() -> Value {
    json!({
        "id": "home",
        "name": "Home",
        "center": { "latitude": 40.0, "longitude": -75.0 },
        "radiusMeters": 100.0,
        "active": true
    })
}

/// Fix `meters` due north of home (1 degree of latitude = 111194.93m)
fn fix_north(meters: f64) -> Value {
    json!({
        "latitude": 40.0 + meters / 111_194.926_644_558_73,
        "longitude": -75.0,
        "accuracyMeters": 12.0,
        "timestampMillis": 1_700_000_000_000i64
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    // Extractor rejections come back as plain text
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, json)
}

async fn evaluate(app: &Router, subject: &str, meters: f64) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        &format!("/v1/subjects/{}/evaluate", subject),
        Some(json!({ "fix": fix_north(meters), "geofences": [home()] })),
    )
    .await
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_router();
    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_entry_and_exit_flow() {
    let app = create_test_router();

    let (status, json) = evaluate(&app, "alice", 150.0).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));

    let (status, json) = evaluate(&app, "alice", 50.0).await;
    assert_eq!(status, StatusCode::OK);
    let events = json.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["subjectId"], "alice");
    assert_eq!(events[0]["geofenceId"], "home");
    assert_eq!(events[0]["geofenceName"], "Home");
    assert_eq!(events[0]["eventKind"], "entry");
    assert_eq!(events[0]["accuracyMeters"], 12.0);
    let distance = events[0]["distanceMeters"].as_f64().unwrap();
    assert!((distance - 50.0).abs() < 0.01);

    // Repeat: no new events
    let (_, json) = evaluate(&app, "alice", 50.0).await;
    assert_eq!(json, json!([]));

    let (_, json) = evaluate(&app, "alice", 200.0).await;
    assert_eq!(json[0]["eventKind"], "exit");
}

#[tokio::test]
async fn test_state_and_subjects() {
    let app = create_test_router();
    evaluate(&app, "bob", 10.0).await;
    evaluate(&app, "alice", 500.0).await;

    let (status, json) = send(&app, "GET", "/v1/subjects", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!(["alice", "bob"]));

    let (status, json) = send(&app, "GET", "/v1/subjects/bob/state", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["home"]["isInside"], true);
    assert_eq!(json["home"]["lastEventKind"], "entry");

    let (_, json) = send(&app, "GET", "/v1/subjects/alice/state", None).await;
    assert_eq!(json["home"]["isInside"], false);

    let (_, json) = send(&app, "GET", "/v1/subjects/nobody/state", None).await;
    assert_eq!(json, json!({}));
}

#[tokio::test]
async fn test_clear_subject_and_all() {
    let app = create_test_router();
    evaluate(&app, "alice", 10.0).await;
    evaluate(&app, "bob", 10.0).await;

    let (status, _) = send(&app, "DELETE", "/v1/subjects/alice", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, json) = send(&app, "GET", "/v1/subjects", None).await;
    assert_eq!(json, json!(["bob"]));

    // Cleared subject fires entry again
    let (_, json) = evaluate(&app, "alice", 10.0).await;
    assert_eq!(json[0]["eventKind"], "entry");

    let (status, _) = send(&app, "DELETE", "/v1/subjects", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, json) = send(&app, "GET", "/v1/subjects", None).await;
    assert_eq!(json, json!([]));
}

#[tokio::test]
async fn test_inactive_geofence_is_skipped() {
    let app = create_test_router();
    let mut fence = home();
    fence["active"] = json!(false);

    let (status, json) = send(
        &app,
        "POST",
        "/v1/subjects/alice/evaluate",
        Some(json!({ "fix": fix_north(0.0), "geofences": [fence] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));

    let (_, json) = send(&app, "GET", "/v1/subjects/alice/state", None).await;
    assert_eq!(json, json!({}));
}

#[tokio::test]
async fn test_subject_ids_follow_engine_rules() {
    // Only an empty id is invalid, and an empty path segment never routes;
    // whitespace is an ordinary id.
    let app = create_test_router();
    let (status, json) = evaluate(&app, "%20", 10.0).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["subjectId"], " ");

    let (_, json) = send(&app, "GET", "/v1/subjects", None).await;
    assert_eq!(json, json!([" "]));
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let app = create_test_router();
    let (status, _) = send(
        &app,
        "POST",
        "/v1/subjects/alice/evaluate",
        Some(json!({ "geofences": [home()] })),
    )
    .await;

    assert!(status.is_client_error());
}
