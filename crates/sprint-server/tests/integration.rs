use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use http_body_util::BodyExt;
use sprint_core::config::{HubSettings, ServerConfig};
use sprint_core::hub::{Broadcaster, HubMessage};
use sprint_core::store::{MemoryStore, RedbStore};
use sprint_server::state::AppState;
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn test_config() -> ServerConfig {
    ServerConfig {
        public_url: Some("http://sprint.test".into()),
        hub: HubSettings {
            token_secret: Some("integration-secret-0123456789".into()),
            ..HubSettings::default()
        },
        ..ServerConfig::default()
    }
}

fn test_state(config: &ServerConfig) -> AppState {
    AppState::with_store(config, Arc::new(MemoryStore::new()))
}

/// Send a request via `oneshot` and return (status, raw body bytes).
async fn send(
    app: axum::Router,
    req: axum::http::Request<axum::body::Body>,
) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

fn parse(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap_or(serde_json::Value::Null)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, body) = send(app, req).await;
    (status, parse(&body))
}

async fn post_raw(app: axum::Router, uri: &str, body: &str) -> (StatusCode, Vec<u8>) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

async fn post_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let (status, bytes) = post_raw(app, uri, &body.to_string()).await;
    (status, parse(&bytes))
}

fn member(employer: &str, team: &str, sprint: &str, name: &str) -> serde_json::Value {
    serde_json::json!({
        "employer": employer,
        "team": team,
        "sprintId": sprint,
        "teamMember": name,
    })
}

fn plan(employer: &str, team: &str, sprint: &str, name: &str, points: f64) -> serde_json::Value {
    let mut body = member(employer, team, sprint, name);
    body["points"] = serde_json::json!(points);
    body
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_team_member_returns_entity_without_points() {
    let state = test_state(&test_config());
    let app = sprint_server::build_router(state);

    let mut body = plan("acme", "core", "s1", "alice", 5.0);
    body["id"] = serde_json::json!("forged");
    let (status, json) = post_json(app, "/createSprintPlanTeamMember", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], "acmecores1alice");
    assert_eq!(json["teamMember"], "alice");
    assert_eq!(json["sprintId"], "s1");
    assert!(json["points"].is_null());
}

#[tokio::test]
async fn create_sprint_plan_keeps_points_and_replaces_on_second_write() {
    let state = test_state(&test_config());
    let app = sprint_server::build_router(state.clone());

    let (status, json) =
        post_json(app.clone(), "/createSprintPlan", plan("acme", "core", "s1", "alice", 3.0))
            .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["points"], 3.0);

    let (status, json) =
        post_json(app.clone(), "/createSprintPlan", plan("acme", "core", "s1", "alice", 8.0))
            .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["points"], 8.0);

    let (status, json) = get(app, "/getSprintPlanningData/acme/core/s1").await;
    assert_eq!(status, StatusCode::OK);
    let arr = json.as_array().expect("expected JSON array");
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["points"], 8.0);
}

#[tokio::test]
async fn missing_field_returns_empty_ok_without_side_effects() {
    let state = test_state(&test_config());
    let mut rx = state.hub.subscribe();
    let app = sprint_server::build_router(state);

    let body = member("acme", "core", "s1", "  ");
    let (status, bytes) = post_raw(app.clone(), "/createSprintPlan", &body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert!(bytes.is_empty(), "expected empty body");
    assert!(rx.try_recv().is_err(), "no event may be published");

    let (status, _) = get(app, "/getSprintPlanningData/acme/core/s1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn strict_validation_rejects_missing_field() {
    let config = ServerConfig {
        strict_validation: true,
        ..test_config()
    };
    let app = sprint_server::build_router(test_state(&config));

    let body = serde_json::json!({ "employer": "acme", "team": "core", "sprintId": "s1" });
    let (status, json) = post_json(app, "/createSprintPlanTeamMember", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("teamMember"));
}

#[tokio::test]
async fn malformed_body_returns_bare_500() {
    let app = sprint_server::build_router(test_state(&test_config()));
    let (status, bytes) = post_raw(app, "/createSprintPlan", "{not json").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn successful_write_publishes_exactly_one_event() {
    let state = test_state(&test_config());
    let mut rx = state.hub.subscribe();
    let app = sprint_server::build_router(state);

    let (status, json) =
        post_json(app, "/createSprintPlan", plan("acme", "core", "s1", "bob", 2.0)).await;
    assert_eq!(status, StatusCode::OK);

    let HubMessage { target, arguments } = rx.try_recv().expect("one event");
    assert_eq!(target, "sprintPlanningTeamData");
    assert_eq!(arguments.len(), 1);
    assert_eq!(serde_json::to_value(&arguments[0]).unwrap(), json);
    assert!(rx.try_recv().is_err(), "only one event per write");
}

#[tokio::test]
async fn replayed_write_is_idempotent() {
    let state = test_state(&test_config());
    let app = sprint_server::build_router(state);

    for _ in 0..2 {
        let (status, _) =
            post_json(app.clone(), "/createSprintPlan", plan("acme", "core", "s1", "bob", 2.0))
                .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, json) = get(app, "/getSprintPlanningData/acme/core/s1").await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn query_returns_all_members_in_scope() {
    let app = sprint_server::build_router(test_state(&test_config()));

    for name in ["alice", "bob"] {
        let (status, _) = post_json(
            app.clone(),
            "/createSprintPlanTeamMember",
            member("A", "T", "S", name),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, json) = get(app.clone(), "/getSprintPlanningData/A/T/S").await;
    assert_eq!(status, StatusCode::OK);
    let mut names: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["teamMember"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["alice", "bob"]);

    let (status, _) = get(app, "/getSprintPlanningData/A/T/other").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn query_against_redb_store_survives_new_router() {
    let dir = TempDir::new().unwrap();
    let config = test_config();
    let store = Arc::new(RedbStore::open(&dir.path().join("sprint.redb")).unwrap());

    let app = sprint_server::build_router(AppState::with_store(&config, store.clone()));
    let (status, _) =
        post_json(app, "/createSprintPlan", plan("acme", "core", "s9", "carol", 13.0)).await;
    assert_eq!(status, StatusCode::OK);

    let app = sprint_server::build_router(AppState::with_store(&config, store));
    let (status, json) = get(app, "/getSprintPlanningData/acme/core/s9").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["points"], 13.0);
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

#[tokio::test]
async fn negotiate_get_and_post_return_connection_info() {
    let state = test_state(&test_config());
    let app = sprint_server::build_router(state.clone());

    let (status, json) = get(app.clone(), "/negotiate?userId=alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["url"], "http://sprint.test/hub/sprintPlanningHub");
    let claims = state
        .hub
        .verify(json["accessToken"].as_str().unwrap())
        .unwrap();
    assert_eq!(claims.sub, "alice");

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/negotiate")
        .header("x-client-id", "bob")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, bytes) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse(&bytes);
    let claims = state
        .hub
        .verify(json["accessToken"].as_str().unwrap())
        .unwrap();
    assert_eq!(claims.sub, "bob");
}

#[tokio::test]
async fn hub_subscription_requires_valid_token() {
    let app = sprint_server::build_router(test_state(&test_config()));

    let (status, _) = get(app.clone(), "/hub/sprintPlanningHub").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get(app.clone(), "/hub/sprintPlanningHub?access_token=bogus.token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get(app, "/hub/otherHub?access_token=bogus.token").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn hub_subscription_streams_published_events() {
    let state = test_state(&test_config());
    let app = sprint_server::build_router(state.clone());
    let info = state.hub.negotiate(Some("watcher")).unwrap();

    let req = axum::http::Request::builder()
        .uri("/hub/sprintPlanningHub")
        .header("authorization", format!("Bearer {}", info.access_token))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ct = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(ct.contains("text/event-stream"));

    let (status, _) =
        post_json(app, "/createSprintPlan", plan("acme", "core", "s1", "dana", 1.0)).await;
    assert_eq!(status, StatusCode::OK);

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .expect("event within timeout")
        .expect("stream still open")
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("event: sprintPlanningTeamData"), "got {text}");
    assert!(text.contains("\"teamMember\":\"dana\""), "got {text}");
}

#[tokio::test]
async fn lagging_subscriber_resumes_with_newest_event() {
    let config = ServerConfig {
        hub: HubSettings {
            capacity: 1,
            ..test_config().hub
        },
        ..test_config()
    };
    let state = test_state(&config);
    let app = sprint_server::build_router(state.clone());
    let info = state.hub.negotiate(Some("slow")).unwrap();

    let req = axum::http::Request::builder()
        .uri(format!("/hub/sprintPlanningHub?access_token={}", info.access_token))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Two events before the subscriber reads: the first one is overwritten.
    for name in ["first", "second"] {
        let (status, _) =
            post_json(app.clone(), "/createSprintPlan", plan("acme", "core", "s1", name, 1.0))
                .await;
        assert_eq!(status, StatusCode::OK);
    }

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .expect("event within timeout")
        .expect("stream still open")
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("\"teamMember\":\"second\""), "got {text}");
    assert!(!text.contains("\"teamMember\":\"first\""), "got {text}");
}

#[tokio::test]
async fn health_reports_ok() {
    let app = sprint_server::build_router(test_state(&test_config()));
    let (status, json) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}
