//! Integration tests for the portflow HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
// Allow holding MutexGuard across await in auth tests - tests are serialized
// intentionally to avoid env var conflicts
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use axum_test::TestServer;
use portflow::PortflowConfig;
use portflow::api::{
    AckResponse, AppState, BatchResponse, CheckResponse, ConfigureResponse, ErrorResponse,
    HealthResponse, MAX_BATCH_SIZE, create_router,
};
use portflow_core::{
    NodeIdentifier, NodeState, NodeView, PortRole, ServiceDescription, Session, SessionStatus,
};
use serde_json::{Value, json};
use std::sync::Mutex;
use tower::ServiceExt;

/// Mutex to serialize tests since auth tests modify env vars.
static AUTH_TEST_MUTEX: Mutex<()> = Mutex::new(());

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Guard wrapper that holds the mutex and ensures cleanup on drop.
struct TestGuard {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
        unsafe { std::env::remove_var("PORTFLOW_API_KEY") };
    }
}

fn lock() -> TestGuard {
    let guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::remove_var("PORTFLOW_API_KEY") };
    TestGuard { _guard: guard }
}

fn server_with(config: PortflowConfig) -> TestServer {
    let session = Session::with_builtins().with_max_combinations(config.max_combinations);
    TestServer::new(create_router(AppState::with_config(session, config))).unwrap()
}

/// Create a test server over an empty built-in session.
/// Returns a guard that must be kept alive during the test.
fn create_test_server() -> (TestServer, TestGuard) {
    let guard = lock();
    (server_with(PortflowConfig::default()), guard)
}

fn node(id: &NodeIdentifier) -> Value {
    json!({ "id": id.id, "node_type": id.node_type })
}

fn port(id: &NodeIdentifier, tag: &str) -> Value {
    json!({ "node": node(id), "tag": tag })
}

async fn create_nodes(server: &TestServer, nodes: Value) -> Vec<NodeIdentifier> {
    let response = server.post("/nodes").json(&json!({ "nodes": nodes })).await;
    response.assert_status_ok();
    let batch: BatchResponse<NodeIdentifier> = response.json();
    assert!(batch.success, "create failed: {:?}", batch.results);
    batch.results.into_iter().map(|r| r.value.unwrap()).collect()
}

async fn link(server: &TestServer, links: Value) -> AckResponse {
    let response = server.post("/link").json(&json!({ "links": links })).await;
    response.assert_status_ok();
    response.json()
}

/// source -> splitter.a, splitter.b -> sink
async fn create_chain(server: &TestServer) -> Vec<NodeIdentifier> {
    let ids = create_nodes(
        server,
        json!([
            { "node_type": "source", "data": { "kwargs": { "rate": 1.0 } } },
            { "node_type": "splitter", "name": "split", "data": { "kwargs": { "ratio": 0.5 } } },
            { "node_type": "sink" }
        ]),
    )
    .await;
    let ack = link(
        server,
        json!([
            { "from": port(&ids[0], "out"), "to": port(&ids[1], "a") },
            { "from": port(&ids[1], "b"), "to": port(&ids[2], "in") }
        ]),
    )
    .await;
    assert!(ack.success);
    ids
}

// =============================================================================
// HEALTH / INTROSPECTION TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _guard) = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_status_empty_session() {
    let (server, _guard) = create_test_server();

    let response = server.get("/status").await;

    response.assert_status_ok();
    let status: SessionStatus = response.json();
    assert_eq!(status.node_count, 0);
    assert_eq!(status.link_count, 0);
    assert_eq!(status.unresolved_count, 0);
    assert_eq!(status.node_type_count, 6);
}

#[tokio::test]
async fn test_describe_lists_builtin_types() {
    let (server, _guard) = create_test_server();

    let response = server.get("/describe").await;

    response.assert_status_ok();
    let description: ServiceDescription = response.json();
    let names: Vec<&str> = description
        .node_types
        .iter()
        .map(|t| t.node_type.as_str())
        .collect();
    for expected in ["source", "sink", "pipe", "splitter", "mixer", "collector"] {
        assert!(names.contains(&expected), "missing {expected}");
    }
}

// =============================================================================
// NODE LIFECYCLE TESTS
// =============================================================================

#[tokio::test]
async fn test_create_assigns_increasing_ids() {
    let (server, _guard) = create_test_server();

    let ids = create_nodes(
        &server,
        json!([
            { "node_type": "sink" },
            { "node_type": "pipe", "data": { "kwargs": { "sigma": 0.1 } } }
        ]),
    )
    .await;

    assert_eq!(ids[0], NodeIdentifier::new(1, "sink"));
    assert_eq!(ids[1], NodeIdentifier::new(2, "pipe"));

    let status: SessionStatus = server.get("/status").await.json();
    assert_eq!(status.node_count, 2);
    assert_eq!(status.unresolved_count, 1);
}

#[tokio::test]
async fn test_create_reports_per_item_failures() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/nodes")
        .json(&json!({ "nodes": [
            { "node_type": "sink" },
            { "node_type": "teleporter" },
            { "node_type": "source" }
        ] }))
        .await;

    response.assert_status_ok();
    let batch: BatchResponse<NodeIdentifier> = response.json();
    assert!(!batch.success);
    assert!(batch.results[0].success);
    assert_eq!(batch.results[1].status, 404);
    assert!(batch.results[1].error.as_ref().unwrap().contains("teleporter"));
    // source without its rate parameter
    assert_eq!(batch.results[2].status, 400);

    let status: SessionStatus = server.get("/status").await.json();
    assert_eq!(status.node_count, 1);
}

#[tokio::test]
async fn test_node_view_defaults_name() {
    let (server, _guard) = create_test_server();
    let ids = create_nodes(&server, json!([{ "node_type": "sink" }])).await;

    let response = server.get(&format!("/nodes/{}", ids[0].id)).await;

    response.assert_status_ok();
    let view: NodeView = response.json();
    assert_eq!(view.name, "sink-1");
    assert!(view.resolved);
    assert_eq!(view.ports.len(), 1);
    assert_eq!(view.ports[0].tag, "in");
    assert_eq!(view.ports[0].effective_role, PortRole::Input);
}

#[tokio::test]
async fn test_node_view_unknown_id_is_404() {
    let (server, _guard) = create_test_server();

    let response = server.get("/nodes/42").await;

    response.assert_status_not_found();
    let error: ErrorResponse = response.json();
    assert!(!error.success);
    assert_eq!(error.status, 404);
}

#[tokio::test]
async fn test_update_and_read_state() {
    let (server, _guard) = create_test_server();
    let ids = create_nodes(
        &server,
        json!([{ "node_type": "pipe", "data": { "kwargs": { "sigma": 0.1 } } }]),
    )
    .await;

    let response = server
        .post("/nodes/update")
        .json(&json!({ "updates": [
            { "id": node(&ids[0]), "data": { "kwargs": { "sigma": 0.25 } } }
        ] }))
        .await;
    let ack: AckResponse = response.json();
    assert!(ack.success);

    let response = server
        .post("/nodes/state")
        .json(&json!({ "requests": [
            { "id": node(&ids[0]), "fields": ["sigma", "runs"] },
            { "id": node(&ids[0]), "fields": ["missing"] }
        ] }))
        .await;
    let batch: BatchResponse<NodeState> = response.json();
    let state = batch.results[0].value.as_ref().unwrap();
    assert_eq!(state.fields.get("sigma"), Some(&0.25));
    assert_eq!(state.fields.get("runs"), Some(&0.0));
    assert_eq!(batch.results[1].status, 400);
}

#[tokio::test]
async fn test_update_rejects_multi_port_change() {
    let (server, _guard) = create_test_server();
    let ids = create_nodes(
        &server,
        json!([{ "node_type": "collector", "data": { "multi_ports": { "inlet": 2 } } }]),
    )
    .await;

    let response = server
        .post("/nodes/update")
        .json(&json!({ "updates": [
            { "id": node(&ids[0]), "data": { "multi_ports": { "inlet": 3 } } }
        ] }))
        .await;

    let ack: AckResponse = response.json();
    assert!(!ack.success);
    assert_eq!(ack.results[0].status, 400);
}

#[tokio::test]
async fn test_delete_unlinks_partner() {
    let (server, _guard) = create_test_server();
    let ids = create_chain(&server).await;

    let response = server
        .post("/nodes/delete")
        .json(&json!({ "ids": [node(&ids[2]), node(&ids[2])] }))
        .await;
    let ack: AckResponse = response.json();
    assert!(ack.results[0].success);
    assert_eq!(ack.results[1].status, 404);

    let view: NodeView = server.get(&format!("/nodes/{}", ids[1].id)).await.json();
    let b = view.ports.iter().find(|p| p.tag == "b").unwrap();
    assert!(b.linked_to.is_none());

    let status: SessionStatus = server.get("/status").await.json();
    assert_eq!(status.node_count, 2);
    assert_eq!(status.link_count, 1);
}

// =============================================================================
// LINK & RESOLUTION TESTS
// =============================================================================

#[tokio::test]
async fn test_relinking_a_port_conflicts() {
    let (server, _guard) = create_test_server();
    let ids = create_chain(&server).await;
    let extra = create_nodes(&server, json!([{ "node_type": "sink" }])).await;

    let ack = link(
        &server,
        json!([{ "from": port(&ids[0], "out"), "to": port(&extra[0], "in") }]),
    )
    .await;

    assert!(!ack.success);
    assert_eq!(ack.results[0].status, 409);
}

#[tokio::test]
async fn test_unknown_port_tag_is_404() {
    let (server, _guard) = create_test_server();
    let ids = create_nodes(&server, json!([{ "node_type": "sink" }, { "node_type": "sink" }])).await;

    let ack = link(
        &server,
        json!([{ "from": port(&ids[0], "out"), "to": port(&ids[1], "in") }]),
    )
    .await;

    assert_eq!(ack.results[0].status, 404);
}

#[tokio::test]
async fn test_configure_commits_unique_selection() {
    let (server, _guard) = create_test_server();
    let ids = create_chain(&server).await;

    let response = server.post("/configure").await;

    response.assert_status_ok();
    let report: ConfigureResponse = response.json();
    assert!(report.success);
    assert_eq!(report.components.len(), 1);
    assert_eq!(report.components[0].selection, vec![0, 0, 0]);

    let view: NodeView = server.get(&format!("/nodes/{}", ids[1].id)).await.json();
    assert_eq!(view.name, "split");
    assert_eq!(view.selected_state, Some(0));
    let roles: Vec<PortRole> = view.ports.iter().map(|p| p.effective_role).collect();
    assert_eq!(roles, [PortRole::Input, PortRole::Output, PortRole::Output]);
}

#[tokio::test]
async fn test_configure_ambiguous_lists_candidates() {
    let (server, _guard) = create_test_server();
    let ids = create_nodes(
        &server,
        json!([
            { "node_type": "pipe", "data": { "kwargs": { "sigma": 0.1 } } },
            { "node_type": "pipe", "data": { "kwargs": { "sigma": 0.1 } } }
        ]),
    )
    .await;
    link(&server, json!([{ "from": port(&ids[0], "b"), "to": port(&ids[1], "a") }])).await;

    let response = server.post("/configure").await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let report: ConfigureResponse = response.json();
    assert!(!report.success);
    assert_eq!(report.candidates, vec![vec![0, 0], vec![1, 1]]);

    // nothing was committed
    let status: SessionStatus = server.get("/status").await.json();
    assert_eq!(status.unresolved_count, 2);
}

#[tokio::test]
async fn test_failed_configure_commits_no_component() {
    let (server, _guard) = create_test_server();
    let ids = create_chain(&server).await;
    // a lone pipe after the chain: two valid states
    create_nodes(
        &server,
        json!([{ "node_type": "pipe", "data": { "kwargs": { "sigma": 0.1 } } }]),
    )
    .await;

    let response = server.post("/configure").await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let report: ConfigureResponse = response.json();
    assert_eq!(report.candidates, vec![vec![0], vec![1]]);

    let view: NodeView = server.get(&format!("/nodes/{}", ids[1].id)).await.json();
    assert!(!view.resolved);
    assert_eq!(view.selected_state, None);
    let status: SessionStatus = server.get("/status").await.json();
    assert_eq!(status.unresolved_count, 2);
}

/// Two sources feeding one splitter: only one of its ports may be an input.
#[tokio::test]
async fn test_configure_unsatisfiable() {
    let (server, _guard) = create_test_server();
    let ids = create_nodes(
        &server,
        json!([
            { "node_type": "source", "data": { "kwargs": { "rate": 1.0 } } },
            { "node_type": "splitter", "data": { "kwargs": { "ratio": 0.5 } } },
            { "node_type": "source", "data": { "kwargs": { "rate": 1.0 } } }
        ]),
    )
    .await;
    link(
        &server,
        json!([
            { "from": port(&ids[0], "out"), "to": port(&ids[1], "a") },
            { "from": port(&ids[2], "out"), "to": port(&ids[1], "b") }
        ]),
    )
    .await;

    let response = server.post("/configure").await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let report: ConfigureResponse = response.json();
    assert!(report.candidates.is_empty());
    assert!(report.error.unwrap().contains("no valid configuration"));
}

#[tokio::test]
async fn test_check_does_not_commit() {
    let (server, _guard) = create_test_server();
    create_chain(&server).await;

    let response = server.post("/check").await;

    response.assert_status_ok();
    let check: CheckResponse = response.json();
    assert_eq!(check.components.len(), 1);
    assert_eq!(check.components[0].valid, vec![vec![0, 0, 0]]);

    let status: SessionStatus = server.get("/status").await.json();
    assert_eq!(status.unresolved_count, 1);
}

#[tokio::test]
async fn test_combination_ceiling_from_config() {
    let _guard = lock();
    let server = server_with(PortflowConfig {
        max_combinations: 2,
        ..PortflowConfig::default()
    });
    let ids = create_chain(&server).await;
    assert_eq!(ids.len(), 3);

    let response = server.post("/configure").await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let report: ConfigureResponse = response.json();
    assert!(report.error.unwrap().contains("search space too large"));
}

#[tokio::test]
async fn test_process_requires_resolution() {
    let (server, _guard) = create_test_server();
    let ids = create_chain(&server).await;
    let body = json!({ "ids": [node(&ids[1])] });

    let before: AckResponse = server.post("/process").json(&body).await.json();
    assert_eq!(before.results[0].status, 409);

    server.post("/configure").await.assert_status_ok();
    let after: AckResponse = server.post("/process").json(&body).await.json();
    assert!(after.success);

    let state: BatchResponse<NodeState> = server
        .post("/nodes/state")
        .json(&json!({ "requests": [{ "id": node(&ids[1]), "fields": ["runs"] }] }))
        .await
        .json();
    assert_eq!(
        state.results[0].value.as_ref().unwrap().fields.get("runs"),
        Some(&1.0)
    );
}

// =============================================================================
// REQUEST HANDLING TESTS
// =============================================================================

#[tokio::test]
async fn test_oversized_batch_is_rejected() {
    let (server, _guard) = create_test_server();
    let nodes: Vec<Value> = (0..=MAX_BATCH_SIZE)
        .map(|_| json!({ "node_type": "sink" }))
        .collect();

    let response = server.post("/nodes").json(&json!({ "nodes": nodes })).await;

    response.assert_status_bad_request();
    let status: SessionStatus = server.get("/status").await.json();
    assert_eq!(status.node_count, 0);
}

#[tokio::test]
async fn test_404_on_unknown_endpoint() {
    let (server, _guard) = create_test_server();

    let response = server.get("/unknown").await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_method_not_allowed() {
    let (server, _guard) = create_test_server();

    // /configure is POST only
    let response = server.get("/configure").await;
    assert_eq!(response.status_code().as_u16(), 405);
}

#[tokio::test]
async fn test_invalid_json_body() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/nodes")
        .text("not valid json")
        .content_type("application/json")
        .await;

    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_rate_limit_rejects_burst() {
    let _guard = lock();
    let router = create_router(AppState::with_config(
        Session::with_builtins(),
        PortflowConfig {
            rate_limit: 1,
            ..PortflowConfig::default()
        },
    ));

    let request = || Request::get("/health").body(Body::empty()).unwrap();
    let first = router.clone().oneshot(request()).await.unwrap();
    let second = router.oneshot(request()).await.unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_zero_rate_limit_disables_limiter() {
    let _guard = lock();
    let server = server_with(PortflowConfig {
        rate_limit: 0,
        ..PortflowConfig::default()
    });

    for _ in 0..5 {
        server.get("/health").await.assert_status_ok();
    }
}

// =============================================================================
// AUTHENTICATION MIDDLEWARE TESTS
// =============================================================================

/// Create a test server with authentication enabled.
fn create_auth_test_server(api_key: &str) -> (TestServer, TestGuard) {
    let guard = lock();
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::set_var("PORTFLOW_API_KEY", api_key) };
    (server_with(PortflowConfig::default()), guard)
}

#[tokio::test]
async fn test_auth_valid_bearer_token() {
    let api_key = "test-secret-key-12345";
    let (server, _guard) = create_auth_test_server(api_key);

    let response = server
        .get("/status")
        .add_header(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {}", api_key)
                .parse::<HeaderValue>()
                .unwrap(),
        )
        .await;

    response.assert_status_ok();
    let status: SessionStatus = response.json();
    assert_eq!(status.node_count, 0);
}

#[tokio::test]
async fn test_auth_invalid_token_rejected() {
    let (server, _guard) = create_auth_test_server("correct-key");

    let response = server
        .get("/status")
        .add_header(
            axum::http::header::AUTHORIZATION,
            "Bearer wrong-key".parse::<HeaderValue>().unwrap(),
        )
        .await;

    assert_eq!(response.status_code().as_u16(), 401);
}

#[tokio::test]
async fn test_auth_missing_header_rejected() {
    let (server, _guard) = create_auth_test_server("required-key");

    let response = server.post("/configure").await;

    assert_eq!(response.status_code().as_u16(), 401);
}

#[tokio::test]
async fn test_auth_health_endpoint_bypasses_auth() {
    let (server, _guard) = create_auth_test_server("secret-key-for-bypass-test");

    let response = server.get("/health").await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_rejected_key_spends_rate_quota() {
    let _guard = lock();
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::set_var("PORTFLOW_API_KEY", "quota-key") };
    let router = create_router(AppState::with_config(
        Session::with_builtins(),
        PortflowConfig {
            rate_limit: 1,
            ..PortflowConfig::default()
        },
    ));

    let unauthorized = Request::get("/status").body(Body::empty()).unwrap();
    let first = router.clone().oneshot(unauthorized).await.unwrap();
    let health = Request::get("/health").body(Body::empty()).unwrap();
    let second = router.oneshot(health).await.unwrap();

    assert_eq!(first.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_auth_bearer_prefix_only_rejected() {
    let (server, _guard) = create_auth_test_server("actual-key");

    let response = server
        .get("/status")
        .add_header(
            axum::http::header::AUTHORIZATION,
            "Bearer ".parse::<HeaderValue>().unwrap(),
        )
        .await;

    assert_eq!(response.status_code().as_u16(), 401);
}
