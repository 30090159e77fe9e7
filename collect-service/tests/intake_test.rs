mod support;

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use collect_core::db::SnapshotStore;
use collect_core::queue::QueueSubstrate;
use serde_json::json;
use support::{basic_auth_header, build_test_state, register_system, router, InMemoryQueue, InMemoryStore};

fn test_server() -> (TestServer, Arc<InMemoryStore>, Arc<InMemoryQueue>, support::TestSystem) {
    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(InMemoryQueue::new());
    let system = register_system(&store, "edge-01", "tenant-a", "correct-horse-battery-staple");

    let state = build_test_state(store.clone(), queue.clone());
    let server = TestServer::new(router(state)).unwrap();
    (server, store, queue, system)
}

#[tokio::test]
async fn submit_inventory_requires_authentication() {
    let (server, _store, _queue, _system) = test_server();

    let response = server
        .post("/api/systems/inventory")
        .json(&json!({ "data": { "os": "rhel9" } }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn submit_inventory_rejects_wrong_secret() {
    let (server, _store, _queue, system) = test_server();

    let response = server
        .post("/api/systems/inventory")
        .add_header("Authorization", basic_auth_header(&system.system_id, "wrong-secret"))
        .json(&json!({ "data": { "os": "rhel9" } }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn submit_inventory_accepts_valid_payload_and_enqueues() {
    let (server, _store, queue, system) = test_server();

    let response = server
        .post("/api/systems/inventory")
        .add_header("Authorization", basic_auth_header(&system.system_id, &system.secret))
        .json(&json!({ "data": { "os": "rhel9", "kernel": "5.14" } }))
        .await;

    response.assert_status(StatusCode::ACCEPTED);

    let stats = queue.stats(collect_core::domain::QueueFamily::Inventory).await.unwrap();
    assert_eq!(stats.depth, 1);
}

#[tokio::test]
async fn submit_inventory_rejects_missing_data() {
    let (server, _store, _queue, system) = test_server();

    let response = server
        .post("/api/systems/inventory")
        .add_header("Authorization", basic_auth_header(&system.system_id, &system.secret))
        .json(&json!({}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submit_inventory_rejects_null_data() {
    let (server, _store, _queue, system) = test_server();

    let response = server
        .post("/api/systems/inventory")
        .add_header("Authorization", basic_auth_header(&system.system_id, &system.secret))
        .json(&json!({ "data": null }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn heartbeat_upserts_and_acknowledges() {
    let (server, store, _queue, system) = test_server();

    let response = server
        .post("/api/systems/heartbeat")
        .add_header("Authorization", basic_auth_header(&system.system_id, &system.secret))
        .await;

    response.assert_status(StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert!(body["acknowledged_at"].is_string());

    let tenant_system_id = format!("{}:{}", system.tenant_id, system.system_id);
    let recorded = store.get_heartbeat(&tenant_system_id).await.unwrap();
    assert!(recorded.is_some());
}

#[tokio::test]
async fn submit_inventory_rejects_oversized_payload() {
    let (server, _store, queue, system) = test_server();

    let big = "x".repeat(64);
    let response = server
        .post("/api/systems/inventory")
        .add_header("Authorization", basic_auth_header(&system.system_id, &system.secret))
        .add_header("Content-Length", "999999999")
        .json(&json!({ "data": { "blob": big } }))
        .await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let stats = queue.stats(collect_core::domain::QueueFamily::Inventory).await.unwrap();
    assert_eq!(stats.depth, 0);
}

#[tokio::test]
async fn submit_inventory_fails_fast_when_circuit_is_open() {
    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(InMemoryQueue::new());
    let system = register_system(&store, "edge-02", "tenant-b", "correct-horse-battery-staple");

    let state = build_test_state(store, queue);
    // Drive the shared circuit breaker open the same way a Batch Persister
    // flush failure would, then confirm Intake fails the same request
    // without ever attempting to enqueue.
    for _ in 0..state.config.circuit_max_failures {
        state.circuit.record_failure().await;
    }
    assert!(state.circuit.is_open().await);

    let server = TestServer::new(router(state)).unwrap();

    let response = server
        .post("/api/systems/inventory")
        .add_header("Authorization", basic_auth_header(&system.system_id, &system.secret))
        .json(&json!({ "data": { "os": "rhel9" } }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn disabled_system_is_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(InMemoryQueue::new());
    let system = register_system(&store, "edge-disabled", "tenant-a", "secret");
    store.disable_system(&system.system_id);

    let state = build_test_state(store, queue);
    let server = TestServer::new(router(state)).unwrap();

    let response = server
        .post("/api/systems/heartbeat")
        .add_header("Authorization", basic_auth_header(&system.system_id, &system.secret))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}
