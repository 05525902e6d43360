//! Integration tests for the broker API

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use broker_common::catalog::{PERMISSIONLESS_PLAN_ID, SERVICE_ID, SHARED_PERMISSIONLESS_PLAN_ID};
use broker_common::TaskState;
use fabric_director::{DirectorDetails, MockDirector};
use fabric_service_broker::{create_router, AppState, MemoryRepository, Orchestrator};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

/// Helper to create a test app backed by the mock Director
fn create_test_app(networks: &[&str]) -> (Router, Arc<MockDirector>) {
    let director = Arc::new(MockDirector::new());
    let details = DirectorDetails {
        url: "http://127.0.0.1:25555".to_string(),
        stemcell_name: "bosh-warden-boshlite-ubuntu-trusty-go_agent".to_string(),
        director_uuid: "director-uuid".to_string(),
        vm_type: "small".to_string(),
        network_names: networks.iter().map(|n| n.to_string()).collect(),
        peer_data_dir: "/var/vcap/data/hyperledger/production".to_string(),
        docker_data_dir: "/var/vcap/data/docker".to_string(),
        skip_tls_verification: true,
    };
    let orchestrator = Orchestrator::new(
        director.clone(),
        Arc::new(MemoryRepository::new()),
        details,
    );

    (create_router(AppState { orchestrator }), director)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };

    (status, json)
}

fn provision_body(plan_id: &str) -> Value {
    json!({
        "service_id": SERVICE_ID,
        "plan_id": plan_id,
        "organization_guid": "org-guid",
        "space_guid": "space-guid"
    })
}

fn bind_body() -> Value {
    json!({
        "service_id": SERVICE_ID,
        "plan_id": PERMISSIONLESS_PLAN_ID,
        "app_guid": "app-guid"
    })
}

/// Provision `instance_id` and let the Director finish the deployment
async fn provision_done(app: &Router, director: &MockDirector, instance_id: &str) -> String {
    let (status, json) = send(
        app,
        "PUT",
        &format!("/v2/service_instances/{}?accepts_incomplete=true", instance_id),
        Some(provision_body(PERMISSIONLESS_PLAN_ID)),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let task_id = json["operation"].as_str().unwrap().to_string();
    director.set_task_state(&task_id, TaskState::Done);
    task_id
}

#[tokio::test]
async fn test_health_check() {
    let (app, _director) = create_test_app(&["net1"]);

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "fabric-service-broker");
}

#[tokio::test]
async fn test_catalog() {
    let (app, _director) = create_test_app(&["net1"]);

    let (status, json) = send(&app, "GET", "/v2/catalog", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["services"][0]["id"], SERVICE_ID);
    assert_eq!(json["services"][0]["bindable"], true);
    assert_eq!(json["services"][0]["plans"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_provision_requires_accepts_incomplete() {
    let (app, director) = create_test_app(&["net1"]);

    let (status, json) = send(
        &app,
        "PUT",
        "/v2/service_instances/abc",
        Some(provision_body(PERMISSIONLESS_PLAN_ID)),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "AsyncRequired");
    assert_eq!(director.create_calls(), 0);
}

#[tokio::test]
async fn test_provision_invalid_plan() {
    let (app, _director) = create_test_app(&["net1"]);

    let (status, json) = send(
        &app,
        "PUT",
        "/v2/service_instances/abc?accepts_incomplete=true",
        Some(provision_body("unknown-plan")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "InvalidServicePlan");
}

#[tokio::test]
async fn test_provision_and_poll() {
    let (app, director) = create_test_app(&["net1"]);

    let (status, json) = send(
        &app,
        "PUT",
        "/v2/service_instances/abc?accepts_incomplete=true",
        Some(provision_body(PERMISSIONLESS_PLAN_ID)),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let task_id = json["operation"].as_str().unwrap().to_string();
    assert!(director.has_deployment("fabric-abc"));

    let uri = format!(
        "/v2/service_instances/abc/last_operation?operation={}",
        task_id
    );
    let (status, json) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "in progress");

    director.set_task_state(&task_id, TaskState::Done);
    let (_, json) = send(&app, "GET", &uri, None).await;
    assert_eq!(json["state"], "succeeded");
    assert_eq!(json["description"], "Yipee, block chain is deployed");

    // Same id again
    let (status, json) = send(
        &app,
        "PUT",
        "/v2/service_instances/abc?accepts_incomplete=true",
        Some(provision_body(PERMISSIONLESS_PLAN_ID)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "ResourceAlreadyExists");
}

#[tokio::test]
async fn test_network_exhaustion() {
    let (app, director) = create_test_app(&["net1"]);
    provision_done(&app, &director, "first").await;

    let (status, json) = send(
        &app,
        "PUT",
        "/v2/service_instances/second?accepts_incomplete=true",
        Some(provision_body(PERMISSIONLESS_PLAN_ID)),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "NetworkUnavailable");
}

#[tokio::test]
async fn test_last_operation_errors() {
    let (app, director) = create_test_app(&["net1"]);

    let (status, json) = send(&app, "GET", "/v2/service_instances/abc/last_operation", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "MissingOperation");

    let (status, json) = send(
        &app,
        "GET",
        "/v2/service_instances/abc/last_operation?operation=1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(json, json!({}));

    provision_done(&app, &director, "abc").await;
    let (status, json) = send(
        &app,
        "GET",
        "/v2/service_instances/abc/last_operation?operation=424242",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "InvalidOperation");
}

#[tokio::test]
async fn test_bind_unbind_and_deprovision() {
    let (app, director) = create_test_app(&["net1"]);
    provision_done(&app, &director, "abc").await;

    let binding_uri = "/v2/service_instances/abc/service_bindings/b1";
    let (status, json) = send(&app, "PUT", binding_uri, Some(bind_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    let peers = json["credentials"]["peers"].as_array().unwrap();
    assert_eq!(peers.len(), 4);
    assert!(peers[0].as_str().unwrap().ends_with(":7050"));

    let (status, json) = send(&app, "PUT", binding_uri, Some(bind_body())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "ResourceAlreadyExists");

    let deprovision_uri = "/v2/service_instances/abc?accepts_incomplete=true";
    let (status, json) = send(&app, "DELETE", deprovision_uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "BindingExist");

    let (status, json) = send(&app, "DELETE", binding_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({}));

    let (status, _) = send(&app, "DELETE", binding_uri, None).await;
    assert_eq!(status, StatusCode::GONE);

    let (status, json) = send(&app, "DELETE", deprovision_uri, None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let task_id = json["operation"].as_str().unwrap().to_string();

    director.set_task_state(&task_id, TaskState::Done);
    let (status, json) = send(
        &app,
        "GET",
        &format!("/v2/service_instances/abc/last_operation?operation={}", task_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "succeeded");

    // The network is free again
    provision_done(&app, &director, "next").await;
}

#[tokio::test]
async fn test_bind_unknown_instance() {
    let (app, _director) = create_test_app(&["net1"]);

    let (status, json) = send(
        &app,
        "PUT",
        "/v2/service_instances/missing/service_bindings/b1",
        Some(bind_body()),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json, json!({}));
}

#[tokio::test]
async fn test_deprovision_unknown_instance_is_gone() {
    let (app, _director) = create_test_app(&["net1"]);

    let (status, json) = send(
        &app,
        "DELETE",
        "/v2/service_instances/missing?accepts_incomplete=true",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::GONE);
    assert_eq!(json, json!({}));
}

#[tokio::test]
async fn test_shared_deprovision_keeps_deployment() {
    let (app, director) = create_test_app(&["net1"]);

    for id in ["s1", "s2"] {
        let (status, _) = send(
            &app,
            "PUT",
            &format!("/v2/service_instances/{}?accepts_incomplete=true", id),
            Some(provision_body(SHARED_PERMISSIONLESS_PLAN_ID)),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }
    assert_eq!(director.create_calls(), 1);
    director.complete_all();

    let (status, json) = send(
        &app,
        "DELETE",
        "/v2/service_instances/s2?accepts_incomplete=true",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({}));
    assert_eq!(director.delete_calls(), 0);
    assert!(director.has_deployment("fabric-shared-permissionless"));
}
