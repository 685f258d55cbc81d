//! HTTP surface tests driven through the router with `tower::ServiceExt::oneshot`.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::TestHarness;
use provisioning_core::config::WebConfig;
use provisioning_core::models::{DeploymentStatus, TenantInstance};
use provisioning_core::web::{create_app, AppState};

fn app(h: &TestHarness) -> Router {
    create_app(AppState::new(
        h.orchestrator.clone(),
        WebConfig::default(),
        "test",
    ))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: Method, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn provision(app: &Router, instance: &TenantInstance) -> (StatusCode, Value) {
    send(
        app,
        json_request(
            Method::POST,
            &format!("/tenant-instances/{}/provision", instance.id),
            json!({
                "plan": "standard",
                "adminEmail": "admin@acme.test",
                "features": {"sso": true},
                "initiatedBy": "ops@acme.test"
            }),
            None,
        ),
    )
    .await
}

#[tokio::test]
async fn test_health() {
    let h = TestHarness::with_auth();
    let (status, body) = send(&app(&h), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["environment"], "test");
    assert_eq!(body["messageBus"], "in_memory");
    assert_eq!(body["authEnabled"], true);
}

#[tokio::test]
async fn test_provision_returns_accepted_and_status_is_queryable() {
    let h = TestHarness::with_auth();
    let app = app(&h);
    let instance = h.instance(DeploymentStatus::Pending);

    let (status, created) = provision(&app, &instance).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(created["status"], "Queued");
    assert_eq!(created["taskType"], "TenantProvision");
    let task_id = created["taskId"].as_str().unwrap().to_string();

    let (status, task) = send(&app, get(&format!("/tasks/{task_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["taskId"], task_id.as_str());
    assert_eq!(task["progress"], 0);
    assert_eq!(task["retryCount"], 0);
    assert_eq!(task["maxRetries"], 3);
    assert_eq!(task["stepsCompleted"], json!([]));
}

#[tokio::test]
async fn test_unknown_task_and_instance_are_not_found() {
    let h = TestHarness::new();
    let app = app(&h);

    let (status, body) = send(&app, get("/tasks/tp_does_not_exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let ghost = TenantInstance::new(uuid::Uuid::new_v4(), "ghost", "us-east-1", DeploymentStatus::Pending);
    let (status, _) = provision(&app, &ghost).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_enqueue_requests() {
    let h = TestHarness::new();
    let app = app(&h);
    let active = h.instance(DeploymentStatus::Active);

    let (status, body) = provision(&app, &active).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, body) = send(
        &app,
        json_request(
            Method::PUT,
            &format!("/tenant-instances/{}/features", active.id),
            json!({"features": {}, "initiatedBy": "ops"}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_bus_outage_is_service_unavailable() {
    let h = TestHarness::new();
    let app = app(&h);
    let instance = h.instance(DeploymentStatus::Pending);
    h.bus.set_available(false);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/tenant-instances/{}/provision", instance.id),
            json!({
                "plan": "standard",
                "adminEmail": "admin@acme.test",
                "initiatedBy": "ops@acme.test"
            }),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()[header::RETRY_AFTER], "5");
}

#[tokio::test]
async fn test_callbacks_require_service_token() {
    let h = TestHarness::with_auth();
    let app = app(&h);
    let instance = h.instance(DeploymentStatus::Pending);
    let (_, created) = provision(&app, &instance).await;
    let task_id = created["taskId"].as_str().unwrap();
    let uri = format!("/internal/tasks/{task_id}/status");
    let report = json!({"status": "Processing", "progress": 40, "currentStep": "schema"});

    let (status, body) = send(&app, json_request(Method::POST, &uri, report.clone(), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = send(
        &app,
        json_request(Method::POST, &uri, report.clone(), Some("not-a-jwt")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let billing = h.billing_worker_token();
    let (status, body) = send(
        &app,
        json_request(Method::POST, &uri, report.clone(), Some(&billing)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let worker = h.provisioning_worker_token();
    let (status, body) = send(&app, json_request(Method::POST, &uri, report, Some(&worker))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], true);
    assert_eq!(body["task"]["status"], "Processing");
    assert_eq!(body["task"]["currentStep"], "schema");
}

#[tokio::test]
async fn test_worker_callback_flow_over_http() {
    let h = TestHarness::with_auth();
    let app = app(&h);
    let instance = h.instance(DeploymentStatus::Pending);
    let (_, created) = provision(&app, &instance).await;
    let task_id = created["taskId"].as_str().unwrap();
    let token = h.provisioning_worker_token();
    let callback = |path: &str, body: Value| {
        json_request(
            Method::POST,
            &format!("/internal/tasks/{task_id}/{path}"),
            body,
            Some(&token),
        )
    };

    let report = json!({"status": "Processing", "progress": 50});
    let (_, first) = send(&app, callback("status", report.clone())).await;
    let (status, second) = send(&app, callback("status", report)).await;
    assert_eq!(first["applied"], true);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["applied"], false);
    assert_eq!(second["ignoredReason"], "duplicate");

    let (status, _) = send(&app, callback("steps", json!({"step": "create_schema"}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, callback("heartbeat", Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], true);

    let (_, done) = send(&app, callback("complete", Value::Null)).await;
    assert_eq!(done["task"]["status"], "Completed");
    assert_eq!(done["task"]["progress"], 100);

    let (status, late) = send(&app, callback("fail", json!({"errorMessage": "late"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(late["applied"], false);
    assert_eq!(late["ignoredReason"], "terminal_state");

    let (_, history) = send(&app, get(&format!("/tasks/{task_id}/history"))).await;
    assert_eq!(history.as_array().map(Vec::len), Some(2));
    assert_eq!(h.instance_status(&instance).await, DeploymentStatus::Active);
}

#[tokio::test]
async fn test_out_of_range_progress_is_bad_request() {
    let h = TestHarness::with_auth();
    let app = app(&h);
    let instance = h.instance(DeploymentStatus::Pending);
    let (_, created) = provision(&app, &instance).await;
    let task_id = created["taskId"].as_str().unwrap();
    let token = h.provisioning_worker_token();

    for progress in [101, 300] {
        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                &format!("/internal/tasks/{task_id}/status"),
                json!({"status": "Processing", "progress": progress}),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    let (_, task) = send(&app, get(&format!("/tasks/{task_id}"))).await;
    assert_eq!(task["status"], "Queued");
}

#[tokio::test]
async fn test_retry_and_cancel_endpoints() {
    let h = TestHarness::new();
    let app = app(&h);
    let instance = h.instance(DeploymentStatus::Pending);
    let (_, created) = provision(&app, &instance).await;
    let task_id = created["taskId"].as_str().unwrap();

    let (status, _) = send(
        &app,
        json_request(Method::POST, &format!("/tasks/{task_id}/retry"), Value::Null, None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/internal/tasks/{task_id}/fail"),
            json!({"errorMessage": "db unreachable"}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, retried) = send(
        &app,
        json_request(Method::POST, &format!("/tasks/{task_id}/retry"), Value::Null, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(retried["status"], "Queued");
    assert_eq!(retried["retryCount"], 1);

    let (status, cancelled) = send(
        &app,
        json_request(Method::POST, &format!("/tasks/{task_id}/cancel"), Value::Null, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "Cancelled");

    let (status, _) = send(
        &app,
        json_request(Method::POST, &format!("/tasks/{task_id}/cancel"), Value::Null, None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
