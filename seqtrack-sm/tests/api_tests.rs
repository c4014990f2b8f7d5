//! Integration tests for seqtrack-sm API endpoints
//!
//! Each test builds the router over a fresh in-memory SQLite database and
//! drives it with `oneshot` requests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use seqtrack_common::events::EventBus;
use seqtrack_sm::{build_router, AppState};
use sqlx::sqlite::SqlitePoolOptions;
use tower::util::ServiceExt; // for `oneshot` method
use uuid::Uuid;

/// Test helper: in-memory database with tables created
async fn setup_app() -> Router {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Should open in-memory database");
    seqtrack_sm::db::init_tables(&pool)
        .await
        .expect("Should create tables");

    build_router(AppState::new(pool, EventBus::new(100), 4))
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn create_sample(app: &Router, name: &str) -> Value {
    let (status, body) = send(app, json_request("POST", "/samples", json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app().await;

    let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "seqtrack-sm");
    assert!(body["version"].is_string());
}

// =============================================================================
// Samples
// =============================================================================

#[tokio::test]
async fn test_create_and_get_sample() {
    let app = setup_app().await;
    let created = create_sample(&app, "NP-0001").await;

    assert_eq!(created["status"], "submitted");
    assert_eq!(created["priority"], "normal");

    let id = created["id"].as_str().unwrap();
    let (status, body) = send(&app, empty_request("GET", &format!("/samples/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, created);
}

#[tokio::test]
async fn test_create_sample_with_blank_name_rejected() {
    let app = setup_app().await;
    let (status, body) = send(&app, json_request("POST", "/samples", json!({ "name": "  " }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_get_missing_sample_is_404() {
    let app = setup_app().await;
    let (status, body) =
        send(&app, empty_request("GET", &format!("/samples/{}", Uuid::new_v4()))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let app = setup_app().await;
    let a = create_sample(&app, "A").await;
    create_sample(&app, "B").await;

    let id = a["id"].as_str().unwrap();
    let (status, _) = send(
        &app,
        json_request("PUT", &format!("/samples/{id}/status"), json!({ "status": "prep" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, all) = send(&app, empty_request("GET", "/samples")).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, prep) = send(&app, empty_request("GET", "/samples?status=prep")).await;
    let prep = prep.as_array().unwrap();
    assert_eq!(prep.len(), 1);
    assert_eq!(prep[0]["name"], "A");
}

#[tokio::test]
async fn test_update_and_assign_sample() {
    let app = setup_app().await;
    let sample = create_sample(&app, "S").await;
    let id = sample["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        json_request("PUT", &format!("/samples/{id}"), json!({ "priority": "urgent" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["priority"], "urgent");
    assert_eq!(body["name"], "S");

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            &format!("/samples/{id}/assign"),
            json!({ "assigned_to": "alice", "library_prep_by": "bob" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["assigned_to"], "alice");
    assert_eq!(body["library_prep_by"], "bob");
    assert_eq!(body["priority"], "urgent");
}

#[tokio::test]
async fn test_delete_sample() {
    let app = setup_app().await;
    let sample = create_sample(&app, "S").await;
    let id = sample["id"].as_str().unwrap();

    let (status, _) = send(&app, empty_request("DELETE", &format!("/samples/{id}"))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, empty_request("DELETE", &format!("/samples/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Bulk operations
// =============================================================================

#[tokio::test]
async fn test_bulk_update_status_reports_missing_item() {
    let app = setup_app().await;
    let a = create_sample(&app, "A").await;
    let c = create_sample(&app, "C").await;
    let missing = Uuid::new_v4();

    let (status, report) = send(
        &app,
        json_request(
            "POST",
            "/samples/bulk",
            json!({
                "operation_kind": "update_status",
                "target_ids": [a["id"], missing, c["id"]],
                "payload": { "status": "prep" }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["succeeded_ids"].as_array().unwrap().len(), 2);
    let failed = report["failed"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["id"], missing.to_string());
    assert_eq!(failed[0]["error"], "not_found");
}

#[tokio::test]
async fn test_bulk_assign_lab_without_lab_name_is_400() {
    let app = setup_app().await;
    let a = create_sample(&app, "A").await;
    let id = a["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/samples/bulk",
            json!({
                "operation_kind": "assign_lab",
                "target_ids": [id],
                "payload": { "submitter_name": "Dr. Lee" }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (_, unchanged) = send(&app, empty_request("GET", &format!("/samples/{id}"))).await;
    assert_eq!(unchanged, a);
}

#[tokio::test]
async fn test_bulk_batch_process_with_notes() {
    let app = setup_app().await;
    let a = create_sample(&app, "A").await;
    let b = create_sample(&app, "B").await;

    let (status, report) = send(
        &app,
        json_request(
            "POST",
            "/samples/bulk",
            json!({
                "operation_kind": "batch_process",
                "target_ids": [a["id"], b["id"], a["id"]],
                "payload": { "priority": "high", "lab_name": "Core Lab", "batch_notes": "batch 7" }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["succeeded_ids"].as_array().unwrap().len(), 2);

    let id = b["id"].as_str().unwrap();
    let (_, updated) = send(&app, empty_request("GET", &format!("/samples/{id}"))).await;
    assert_eq!(updated["priority"], "high");
    assert_eq!(updated["lab_name"], "Core Lab");
    assert_eq!(updated["notes"], "batch 7");
}

// =============================================================================
// Processing steps
// =============================================================================

#[tokio::test]
async fn test_default_steps_created_once() {
    let app = setup_app().await;
    let sample = create_sample(&app, "S").await;
    let id = sample["id"].as_str().unwrap();
    let uri = format!("/samples/{id}/steps");

    let (status, first) = send(&app, empty_request("POST", &uri)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = send(&app, empty_request("POST", &uri)).await;
    assert_eq!(first, second);

    let names: Vec<&str> = first
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["step_name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "sample_qc",
            "library_prep",
            "library_qc",
            "sequencing_setup",
            "sequencing_run",
            "basecalling",
            "quality_assessment",
            "data_delivery"
        ]
    );

    let (_, listed) = send(&app, empty_request("GET", &uri)).await;
    assert_eq!(listed, first);
}

#[tokio::test]
async fn test_step_lifecycle_and_conflict() {
    let app = setup_app().await;
    let sample = create_sample(&app, "S").await;
    let id = sample["id"].as_str().unwrap();
    let (_, steps) = send(&app, empty_request("POST", &format!("/samples/{id}/steps"))).await;
    let step_id = steps[0]["id"].as_str().unwrap();

    let (status, started) = send(
        &app,
        json_request("POST", &format!("/steps/{step_id}/start"), json!({ "assigned_to": "tech-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["step_status"], "in_progress");
    assert_eq!(started["assigned_to"], "tech-1");

    let (status, body) = send(
        &app,
        json_request("POST", &format!("/steps/{step_id}/start"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("step already started"));

    let (status, completed) = send(
        &app,
        json_request(
            "POST",
            &format!("/steps/{step_id}/complete"),
            json!({ "notes": "RIN 8.2", "results_data": { "rin": 8.2 } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["step_status"], "completed");
    assert_eq!(completed["results_data"]["rin"], 8.2);
    assert!(completed["actual_duration_hours"].is_number());

    let (status, _) = send(
        &app,
        json_request("POST", &format!("/steps/{step_id}/skip"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_complete_pending_step_is_conflict() {
    let app = setup_app().await;
    let sample = create_sample(&app, "S").await;
    let id = sample["id"].as_str().unwrap();
    let (_, steps) = send(&app, empty_request("POST", &format!("/samples/{id}/steps"))).await;
    let step_id = steps[3]["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        json_request("POST", &format!("/steps/{step_id}/complete"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_patch_step_in_any_state() {
    let app = setup_app().await;
    let sample = create_sample(&app, "S").await;
    let id = sample["id"].as_str().unwrap();
    let (_, steps) = send(&app, empty_request("POST", &format!("/samples/{id}/steps"))).await;
    let step_id = steps[5]["id"].as_str().unwrap();

    send(&app, json_request("POST", &format!("/steps/{step_id}/fail"), json!({ "notes": "pore blockage" }))).await;

    let (status, patched) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/steps/{step_id}"),
            json!({ "estimated_duration_hours": 6 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["step_status"], "failed");
    assert_eq!(patched["estimated_duration_hours"], 6);
    assert_eq!(patched["notes"], "pore blockage");
}

#[tokio::test]
async fn test_stats_endpoint() {
    let app = setup_app().await;
    create_sample(&app, "A").await;
    create_sample(&app, "B").await;

    let (status, stats) = send(&app, empty_request("GET", "/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_samples"], 2);
    assert_eq!(stats["status_breakdown"]["submitted"], 2);
    assert_eq!(stats["priority_breakdown"]["normal"], 2);
}
