// API integration tests that verify HTTP endpoints
// Tests the actual Axum router with in-memory requests

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use effluent_trend_service::api::{create_router, AppState};
use effluent_trend_service::services::PipelineService;
use http_body_util::BodyExt; // For `.collect()`
use serde_json::Value;
use tower::ServiceExt; // For `oneshot`

fn create_test_app(pipeline: PipelineService) -> axum::Router {
    create_router(AppState { pipeline })
}

fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(PipelineService::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_endpoint_lists_configured_metrics() {
    let app = create_test_app(common::four_metric_pipeline());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let metrics = json.as_array().unwrap();
    assert_eq!(metrics.len(), 4);
    assert_eq!(metrics[0]["name"], "COD F/D");
    assert_eq!(metrics[0]["unit"], "mg/L");
    assert_eq!(metrics[0]["window"], 5);
    assert_eq!(metrics[0]["standards"][0]["value"], 80.0);
    assert_eq!(metrics[0]["standards"][0]["color"], "#0000ff");
}

#[tokio::test]
async fn test_upload_returns_processed_table_and_charts() {
    let app = create_test_app(PipelineService::default());

    let response = app
        .oneshot(upload_request("/api/v1/uploads", common::sample_workbook_bytes()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["uploaded_rows"], 12);
    assert_eq!(json["processed_rows"], 10);
    assert_eq!(json["download_filename"], "processed_data.csv");
    assert_eq!(json["columns"].as_array().unwrap().len(), 6);

    let rows = json["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0][0], "2024-01-01T00:00:00");
    assert_eq!(rows[0][1], 72.0);
    assert!(rows[0][5].is_null());
    assert_eq!(rows[4][5], 84.0);

    let chart = &json["charts"][0];
    assert_eq!(chart["metric"], "COD F/D");
    assert_eq!(chart["annotations"][0]["horizontal_align"], "right");
    assert_eq!(chart["annotations"][0]["vertical_align"], "bottom");
    assert!(chart["svg"].as_str().unwrap().contains("<svg"));
}

#[tokio::test]
async fn test_upload_too_large() {
    let app = create_test_app(PipelineService::default());

    let response = app
        .oneshot(upload_request("/api/v1/uploads", vec![b'x'; 60_001]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "upload_rejected");
    assert!(json["error"].as_str().unwrap().contains("50000 byte limit"));
}

#[tokio::test]
async fn test_upload_past_body_limit_is_json_rejection() {
    let app = create_test_app(PipelineService::default());
    let body = vec![b'x'; 3_000_000];
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/uploads/csv")
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "upload_rejected");
    let message = json["error"].as_str().unwrap();
    assert!(message.contains("3000000 bytes"));
    assert!(message.contains("50000 byte limit"));
}

#[tokio::test]
async fn test_upload_unreadable_file() {
    let app = create_test_app(PipelineService::default());

    let response = app
        .oneshot(upload_request("/api/v1/uploads", vec![0xff, 0xfe, 0x00, 0x81]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "parse_failure");
}

#[tokio::test]
async fn test_upload_processing_failure() {
    let app = create_test_app(PipelineService::default());
    let csv = b"Date,COD F/D\n2024-01-01,72\nyesterday,80\n".to_vec();

    let response = app
        .oneshot(upload_request("/api/v1/uploads", csv))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "processing_failure");
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Error processing the data:"));
}

#[tokio::test]
async fn test_csv_download() {
    let app = create_test_app(PipelineService::default());

    let response = app
        .oneshot(upload_request(
            "/api/v1/uploads/csv",
            common::sample_workbook_bytes(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"processed_data.csv\""
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("Date,COD F/D,SS F/D,BOD F/D,Zn F/D,COD F/D_MA"));
    assert_eq!(lines.next(), Some("2024-01-01 00:00:00,72,38,14,0.8,"));
    assert_eq!(text.lines().count(), 11);
}

#[tokio::test]
async fn test_openapi_document() {
    let app = create_test_app(PipelineService::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/api/v1/uploads"]["post"].is_object());
    assert!(json["paths"]["/api/v1/uploads/csv"]["post"].is_object());
    assert!(json["components"]["schemas"]["Chart"].is_object());
}
