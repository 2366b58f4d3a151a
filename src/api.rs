use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use utoipa::{OpenApi, ToSchema};

use crate::metrics::{MetricDefinition, Standard};
use crate::pipeline_error::PipelineError;
use crate::services::chart_renderer::{
    Annotation, Chart, HorizontalAlign, Point, ThresholdLine, VerticalAlign,
};
use crate::services::{PipelineService, ProcessedTable};
use crate::table::csv_export::PROCESSED_CSV_FILENAME;
use crate::table::Cell;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: PipelineService,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// upload_rejected, parse_failure, processing_failure, invalid_request, or internal
    pub kind: String,
}

#[derive(Serialize, ToSchema)]
pub struct ProcessedUploadResponse {
    pub uploaded_rows: usize,
    pub processed_rows: usize,
    pub columns: Vec<String>,
    /// Cleaned rows with the moving-average columns appended; missing values are null
    #[schema(value_type = Vec<Vec<Object>>)]
    pub rows: Vec<Vec<Cell>>,
    pub charts: Vec<Chart>,
    pub download_filename: String,
}

impl From<ProcessedTable> for ProcessedUploadResponse {
    fn from(processed: ProcessedTable) -> Self {
        Self {
            uploaded_rows: processed.uploaded_rows,
            processed_rows: processed.table.len(),
            columns: processed.table.columns().to_vec(),
            rows: processed.table.rows().to_vec(),
            charts: processed.charts,
            download_filename: PROCESSED_CSV_FILENAME.to_string(),
        }
    }
}

/// User-facing error with the HTTP status it maps to
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn invalid_request(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: message.into(),
                kind: "invalid_request".to_string(),
            },
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorResponse {
                error: message.into(),
                kind: "internal".to_string(),
            },
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match err {
            PipelineError::UploadRejected { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            PipelineError::ParseFailure(_) => StatusCode::BAD_REQUEST,
            PipelineError::ProcessingFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self {
            status,
            body: ErrorResponse {
                error: err.to_string(),
                kind: err.kind().to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, list_metrics, upload, upload_csv),
    components(schemas(
        HealthResponse,
        ErrorResponse,
        ProcessedUploadResponse,
        MetricDefinition,
        Standard,
        Chart,
        Point,
        ThresholdLine,
        Annotation,
        HorizontalAlign,
        VerticalAlign
    )),
    tags(
        (name = "uploads", description = "Effluent workbook cleaning, trends, and charts"),
        (name = "metrics", description = "Tracked pollutant metrics and their standards")
    )
)]
pub struct ApiDoc;

pub fn generate_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub fn create_router(state: AppState) -> Router {
    // one byte past the limit lets the pipeline report the oversized file itself
    let body_limit = state.pipeline.max_upload_bytes().saturating_add(1);

    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(list_metrics))
        .route("/uploads", post(upload))
        .route("/uploads/csv", post(upload_csv))
        .route("/openapi.json", get(openapi_json))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
#[instrument(skip(_state))]
async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    debug!("Health check requested");
    let response = HealthResponse {
        status: "healthy".to_string(),
    };
    (StatusCode::OK, Json(response))
}

#[utoipa::path(
    get,
    path = "/api/v1/metrics",
    tag = "metrics",
    responses((status = 200, description = "Configured metrics in chart order", body = Vec<MetricDefinition>))
)]
#[instrument(skip(state))]
async fn list_metrics(State(state): State<AppState>) -> Json<Vec<MetricDefinition>> {
    let metrics = state.pipeline.metrics().to_vec();
    debug!("Listing {} configured metrics", metrics.len());
    Json(metrics)
}

/// Take the buffered upload, reporting an over-limit body as a rejected upload
fn upload_body(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Bytes, ApiError> {
    body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            let limit = state.pipeline.max_upload_bytes();
            let size = headers
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(limit.saturating_add(1));
            warn!("Upload body exceeded the {} byte limit", limit);
            ApiError::from(PipelineError::UploadRejected { size, limit })
        } else {
            error!("Failed to read upload body: {}", rejection.body_text());
            ApiError::invalid_request(rejection.status(), rejection.body_text())
        }
    })
}

/// Run the synchronous pipeline on the blocking pool
async fn run_pipeline(state: &AppState, body: Bytes) -> Result<ProcessedTable, ApiError> {
    let pipeline = state.pipeline.clone();
    tokio::task::spawn_blocking(move || pipeline.process_upload(&body))
        .await
        .map_err(|e| {
            error!("Pipeline task failed: {}", e);
            ApiError::internal("Error processing the uploaded file: worker task failed")
        })?
        .map_err(ApiError::from)
}

#[utoipa::path(
    post,
    path = "/api/v1/uploads",
    tag = "uploads",
    request_body(
        content = String,
        content_type = "application/octet-stream",
        description = "Raw bytes of an .xlsx workbook (first sheet) or a CSV file"
    ),
    responses(
        (status = 200, description = "Cleaned table, moving averages, and charts", body = ProcessedUploadResponse),
        (status = 400, description = "File could not be read as a table", body = ErrorResponse),
        (status = 413, description = "File exceeds the upload size limit", body = ErrorResponse),
        (status = 422, description = "Table could not be processed", body = ErrorResponse)
    )
)]
#[instrument(skip(state, headers, body))]
async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ProcessedUploadResponse>, ApiError> {
    let body = upload_body(&state, &headers, body)?;
    let processed = run_pipeline(&state, body).await?;

    info!(
        "Processed upload: {} rows uploaded, {} kept, {} charts",
        processed.uploaded_rows,
        processed.table.len(),
        processed.charts.len()
    );
    Ok(Json(processed.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/uploads/csv",
    tag = "uploads",
    request_body(
        content = String,
        content_type = "application/octet-stream",
        description = "Raw bytes of an .xlsx workbook (first sheet) or a CSV file"
    ),
    responses(
        (status = 200, description = "processed_data.csv download", body = String, content_type = "text/csv"),
        (status = 400, description = "File could not be read as a table", body = ErrorResponse),
        (status = 413, description = "File exceeds the upload size limit", body = ErrorResponse),
        (status = 422, description = "Table could not be processed", body = ErrorResponse)
    )
)]
#[instrument(skip(state, headers, body))]
async fn upload_csv(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let body = upload_body(&state, &headers, body)?;
    let processed = run_pipeline(&state, body).await?;

    let csv = processed.to_csv().map_err(|e| {
        error!("Failed to export processed table: {}", e);
        ApiError::internal(format!("Error exporting the processed data: {e}"))
    })?;

    info!("Exported {} CSV bytes for download", csv.len());
    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{PROCESSED_CSV_FILENAME}\""),
        ),
    ];
    Ok((StatusCode::OK, headers, csv).into_response())
}

#[instrument(skip(_state))]
async fn openapi_json(State(_state): State<AppState>) -> Json<utoipa::openapi::OpenApi> {
    Json(generate_openapi_spec())
}
