//! HTTP API for booksync.

pub mod config;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use booksync_sync::{BookSync, ErrorCategory, SyncError};
use booksync_types::{
    BookRecord, DestinationField, FieldMapping, MappingEdit, Scope, SyncResult, SyncStatus,
    UpsertOperation, ValidationReport,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Shared state behind every handler.
pub struct AppState {
    pub service: BookSync,
    /// Mapping scope of the configured table.
    pub scope: Scope,
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub category: Option<ErrorCategory>,
    pub message: String,
}

/// Error returned by handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    category: Option<ErrorCategory>,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            category: Some(ErrorCategory::InvalidInput),
            message: message.into(),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        let category = err.category();
        let status = match category {
            ErrorCategory::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Credentials => StatusCode::UNAUTHORIZED,
            ErrorCategory::Network => StatusCode::BAD_GATEWAY,
            ErrorCategory::Configuration => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            category: Some(category),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.status.as_u16(),
            category: self.category,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct IsbnQuery {
    pub isbn: Option<String>,
}

/// Response of the `/isbn` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsbnResponse {
    pub code: u16,
    pub message: String,
    pub book: BookRecord,
    pub result: SyncResult,
}

#[derive(Debug, Deserialize)]
pub struct SchemaQuery {
    #[serde(default)]
    pub refresh: bool,
}

/// Body of `/api/v1/validate` and `/api/v1/sync`. Without a mapping the
/// stored one is used.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordRequest {
    pub record: BookRecord,
    #[serde(default)]
    pub mapping: Option<FieldMapping>,
}

fn summary(result: &SyncResult) -> String {
    match (result.status, result.operation) {
        (SyncStatus::Succeeded, Some(UpsertOperation::Updated)) => "book updated".to_string(),
        (SyncStatus::Succeeded, _) => "book added".to_string(),
        (SyncStatus::PartiallySucceeded, _) => {
            "book synced, some fields were rejected".to_string()
        }
        (SyncStatus::Failed, _) => result
            .failure
            .as_ref()
            .map_or_else(|| "sync failed".to_string(), |f| f.reason.clone()),
    }
}

async fn index() -> &'static str {
    "booksync is running. Use /isbn?isbn=<ISBN> to look up a book and sync it."
}

async fn isbn_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IsbnQuery>,
) -> ApiResult<IsbnResponse> {
    let isbn = query
        .isbn
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("missing isbn parameter"))?;

    info!("ISBN request: {}", isbn);
    let outcome = state.service.sync_isbn(&state.scope, &isbn).await?;

    Ok(Json(IsbnResponse {
        code: StatusCode::OK.as_u16(),
        message: summary(&outcome.result),
        book: outcome.book,
        result: outcome.result,
    }))
}

async fn schema_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SchemaQuery>,
) -> ApiResult<Vec<DestinationField>> {
    Ok(Json(state.service.get_schema(query.refresh).await?))
}

async fn get_mapping(State(state): State<Arc<AppState>>) -> ApiResult<FieldMapping> {
    Ok(Json(state.service.load_mapping(&state.scope)?))
}

async fn put_mapping(
    State(state): State<Arc<AppState>>,
    Json(mapping): Json<FieldMapping>,
) -> ApiResult<FieldMapping> {
    state.service.save_mapping(&state.scope, &mapping)?;
    Ok(Json(mapping))
}

/// Applies a list of edits to the stored mapping.
async fn patch_mapping(
    State(state): State<Arc<AppState>>,
    Json(edits): Json<Vec<MappingEdit>>,
) -> ApiResult<FieldMapping> {
    Ok(Json(state.service.edit_mapping(&state.scope, edits)?))
}

async fn validate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RecordRequest>,
) -> ApiResult<ValidationReport> {
    let mapping = match request.mapping {
        Some(mapping) => mapping,
        None => state.service.load_mapping(&state.scope)?,
    };
    Ok(Json(state.service.validate(&request.record, &mapping).await?))
}

async fn sync_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RecordRequest>,
) -> ApiResult<SyncResult> {
    let mapping = match request.mapping {
        Some(mapping) => mapping,
        None => state.service.load_mapping(&state.scope)?,
    };
    Ok(Json(state.service.sync(request.record, mapping).await?))
}

/// Build the HTTP router with the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/isbn", get(isbn_handler))
        .route("/api/v1/schema", get(schema_handler))
        .route(
            "/api/v1/mapping",
            get(get_mapping).put(put_mapping).patch(patch_mapping),
        )
        .route("/api/v1/validate", post(validate_handler))
        .route("/api/v1/sync", post(sync_handler))
        .with_state(state)
}
