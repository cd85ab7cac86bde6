//! # API REST
//!
//! HTTP surface for Depot.
//!
//! Handles:
//! - HTTP endpoints with axum (upload, list, download, delete, health)
//! - The embedded browser client served at `/`
//! - The OpenAPI document at `/api-docs/openapi.json`
//! - REST-specific concerns (multipart spooling, JSON serialisation, CORS, security headers)
//!
//! Storage semantics live in `depot_files`; configuration and upload limits in `depot-core`.

#![warn(rust_2018_idioms)]

mod error;
mod upload;

pub use error::{ApiError, ApiResult};

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path as AxumPath, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{Html, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use depot_core::CoreConfig;
use depot_files::{FileRecord, FilesError, FilesService};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Application state for the REST API server
///
/// Built once at startup; handlers only ever see shared references.
#[derive(Clone)]
pub struct AppState {
    cfg: Arc<CoreConfig>,
    files: Arc<FilesService>,
}

impl AppState {
    /// Opens the storage root named by `cfg` and wraps both in shared state.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidRootDirectory` if the storage root cannot be prepared.
    pub fn from_config(cfg: Arc<CoreConfig>) -> Result<Self, FilesError> {
        let files = FilesService::new(cfg.upload_dir(), cfg.max_file_size())?;
        Ok(Self {
            cfg,
            files: Arc::new(files),
        })
    }

    pub fn files(&self) -> &FilesService {
        &self.files
    }
}

/// A stored file as presented to clients
#[derive(Debug, Serialize, ToSchema)]
pub struct FileRecordRes {
    /// Storage name; the identifier for download and delete
    pub filename: String,
    #[serde(rename = "originalName")]
    pub original_name: String,
    /// Size in bytes
    pub size: u64,
    /// RFC 3339 upload timestamp
    #[serde(rename = "uploadDate")]
    pub upload_date: String,
}

impl From<&FileRecord> for FileRecordRes {
    fn from(record: &FileRecord) -> Self {
        Self {
            filename: record.storage_name.clone(),
            original_name: record.original_name.clone(),
            size: record.size_bytes,
            upload_date: timestamp(record.uploaded_at),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthRes {
    pub status: String,
    pub timestamp: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, upload_files, list_files, download_file, delete_file),
    components(schemas(FileRecordRes, HealthRes))
)]
struct ApiDoc;

/// Builds the application router.
///
/// Every response, including the 404 fallback, carries the security headers.
pub fn router(state: AppState) -> Router {
    let body_limit = state.cfg.upload_limits().max_request_bytes();

    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload_files))
        .route("/files", get(list_files))
        .route("/download/:name", get(download_file))
        .route("/delete/:name", delete(delete_file))
        .route("/health", get(health))
        .route("/api-docs/openapi.json", get(openapi))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(add_security_headers))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        status: "OK".into(),
        timestamp: timestamp(Utc::now()),
    })
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(
        content = String,
        content_type = "multipart/form-data",
        description = "One or more file parts under the `files` field"
    ),
    responses(
        (status = 200, description = "Stored files, in upload order", body = [FileRecordRes]),
        (status = 400, description = "No files, too many files, file too large or bad filename"),
        (status = 500, description = "Upload processing failed")
    )
)]
/// Upload a batch of files
///
/// Parts are spooled and checked against the upload limits before anything is written to the
/// storage root.
async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Vec<FileRecordRes>>> {
    let limits = state.cfg.upload_limits();
    let parts = upload::spool_parts(&mut multipart, &limits, state.cfg.staging_dir()).await?;

    let items = parts
        .into_iter()
        .map(upload::SpooledPart::into_store_item)
        .collect();
    let records = state
        .files
        .store(items)
        .await
        .map_err(|e| ApiError::from_store(e, limits.max_file_size()))?;

    Ok(Json(records.iter().map(FileRecordRes::from).collect()))
}

#[utoipa::path(
    get,
    path = "/files",
    responses(
        (status = 200, description = "Stored files, newest first", body = [FileRecordRes]),
        (status = 500, description = "Internal server error")
    )
)]
/// List all stored files, newest first
async fn list_files(State(state): State<AppState>) -> ApiResult<Json<Vec<FileRecordRes>>> {
    let records = state.files.list().await.map_err(|e| {
        tracing::error!("Listing files failed: {}", e);
        ApiError::ListFailed
    })?;

    Ok(Json(records.iter().map(FileRecordRes::from).collect()))
}

#[utoipa::path(
    get,
    path = "/download/{name}",
    params(("name" = String, Path, description = "Storage name")),
    responses(
        (status = 200, description = "File contents as an attachment"),
        (status = 400, description = "Invalid filename"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found"),
        (status = 500, description = "Download failed")
    )
)]
/// Download a stored file under its original filename
async fn download_file(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
) -> ApiResult<Response> {
    let retrieved = state
        .files
        .retrieve(&name)
        .await
        .map_err(|e| ApiError::from_files(e, "Download failed"))?;

    // The file can disappear between the stat and the open.
    let file = tokio::fs::File::open(&retrieved.path).await.map_err(|e| {
        tracing::debug!("Opening {} for download failed: {}", name, e);
        ApiError::NotFound
    })?;
    let size_bytes = match file.metadata().await {
        Ok(metadata) => metadata.len(),
        Err(_) => retrieved.size_bytes,
    };

    let content_type = retrieved
        .media_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    let disposition = HeaderValue::from_str(&content_disposition(&retrieved.download_name))
        .map_err(|_| ApiError::Internal("Download failed"))?;

    Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, size_bytes)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| {
            tracing::error!("Building download response failed: {}", e);
            ApiError::Internal("Download failed")
        })
}

#[utoipa::path(
    delete,
    path = "/delete/{name}",
    params(("name" = String, Path, description = "Storage name")),
    responses(
        (status = 200, description = "File deleted successfully"),
        (status = 400, description = "Invalid filename"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found"),
        (status = 500, description = "Delete failed")
    )
)]
/// Delete a stored file
async fn delete_file(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
) -> ApiResult<&'static str> {
    state
        .files
        .delete(&name)
        .await
        .map_err(|e| ApiError::from_files(e, "Delete failed"))?;

    Ok("File deleted successfully")
}

async fn add_security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    response
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 filename.
fn content_disposition(download_name: &str) -> String {
    let fallback: String = download_name
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();
    let encoded = utf8_percent_encode(download_name, NON_ALPHANUMERIC);

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_ascii_name() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\"; filename*=UTF-8''report%2Epdf"
        );
    }

    #[test]
    fn test_content_disposition_escapes_quotes_and_unicode() {
        let value = content_disposition("my \"résumé\".txt");

        assert!(value.starts_with("attachment; filename=\"my _r_sum__.txt\""));
        assert!(value.contains("filename*=UTF-8''my%20%22r%C3%A9sum%C3%A9%22%2Etxt"));
        assert!(HeaderValue::from_str(&value).is_ok());
    }

    #[test]
    fn test_record_serialises_with_client_field_names() {
        let record = FileRecord {
            storage_name: "1-abc-a.txt".into(),
            original_name: "a.txt".into(),
            size_bytes: 5,
            uploaded_at: "2024-05-01T12:00:00Z".parse().unwrap(),
        };

        let json = serde_json::to_value(FileRecordRes::from(&record)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "filename": "1-abc-a.txt",
                "originalName": "a.txt",
                "size": 5,
                "uploadDate": "2024-05-01T12:00:00.000Z"
            })
        );
    }
}
