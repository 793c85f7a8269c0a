use crate::config::ApiConfig;
use crate::page;
use crate::photo::{NewPhoto, PhotoSummary};
use crate::photo_store::{PhotoStore, StoreError};
use anyhow::{Context, Result};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

/// Multipart field carrying the uploaded image
pub const FILE_FIELD: &str = "file";

/// Served images are always labelled JPEG, whatever was uploaded.
pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub photo_store: Arc<dyn PhotoStore>,
}

impl AppState {
    pub fn new(photo_store: Arc<dyn PhotoStore>) -> Self {
        Self { photo_store }
    }
}

/// Upload acknowledgment
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    /// Id of the saved photo (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Handler failures, each mapped to a fixed status and body
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No file received")]
    MissingFile,

    #[error("{0}")]
    InvalidUpload(String),

    #[error("Failed to read multipart body: {0}")]
    UnreadableUpload(#[source] MultipartError),

    #[error("Error saving photo")]
    SavePhoto(#[source] StoreError),

    #[error("Image not found")]
    ImageNotFound,

    #[error("Error fetching image")]
    FetchImage(#[source] StoreError),

    #[error("Error fetching photos")]
    ListPhotos(#[source] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFile | ApiError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            // 413 when a configured body cap is hit
            ApiError::UnreadableUpload(e) => e.status(),
            ApiError::ImageNotFound => StatusCode::NOT_FOUND,
            ApiError::SavePhoto(_) | ApiError::FetchImage(_) | ApiError::ListPhotos(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        match self {
            // Upload failures keep the acknowledgment shape
            ApiError::SavePhoto(_) => (
                status,
                Json(UploadResponse {
                    success: false,
                    message,
                    id: None,
                }),
            )
                .into_response(),
            ApiError::ImageNotFound => (status, message).into_response(),
            _ => (status, Json(ErrorResponse { message })).into_response(),
        }
    }
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    // Uploads are buffered whole; without a configured cap they are unbounded
    let body_limit = match config.max_upload_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/", get(page::index))
        .route("/upload", post(upload_photo))
        .route("/image/:id", get(get_image))
        .route("/photos", get(list_photos))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "gallery-service"
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.photo_store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "database": "connected"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "database": "disconnected",
                "error": e.to_string()
            })),
        ),
    }
}

/// Accept a single multipart file and store it as a new photo
#[instrument(skip(state, multipart))]
async fn upload_photo(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let image = read_file_field(multipart).await?;
    let photo = NewPhoto::from_upload(image, Utc::now());
    let size_bytes = photo.image.len();

    let saved = state.photo_store.insert(photo).await.map_err(|e| {
        error!(error = %e, "Failed to save photo");
        metrics::counter!("gallery.photos.save_failed").increment(1);
        ApiError::SavePhoto(e)
    })?;

    info!(
        photo_id = %saved.id,
        filename = %saved.filename,
        size_bytes = size_bytes,
        "Photo saved"
    );
    metrics::counter!("gallery.photos.saved").increment(1);

    Ok(Json(UploadResponse {
        success: true,
        message: "Photo saved!".to_string(),
        id: Some(saved.id),
    }))
}

/// Buffer the one `file` part of an upload.
///
/// Non-file fields and fields under other names are skipped.
async fn read_file_field(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Vec<u8>, ApiError> {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            debug!(rejection = %rejection, "Upload is not a multipart request");
            return Err(ApiError::MissingFile);
        }
    };

    let mut file: Option<Vec<u8>> = None;
    let mut seen_part = false;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            // An empty body fails to parse before yielding any part
            Err(e) if !seen_part && e.status() == StatusCode::BAD_REQUEST => {
                debug!(error = %e, "Upload body holds no multipart parts");
                return Err(ApiError::MissingFile);
            }
            Err(e) => return Err(ApiError::UnreadableUpload(e)),
        };
        seen_part = true;

        if field.name() != Some(FILE_FIELD) || field.file_name().is_none() {
            continue;
        }

        if file.is_some() {
            return Err(ApiError::InvalidUpload(
                "Only one file may be uploaded per request".to_string(),
            ));
        }

        let data = field.bytes().await.map_err(ApiError::UnreadableUpload)?;

        file = Some(data.to_vec());
    }

    file.ok_or(ApiError::MissingFile)
}

/// Serve the raw bytes of one photo
#[instrument(skip(state))]
async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let photo = state
        .photo_store
        .find_by_id(&id)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch image");
            ApiError::FetchImage(e)
        })?
        .ok_or_else(|| {
            metrics::counter!("gallery.photos.not_found").increment(1);
            ApiError::ImageNotFound
        })?;

    metrics::counter!("gallery.photos.served").increment(1);

    Ok(([(header::CONTENT_TYPE, IMAGE_CONTENT_TYPE)], photo.image))
}

/// List photo metadata, most recent first
#[instrument(skip(state))]
async fn list_photos(
    State(state): State<AppState>,
) -> Result<Json<Vec<PhotoSummary>>, ApiError> {
    let photos = state.photo_store.list_recent().await.map_err(|e| {
        error!(error = %e, "Failed to list photos");
        ApiError::ListPhotos(e)
    })?;

    Ok(Json(photos))
}

/// Start the gallery API server, serving until `shutdown` resolves
pub async fn start_api_server<F>(state: AppState, config: &ApiConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state, config);
    let addr = config.listen_addr();

    info!(address = %addr, "Starting gallery API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}
