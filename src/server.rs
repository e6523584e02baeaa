//! HTTP surface over [`Acquirer`].
//!
//! | Route | Body | Success |
//! |-------|------|---------|
//! | `POST /api/scrape` | `{"url": "..."}` | `{"images": [...]}` |
//! | `POST /api/upload` | multipart, field `image` | `{"images": [url]}` |
//! | `GET /uploads/*` | | translated files, straight off disk |
//!
//! Failures answer `{"error": "..."}` with a message that carries no local
//! paths or worker addresses.

use crate::acquire::Acquirer;
use crate::error::IngestError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Largest multipart body accepted on `/api/upload`.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Multipart field carrying the uploaded image.
const UPLOAD_FIELD: &str = "image";

#[derive(Clone)]
pub struct AppState {
    acquirer: Arc<Acquirer>,
}

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImagesResponse {
    pub images: Vec<String>,
}

/// An error answer: status plus `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Build the router. `/uploads` is served from the acquirer's uploads root.
pub fn router(acquirer: Arc<Acquirer>) -> Router {
    let uploads = ServeDir::new(acquirer.store().root());
    Router::new()
        .route("/api/scrape", post(scrape_handler))
        .route(
            "/api/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .nest_service("/uploads", uploads)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { acquirer })
}

/// Serve on an already-bound listener until the process stops.
pub async fn serve(listener: TcpListener, acquirer: Arc<Acquirer>) -> Result<(), IngestError> {
    acquirer.init().await?;
    let addr = listener
        .local_addr()
        .map_err(|e| IngestError::Internal(format!("listener address: {e}")))?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, router(acquirer))
        .await
        .map_err(|e| IngestError::Internal(format!("server: {e}")))
}

async fn scrape_handler(
    State(state): State<AppState>,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<Json<ImagesResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let url = request
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("No URL"))?;

    match state.acquirer.scrape(url.trim()).await {
        Ok(output) => {
            if output.is_partial() {
                warn!(
                    "Scrape of {} skipped {} of {} images",
                    url, output.stats.skipped, output.stats.attempted
                );
            }
            Ok(Json(ImagesResponse {
                images: output.images,
            }))
        }
        Err(IngestError::InvalidInput { reason, .. }) => Err(ApiError::bad_request(reason)),
        Err(e) => {
            error!("Scrape of {} failed: {}", url, e);
            Err(ApiError::internal(format!(
                "Scraping failed: {}",
                e.public_message()
            )))
        }
    }
}

async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        upload = Some((name, bytes));
        break;
    }

    let Some((name, bytes)) = upload.filter(|(_, b)| !b.is_empty()) else {
        return Ok((StatusCode::BAD_REQUEST, "No file").into_response());
    };

    match state.acquirer.upload_bytes(&name, &bytes).await {
        Ok(output) => Ok(Json(ImagesResponse {
            images: output.images,
        })
        .into_response()),
        Err(e) => {
            error!("Upload '{}' failed: {}", name, e);
            Err(ApiError::internal("AI Failed"))
        }
    }
}
