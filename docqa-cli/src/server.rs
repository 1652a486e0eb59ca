//! HTTP front end: upload a PDF, then ask questions about it.

use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use docqa_lib::pipeline::DocumentQa;
use docqa_lib::store::IndexId;
use docqa_lib::Error;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Multipart field carrying the uploaded document
const FILE_FIELD: &str = "file";

/// Library errors rendered as `{"error": message}` with a matching status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: Error,
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self {
            status: status_for(&error),
            error,
        }
    }
}

impl ApiError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::rejected(StatusCode::BAD_REQUEST, message)
    }

    /// Request refused by an extractor, keeping the extractor's own status.
    fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            error: Error::InvalidInput(message.into()),
        }
    }
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::IndexNotFound(_) => StatusCode::NOT_FOUND,
        Error::Extraction(_) | Error::IndexBuild(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Credential { .. } | Error::Transport(_) | Error::Upstream { .. } => {
            StatusCode::BAD_GATEWAY
        }
        Error::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        if status.is_server_error() {
            tracing::error!(error = %self.error, status = status.as_u16(), "request failed");
        } else {
            tracing::warn!(error = %self.error, status = status.as_u16(), "request rejected");
        }
        (status, Json(json!({ "error": self.error.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    index: Option<String>,
}

impl IndexQuery {
    fn id(&self) -> Result<IndexId, ApiError> {
        match &self.index {
            Some(index) => Ok(index.parse()?),
            None => Ok(IndexId::default()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AskForm {
    question: String,
}

/// Build the router; uploads larger than `upload_limit` bytes are refused.
pub fn router(qa: Arc<DocumentQa>, upload_limit: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/upload_pdf/", post(upload_pdf))
        .route("/ask_question/", post(ask_question))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(qa)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn upload_pdf(
    State(qa): State<Arc<DocumentQa>>,
    Query(query): Query<IndexQuery>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = query.id()?;

    let mut document = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?
    {
        if field.name() == Some(FILE_FIELD) {
            let filename = field.file_name().unwrap_or("upload.pdf").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
            tracing::info!(index = %id, filename = %filename, bytes = bytes.len(), "received upload");
            document = Some(bytes);
            break;
        }
    }
    let document =
        document.ok_or_else(|| ApiError::invalid(format!("missing multipart field '{FILE_FIELD}'")))?;

    let report = qa.ingest_pdf(&id, document.to_vec()).await?;
    Ok(Json(json!({
        "message": report.message(),
        "index": report.index,
        "chunks": report.chunks,
    })))
}

async fn ask_question(
    State(qa): State<Arc<DocumentQa>>,
    Query(query): Query<IndexQuery>,
    form: Result<Form<AskForm>, FormRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = query.id()?;
    let Form(form) = form.map_err(|e| ApiError::invalid(e.body_text()))?;

    let answer = qa.ask(&id, &form.question).await?;
    Ok(Json(json!({ "answer": answer.text })))
}
