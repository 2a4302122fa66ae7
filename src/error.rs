use std::fmt::Display;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Failure of a call against object storage or a blob URL.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("storage request failed: {0:#}")]
    Storage(#[source] anyhow::Error),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("batch fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("cannot derive storage id from url {0}")]
    MalformedUrl(String),

    #[error("unreadable image: {0}")]
    UnreadableImage(String),
}

/// Failure while writing an export archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("{images} images but {blobs} blobs")]
    LengthMismatch { images: usize, blobs: usize },

    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error type returned by every HTTP handler.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("network error: {0}")]
    Network(#[source] RemoteError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<RemoteError> for AppError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::UnreadableImage(msg) => AppError::BadRequest(msg),
            other => AppError::Network(other),
        }
    }
}

impl From<ArchiveError> for AppError {
    fn from(e: ArchiveError) -> Self {
        AppError::Internal(anyhow::Error::new(e).context("build export archive"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Network(e) => {
                tracing::error!(error = %e, "remote storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Network Error".to_string())
            }
            AppError::Database(sqlx::Error::RowNotFound) => {
                (StatusCode::NOT_FOUND, "Resource not found".to_string())
            }
            AppError::Database(e) if unique_constraint(e).is_some() => {
                (StatusCode::CONFLICT, conflict_message(e))
            }
            AppError::Internal(e) if wrapped_unique_violation(e).is_some() => {
                let message = wrapped_unique_violation(e)
                    .map(conflict_message)
                    .unwrap_or_default();
                (StatusCode::CONFLICT, message)
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!(error = %format!("{e:#}"), "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = json!({
            "status": "failed",
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

/// Name of the `uq_` constraint a Postgres unique violation (23505) hit.
pub(crate) fn unique_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            db.constraint().filter(|c| c.starts_with("uq_"))
        }
        _ => None,
    }
}

/// Repository errors arrive wrapped in `anyhow` context.
fn wrapped_unique_violation(err: &anyhow::Error) -> Option<&sqlx::Error> {
    err.downcast_ref::<sqlx::Error>()
        .filter(|e| unique_constraint(e).is_some())
}

fn conflict_message(err: &sqlx::Error) -> String {
    let constraint = unique_constraint(err).unwrap_or("unknown");
    format!("Duplicate value violates unique constraint: {constraint}")
}
