use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::error::ErrorKind;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Failed(String),
}

impl AppError {
    /// Collapses infrastructure failures into a client-facing error.
    ///
    /// Constraint violations become [`AppError::Conflict`]; errors that are
    /// already meant for the client pass through unchanged. Everything else
    /// is logged and replaced by [`AppError::Failed`] carrying `message`, so
    /// the root cause never reaches the response body.
    pub fn or_failed(self, message: &str) -> Self {
        match self {
            AppError::Validation(_)
            | AppError::Unprocessable(_)
            | AppError::NotFound(_)
            | AppError::Conflict(_)
            | AppError::Failed(_) => self,
            AppError::Database(ref err) if is_integrity_violation(err) => {
                warn!("{message}: integrity violation: {err}");
                AppError::Conflict(format!("Erro de validação: {err}"))
            }
            other => {
                warn!("{message}: {other:?}");
                AppError::Failed(message.to_string())
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Io(_) | AppError::Database(_) | AppError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Validation(_) | AppError::Failed(_) => StatusCode::BAD_REQUEST,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

fn is_integrity_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => matches!(
            db_err.kind(),
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation
        ),
        _ => false,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = ?self, "internal server error");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
