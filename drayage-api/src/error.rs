use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use drayage_core::{CoreError, ErrorKind};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("{0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Core(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::InvalidState => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::InsufficientResource => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Configuration | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::BadRequest(msg) => json!({
                "error": "VALIDATION",
                "message": msg,
                "detail": {},
            }),
            AppError::Core(err) => {
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("Internal Server Error: {}", err);
                }
                json!({
                    "error": err.kind(),
                    "message": err.to_string(),
                    "detail": err.detail(),
                })
            }
        };

        (status, Json(body)).into_response()
    }
}
