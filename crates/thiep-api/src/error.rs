use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use thiep_core::AppError;
use thiep_core::error::IdentityError;
use thiep_types::api::ErrorResponse;

/// An `AppError` on its way out of a handler. The body carries the
/// user-facing notice text, never backend details.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Identity(IdentityError::InvalidRegistration(_)) => StatusCode::BAD_REQUEST,
            AppError::Identity(IdentityError::UsernameTaken) => StatusCode::CONFLICT,
            AppError::Identity(IdentityError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::Identity(IdentityError::Backend(_))
            | AppError::Lookup(_)
            | AppError::Persistence(_)
            | AppError::IndexMissing => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        let body = ErrorResponse { error: self.0.notice().text };
        (status, Json(body)).into_response()
    }
}
