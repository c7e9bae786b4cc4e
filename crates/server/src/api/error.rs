use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use purchasing_core::errors::{ApplicationError, InterfaceError};
use purchasing_db::RepositoryError;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Error returned by every API handler. Wraps the interface-level error class
/// and renders it as `{ "detail", "correlation_id" }`.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
    correlation_id: &'a str,
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: new_correlation_id(),
        })
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApplicationError::Unauthenticated(message.into()).into()
    }

    pub fn interface(&self) -> &InterfaceError {
        &self.0
    }

    pub fn status(&self) -> StatusCode {
        match self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        Self(error.into_interface(new_correlation_id()))
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::from(error).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let correlation_id = self.0.correlation_id();

        // Server-side failures keep their internals in the log only.
        let detail =
            if status.is_server_error() { self.0.user_message() } else { self.0.message() };

        if status.is_server_error() {
            error!(
                event_name = "api.request.failed",
                correlation_id = %correlation_id,
                status = status.as_u16(),
                error = %self.0,
                "request failed"
            );
        } else {
            warn!(
                event_name = "api.request.rejected",
                correlation_id = %correlation_id,
                status = status.as_u16(),
                error = %self.0,
                "request rejected"
            );
        }

        let body = Json(ErrorBody { detail, correlation_id });
        (status, [(CORRELATION_ID_HEADER, correlation_id.to_string())], body).into_response()
    }
}
