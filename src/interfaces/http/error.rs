//! Bridges [`BookingError`] to HTTP responses.

use crate::error::{BookingError, ErrorKind};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: BookingError,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Provider callbacks only distinguish "your request is bad" from "try
    /// again later": anything past signature, routing and parsing is a 500
    /// so the provider redelivers.
    pub fn for_webhook(error: BookingError) -> Self {
        let status = match error.kind() {
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound if matches!(error, BookingError::UnknownProvider(_)) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, error }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Gateway | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn code_for(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "BAD_REQUEST",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::CONFLICT => "CONFLICT",
        StatusCode::FORBIDDEN => "FORBIDDEN",
        StatusCode::UNAUTHORIZED => "UNAUTHORIZED",
        _ => "INTERNAL_ERROR",
    }
}

impl From<BookingError> for ApiError {
    fn from(error: BookingError) -> Self {
        Self {
            status: status_for(error.kind()),
            error,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = if self.status.is_server_error() {
            tracing::error!(error = %self.error, "Request failed");
            match self.error.kind() {
                ErrorKind::Gateway => "Payment provider unavailable".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.error.to_string()
        };
        let body = ErrorBody {
            code: code_for(self.status),
            message,
        };
        (self.status, Json(body)).into_response()
    }
}
