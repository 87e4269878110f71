pub mod equips;
pub mod events;
pub mod members;
pub mod tasks;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use teamhub_core::HubError;
use tracing::error;

use crate::state::AppState;

/// All API routes, without middleware.
pub fn app() -> Router<AppState> {
    Router::new()
        .merge(events::router())
        .merge(equips::router())
        .merge(members::router())
        .merge(tasks::router())
}

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Converts hub and internal errors to HTTP responses
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self.0.downcast_ref::<HubError>() {
            Some(e) if e.is_validation() => (StatusCode::BAD_REQUEST, e.code()),
            Some(e) if e.is_not_found() => (StatusCode::NOT_FOUND, e.code()),
            Some(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.code()),
            None => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(code, error = %self.0, "request failed");
        }
        let body = Json(ErrorResponse {
            error: code.to_string(),
            message: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Epoch-millisecond query parameter.
pub(crate) fn millis(value: Option<i64>, name: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    value
        .map(|ms| {
            DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| HubError::InvalidTimeRange(format!("{name} is out of range: {ms}")))
        })
        .transpose()
        .map_err(AppError::from)
}
