use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

/// Error kinds surfaced by the store and scheduling engines.
///
/// Per-slot rejections are represented by `Infeasible` but are not treated as
/// RPC failures — the scan loop absorbs them and moves on. `NotFound` is
/// benign for `StatusStore::get`; `Conflict` is benign for `ensure`.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("malformed device status: {0}")]
    ParseError(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("slot race: another worker already claimed this slot")]
    SlotRace,

    #[error("infeasible: {0}")]
    Infeasible(String),

    #[error("duration unknown, degraded to static estimate")]
    DurationUnknown,

    #[error("RPC worker exceeded its wall-clock budget")]
    Timeout,

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<sqlx::Error> for SchedulerError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => SchedulerError::NotFound,
            other => SchedulerError::StoreUnavailable(other.to_string()),
        }
    }
}

/// Wrapper so `SchedulerError` can be returned directly from axum handlers.
pub struct ApiError(pub SchedulerError);

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        Self(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self(SchedulerError::Unexpected(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SchedulerError::ParseError(_) => StatusCode::BAD_REQUEST,
            SchedulerError::NotFound => StatusCode::NOT_FOUND,
            SchedulerError::Conflict(_) => StatusCode::CONFLICT,
            SchedulerError::SlotRace => StatusCode::CONFLICT,
            SchedulerError::Infeasible(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SchedulerError::DurationUnknown => StatusCode::OK,
            SchedulerError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            SchedulerError::StoreUnavailable(_) | SchedulerError::Unexpected(_) => {
                error!(error = %self.0, "scheduler error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "internal server error".to_string(),
            _ => self.0.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
