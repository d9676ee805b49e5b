//! Error types for storage, alerting and the HTTP layer.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use uuid::Uuid;

use crate::summary::{IntervalParseError, SummaryError};

/// Failure reported by a [`ReadingStore`](crate::store::ReadingStore) or
/// [`AlertStore`](crate::store::AlertStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An underlying Postgres error.
    #[error("Storage: database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Failure while evaluating or recording an alert for a stored reading.
#[derive(Debug, thiserror::Error)]
pub enum AlertingError {
    /// Recent history for the sensor could not be loaded.
    #[error("Failed to load reading history: {0}")]
    History(#[source] StoreError),

    /// The breach was detected but the alert could not be written. The
    /// reading itself is already stored.
    #[error("Failed to persist alert for reading {reading_id}: {source}")]
    Persist {
        reading_id: Uuid,
        #[source]
        source: StoreError,
    },
}

/// Failure of the full ingestion path: validate, store, evaluate.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The payload was rejected before anything was stored.
    #[error("Invalid reading: {0}")]
    Invalid(String),

    /// The reading could not be stored; alerting was not attempted.
    #[error(transparent)]
    Store(StoreError),

    /// The reading was stored but alerting failed.
    #[error(transparent)]
    Alerting(#[from] AlertingError),
}

/// Application-level error type for HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed or incomplete client input.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unparsable summary interval.
    #[error("Invalid interval: {0}")]
    InvalidInterval(#[from] IntervalParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Alerting(#[from] AlertingError),
}

impl From<SummaryError> for AppError {
    fn from(err: SummaryError) -> Self {
        match err {
            SummaryError::Interval(e) => AppError::InvalidInterval(e),
            SummaryError::Store(e) => AppError::Store(e),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Invalid(msg) => AppError::BadRequest(msg),
            IngestError::Store(e) => AppError::Store(e),
            IngestError::Alerting(e) => AppError::Alerting(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // ---
        let (status, code, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InvalidInterval(err) => (
                StatusCode::BAD_REQUEST,
                "INVALID_INTERVAL",
                format!("Could not parse interval ({err}). Use e.g. 1h or 30m."),
            ),
            AppError::Store(err) => {
                tracing::error!(error = %err, "Storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Alerting(err) => {
                tracing::error!(error = %err, "Alerting failure");
                let message = match err {
                    AlertingError::Persist { reading_id, .. } => {
                        format!("Reading {reading_id} was stored but its alert could not be recorded")
                    }
                    AlertingError::History(_) => {
                        "Reading was stored but alert evaluation failed".to_string()
                    }
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "ALERTING_ERROR", message)
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
