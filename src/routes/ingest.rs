use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use tracing::{debug, info};

use super::AppState;
use crate::error::AppResult;
use crate::models::NewReading;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/metrics", post(handler))
}

/// Handle `POST /api/metrics`.
///
/// The reading is stored before alerting runs. A storage failure aborts the
/// request; an alerting failure is reported but leaves the reading in place.
async fn handler(
    State(state): State<AppState>,
    payload: Result<Json<NewReading>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    // ---
    let Json(payload) = payload?;
    if payload.timestamp.is_some() {
        debug!("POST /api/metrics - ignoring client timestamp hint");
    }

    let ingested = state.engine.ingest(payload).await?;
    let reading = ingested.reading;
    if ingested.alert.is_some() {
        info!("POST /api/metrics - reading {} raised an alert", reading.id);
    }

    let location = format!("/api/metrics/{}", reading.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(reading),
    ))
}
