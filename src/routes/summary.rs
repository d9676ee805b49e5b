use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::models::Summary;
use crate::summary::Lookback;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/metrics/summary", get(handler))
}

/// Query parameters for a summary request
#[derive(Debug, Deserialize)]
struct SummaryQuery {
    #[serde(alias = "metricType")]
    metric_type: Option<String>,
    /// Lookback window, e.g. "1h" or "30m"
    interval: Option<String>,
}

async fn handler(
    params: Result<Query<SummaryQuery>, QueryRejection>,
    State(state): State<AppState>,
) -> AppResult<Json<Summary>> {
    // ---
    let Query(params) = params?;
    let (Some(metric_type), Some(interval)) = (
        params.metric_type.filter(|m| !m.trim().is_empty()),
        params.interval.filter(|i| !i.trim().is_empty()),
    ) else {
        return Err(AppError::BadRequest(
            "metric_type and interval are required (e.g. 1h, 30m).".to_string(),
        ));
    };

    let lookback: Lookback = interval.parse()?;
    info!(
        "GET /api/metrics/summary - '{}' over the last {} minutes",
        metric_type,
        lookback.duration().num_minutes()
    );

    let summary = state.summaries.summarize(&metric_type, lookback).await?;
    Ok(Json(summary))
}
