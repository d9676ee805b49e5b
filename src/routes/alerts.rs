use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::AppState;
use crate::error::AppResult;
use crate::models::Alert;

// ---

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/alerts", get(handler))
}

#[derive(Debug, Deserialize)]
struct AlertsQuery {
    limit: Option<usize>,
}

/// Handle `GET /api/alerts`: most recent alerts, newest first.
async fn handler(
    params: Result<Query<AlertsQuery>, QueryRejection>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Alert>>> {
    // ---
    let Query(params) = params?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    tracing::debug!("GET /api/alerts - limit {}", limit);

    let alerts = state.alerts.recent(limit).await?;
    Ok(Json(alerts))
}
