// src/routes/health.rs
//! Liveness endpoint for the alerting service.
//!
//! Used by container orchestrators and CI to confirm the process is up and
//! answering HTTP. Exports a subrouter that the gateway (`mod.rs`) merges.

use axum::{routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Handle `GET /health`.
///
/// Does not touch either store, so it stays green while the database is
/// unreachable.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Subrouter with the `/health` route, generic over the gateway's state.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
