use std::sync::Arc;

use axum::Router;

use crate::alerting::AlertingEngine;
use crate::config::AlertingConfig;
use crate::store::{AlertStore, ReadingStore};
use crate::summary::SummaryAggregator;

mod alerts;
mod health;
mod ingest;
mod summary;

// ---

/// Shared state handed to every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    // ---
    pub alerts: Arc<dyn AlertStore>,
    pub engine: Arc<AlertingEngine>,
    pub summaries: Arc<SummaryAggregator>,
}

impl AppState {
    pub fn new(
        config: &AlertingConfig,
        readings: Arc<dyn ReadingStore>,
        alerts: Arc<dyn AlertStore>,
    ) -> Self {
        // ---
        let engine = AlertingEngine::new(config, readings.clone(), alerts.clone());
        tracing::info!(
            "Alerting engine ready: {} consecutive breaches raise an alert",
            engine.required_count()
        );
        let summaries = SummaryAggregator::new(readings, alerts.clone());
        Self {
            alerts,
            engine: Arc::new(engine),
            summaries: Arc::new(summaries),
        }
    }
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(ingest::router())
        .merge(summary::router())
        .merge(alerts::router())
        .merge(health::router())
        .with_state(state)
}
