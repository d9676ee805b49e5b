//! Persistence boundary for readings and alerts.
//!
//! The alerting engine and the summary aggregator only see the two traits
//! below; `main.rs` picks the backend (Postgres or in-memory) at startup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Alert, Reading};

mod memory;
mod postgres;

pub use memory::{MemoryAlertStore, MemoryReadingStore};
pub use postgres::{PgAlertStore, PgReadingStore};

/// Convenience `Result` alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// History lookup for one sensor + metric pair.
#[derive(Debug, Clone)]
pub struct RecentQuery<'a> {
    // ---
    pub sensor_id: &'a str,
    /// Already-normalized (lowercase) metric type.
    pub metric_type: &'a str,
    /// Only readings at or before this instant are returned.
    pub up_to: DateTime<Utc>,
    /// Reading to leave out, normally the one just ingested.
    pub exclude: Option<Uuid>,
    pub limit: usize,
}

#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persist a reading and return it as stored.
    async fn append(&self, reading: Reading) -> StoreResult<Reading>;

    /// Most recent readings matching `query`, newest first.
    async fn recent_for(&self, query: RecentQuery<'_>) -> StoreResult<Vec<Reading>>;

    /// All readings of `metric_type` with `timestamp_utc >= start`, in no
    /// particular order.
    async fn in_window(&self, metric_type: &str, start: DateTime<Utc>) -> StoreResult<Vec<Reading>>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn append(&self, alert: Alert) -> StoreResult<Alert>;

    /// Number of alerts of `metric_type` created at or after `start`.
    async fn count_in_window(&self, metric_type: &str, start: DateTime<Utc>) -> StoreResult<u64>;

    /// Latest alerts across all sensors, newest first.
    async fn recent(&self, limit: usize) -> StoreResult<Vec<Alert>>;
}
