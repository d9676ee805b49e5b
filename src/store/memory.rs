//! In-process stores, used when no `DATABASE_URL` is configured and by tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{AlertStore, ReadingStore, RecentQuery, StoreResult};
use crate::models::{normalize_metric_type, Alert, Reading};

// ---

#[derive(Default)]
pub struct MemoryReadingStore {
    readings: RwLock<Vec<Reading>>,
}

#[derive(Default)]
pub struct MemoryAlertStore {
    alerts: RwLock<Vec<Alert>>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn append(&self, reading: Reading) -> StoreResult<Reading> {
        // ---
        self.readings.write().await.push(reading.clone());
        Ok(reading)
    }

    async fn recent_for(&self, query: RecentQuery<'_>) -> StoreResult<Vec<Reading>> {
        // ---
        let metric_type = normalize_metric_type(query.metric_type);
        let readings = self.readings.read().await;

        let mut matching: Vec<Reading> = readings
            .iter()
            .filter(|r| r.sensor_id == query.sensor_id && r.metric_type == metric_type)
            .filter(|r| r.timestamp_utc <= query.up_to)
            .filter(|r| Some(r.id) != query.exclude)
            .cloned()
            .collect();

        // Stable sort keeps later appends first among equal timestamps
        matching.reverse();
        matching.sort_by(|a, b| b.timestamp_utc.cmp(&a.timestamp_utc));
        matching.truncate(query.limit);
        Ok(matching)
    }

    async fn in_window(&self, metric_type: &str, start: DateTime<Utc>) -> StoreResult<Vec<Reading>> {
        // ---
        let metric_type = normalize_metric_type(metric_type);
        let readings = self.readings.read().await;

        Ok(readings
            .iter()
            .filter(|r| r.metric_type == metric_type && r.timestamp_utc >= start)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn append(&self, alert: Alert) -> StoreResult<Alert> {
        // ---
        self.alerts.write().await.push(alert.clone());
        Ok(alert)
    }

    async fn count_in_window(&self, metric_type: &str, start: DateTime<Utc>) -> StoreResult<u64> {
        // ---
        let metric_type = normalize_metric_type(metric_type);
        let alerts = self.alerts.read().await;

        Ok(alerts
            .iter()
            .filter(|a| a.metric_type == metric_type && a.timestamp_utc >= start)
            .count() as u64)
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<Alert>> {
        // ---
        let mut alerts = self.alerts.read().await.clone();
        alerts.reverse();
        alerts.sort_by(|a, b| b.timestamp_utc.cmp(&a.timestamp_utc));
        alerts.truncate(limit);
        Ok(alerts)
    }
}
