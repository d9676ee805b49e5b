use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{AlertStore, ReadingStore, RecentQuery, StoreResult};
use crate::models::{normalize_metric_type, Alert, Reading};

// ---

/// Postgres-backed [`ReadingStore`] over the `metric_readings` table.
#[derive(Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

/// Postgres-backed [`AlertStore`] over the `alerts` table.
#[derive(Clone)]
pub struct PgAlertStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl PgAlertStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn append(&self, reading: Reading) -> StoreResult<Reading> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO metric_readings (id, sensor_id, metric_type, value, timestamp_utc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(reading.id)
        .bind(&reading.sensor_id)
        .bind(&reading.metric_type)
        .bind(reading.value)
        .bind(reading.timestamp_utc)
        .execute(&self.pool)
        .await?;

        Ok(reading)
    }

    async fn recent_for(&self, query: RecentQuery<'_>) -> StoreResult<Vec<Reading>> {
        // ---
        let readings = sqlx::query_as::<_, Reading>(
            r#"
            SELECT id, sensor_id, metric_type, value, timestamp_utc
            FROM metric_readings
            WHERE sensor_id = $1
              AND metric_type = $2
              AND timestamp_utc <= $3
              AND ($4::uuid IS NULL OR id <> $4)
            ORDER BY timestamp_utc DESC
            LIMIT $5
            "#,
        )
        .bind(query.sensor_id)
        .bind(normalize_metric_type(query.metric_type))
        .bind(query.up_to)
        .bind(query.exclude)
        .bind(sql_limit(query.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(readings)
    }

    async fn in_window(&self, metric_type: &str, start: DateTime<Utc>) -> StoreResult<Vec<Reading>> {
        // ---
        let readings = sqlx::query_as::<_, Reading>(
            r#"
            SELECT id, sensor_id, metric_type, value, timestamp_utc
            FROM metric_readings
            WHERE metric_type = $1 AND timestamp_utc >= $2
            "#,
        )
        .bind(normalize_metric_type(metric_type))
        .bind(start)
        .fetch_all(&self.pool)
        .await?;

        Ok(readings)
    }
}

#[async_trait]
impl AlertStore for PgAlertStore {
    async fn append(&self, alert: Alert) -> StoreResult<Alert> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO alerts (
                id, sensor_id, metric_type, alert_kind,
                value, threshold, threshold_min, timestamp_utc
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(alert.id)
        .bind(&alert.sensor_id)
        .bind(&alert.metric_type)
        .bind(&alert.alert_kind)
        .bind(alert.value)
        .bind(alert.threshold)
        .bind(alert.threshold_min)
        .bind(alert.timestamp_utc)
        .execute(&self.pool)
        .await?;

        Ok(alert)
    }

    async fn count_in_window(&self, metric_type: &str, start: DateTime<Utc>) -> StoreResult<u64> {
        // ---
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM alerts
            WHERE metric_type = $1 AND timestamp_utc >= $2
            "#,
        )
        .bind(normalize_metric_type(metric_type))
        .bind(start)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<Alert>> {
        // ---
        let alerts = sqlx::query_as::<_, Alert>(
            r#"
            SELECT id, sensor_id, metric_type, alert_kind,
                   value, threshold, threshold_min, timestamp_utc
            FROM alerts
            ORDER BY timestamp_utc DESC
            LIMIT $1
            "#,
        )
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(alerts)
    }
}
