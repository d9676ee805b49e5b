//! Database schema management for `sensorflow-alerting`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` when a database is configured.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `metric_readings` table for ingested readings and the `alerts`
/// table for consecutive-breach alerts. Safe to call on every startup; no-op
/// if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metric_readings (
            id             UUID PRIMARY KEY,
            sensor_id      TEXT             NOT NULL,
            metric_type    TEXT             NOT NULL,
            value          DOUBLE PRECISION NOT NULL,
            timestamp_utc  TIMESTAMPTZ      NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // threshold_min is only set for range policies
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alerts (
            id             UUID PRIMARY KEY,
            sensor_id      TEXT             NOT NULL,
            metric_type    TEXT             NOT NULL,
            alert_kind     TEXT             NOT NULL,
            value          DOUBLE PRECISION NOT NULL,
            threshold      DOUBLE PRECISION NOT NULL,
            threshold_min  DOUBLE PRECISION,
            timestamp_utc  TIMESTAMPTZ      NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Per-sensor history lookup used by the alerting engine
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_metric_readings_sensor_metric_ts
            ON metric_readings (sensor_id, metric_type, timestamp_utc DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Windowed scans for summaries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_metric_readings_metric_ts
            ON metric_readings (metric_type, timestamp_utc);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_alerts_metric_ts
            ON alerts (metric_type, timestamp_utc);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_alerts_ts
            ON alerts (timestamp_utc DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
