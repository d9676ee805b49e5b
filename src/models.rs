//! Simple data models for the metrics pipeline.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---

/// Incoming metric reading as posted by a sensor.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReading {
    // ---
    #[serde(alias = "sensorId")]
    pub sensor_id: String,
    #[serde(alias = "metricType")]
    pub metric_type: String,
    pub value: f64,
    /// Client-side timestamp hint. Accepted but not trusted; the server
    /// always stamps its own ingestion time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A stored metric reading.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Reading {
    // ---
    pub id: Uuid,
    pub sensor_id: String,
    pub metric_type: String,
    pub value: f64,
    pub timestamp_utc: DateTime<Utc>,
}

/// An alert raised by a consecutive threshold breach.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Alert {
    // ---
    pub id: Uuid,
    pub sensor_id: String,
    pub metric_type: String,
    pub alert_kind: String,
    /// Value of the reading that completed the breach run.
    pub value: f64,
    /// Upper bound of the resolved policy.
    pub threshold: f64,
    /// Lower bound, only for range policies.
    pub threshold_min: Option<f64>,
    /// Alert creation time (not the reading time).
    pub timestamp_utc: DateTime<Utc>,
}

/// Aggregate over a lookback window for one metric type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    // ---
    pub metric: String,
    pub start_utc: DateTime<Utc>,
    pub count: usize,
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub alerts_triggered: u64,
}

/// Normalize a metric type for storage and comparison.
pub fn normalize_metric_type(metric_type: &str) -> String {
    metric_type.trim().to_lowercase()
}

impl NewReading {
    // ---
    /// Check that the payload is usable, returning a human-readable reason
    /// when it is not.
    pub fn validate(&self) -> Result<(), String> {
        // ---
        if self.sensor_id.trim().is_empty() || self.metric_type.trim().is_empty() {
            return Err("sensor_id and metric_type are required.".to_string());
        }
        if !self.value.is_finite() {
            return Err("value must be a finite number.".to_string());
        }
        Ok(())
    }

    /// Validate and stamp the reading with the server's ingestion time.
    ///
    /// The timestamp is truncated to microseconds, the precision Postgres
    /// `TIMESTAMPTZ` keeps, so the returned reading matches later reads.
    pub fn into_reading(self, now: DateTime<Utc>) -> Result<Reading, String> {
        // ---
        self.validate()?;

        Ok(Reading {
            id: Uuid::new_v4(),
            sensor_id: self.sensor_id.trim().to_string(),
            metric_type: normalize_metric_type(&self.metric_type),
            value: self.value,
            timestamp_utc: now.trunc_subsecs(6),
        })
    }
}
