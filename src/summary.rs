//! Windowed aggregates over stored readings.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::error::StoreError;
use crate::models::{normalize_metric_type, Summary};
use crate::store::{AlertStore, ReadingStore};

// ---

/// Why a lookback string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntervalParseError {
    #[error("interval is empty")]
    Empty,

    #[error("'{0}' is not a whole number of hours or minutes")]
    Malformed(String),

    #[error("'{0}' is too large")]
    OutOfRange(String),
}

/// How far back a summary looks, e.g. `1h`, `30m`, or a bare `2` (hours).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookback(Duration);

impl Lookback {
    pub fn duration(&self) -> Duration {
        self.0
    }

    /// Start of the window ending at `now`.
    pub fn start_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, IntervalParseError> {
        now.checked_sub_signed(self.0)
            .ok_or_else(|| IntervalParseError::OutOfRange(format!("{}s", self.0.num_seconds())))
    }
}

impl FromStr for Lookback {
    type Err = IntervalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        let raw = s.trim().to_lowercase();
        if raw.is_empty() {
            return Err(IntervalParseError::Empty);
        }

        let (digits, unit_secs) = if let Some(n) = raw.strip_suffix('h') {
            (n, 3600)
        } else if let Some(n) = raw.strip_suffix('m') {
            (n, 60)
        } else {
            (raw.as_str(), 3600)
        };

        let amount: u32 = digits
            .parse()
            .map_err(|_| IntervalParseError::Malformed(s.trim().to_string()))?;

        Duration::try_seconds(i64::from(amount) * unit_secs)
            .map(Lookback)
            .ok_or_else(|| IntervalParseError::OutOfRange(s.trim().to_string()))
    }
}

/// Computes [`Summary`] values from the reading and alert stores.
pub struct SummaryAggregator {
    readings: Arc<dyn ReadingStore>,
    alerts: Arc<dyn AlertStore>,
}

impl SummaryAggregator {
    pub fn new(readings: Arc<dyn ReadingStore>, alerts: Arc<dyn AlertStore>) -> Self {
        Self { readings, alerts }
    }

    /// Summarize `metric_type` over the `lookback` window ending now.
    pub async fn summarize(&self, metric_type: &str, lookback: Lookback) -> Result<Summary, SummaryError> {
        // ---
        let start = lookback.start_from(Utc::now())?;
        Ok(self.summarize_since(metric_type, start).await?)
    }

    /// Summarize readings of `metric_type` at or after `start`. Alerts are
    /// counted by their creation time.
    pub async fn summarize_since(
        &self,
        metric_type: &str,
        start: DateTime<Utc>,
    ) -> Result<Summary, StoreError> {
        // ---
        let metric = normalize_metric_type(metric_type);
        let readings = self.readings.in_window(&metric, start).await?;
        let alerts_triggered = self.alerts.count_in_window(&metric, start).await?;

        let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
        let (average, min, max) = if values.is_empty() {
            (None, None, None)
        } else {
            let sum: f64 = values.iter().sum();
            (
                Some(sum / values.len() as f64),
                values.iter().copied().reduce(f64::min),
                values.iter().copied().reduce(f64::max),
            )
        };

        tracing::debug!(
            "Summary for '{}' since {}: {} readings, {} alerts",
            metric,
            start,
            values.len(),
            alerts_triggered
        );

        Ok(Summary {
            metric,
            start_utc: start,
            count: values.len(),
            average,
            min,
            max,
            alerts_triggered,
        })
    }
}

/// Failure while building a summary.
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error(transparent)]
    Interval(#[from] IntervalParseError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
