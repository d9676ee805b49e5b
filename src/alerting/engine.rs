use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::evaluator::is_consecutive_breach;
use super::locks::KeyedLocks;
use super::policy::ThresholdPolicy;
use crate::config::AlertingConfig;
use crate::error::{AlertingError, IngestError};
use crate::models::{normalize_metric_type, Alert, NewReading, Reading};
use crate::store::{AlertStore, ReadingStore, RecentQuery};

// ---

/// Runs the consecutive-breach check for each newly stored reading and
/// records an [`Alert`] when the run is complete.
///
/// Work for one sensor+metric pair runs under a per-pair lock. Within this
/// process, readings of a pair are therefore stamped, stored and evaluated
/// in the same order, and each evaluation sees every earlier reading.
pub struct AlertingEngine {
    // ---
    policy: ThresholdPolicy,
    required_count: usize,
    readings: Arc<dyn ReadingStore>,
    alerts: Arc<dyn AlertStore>,
    locks: KeyedLocks,
}

/// Result of [`AlertingEngine::ingest`].
#[derive(Debug)]
pub struct Ingested {
    pub reading: Reading,
    pub alert: Option<Alert>,
}

fn pair_key(sensor_id: &str, metric_type: &str) -> String {
    format!("{}\u{1f}{}", sensor_id, metric_type)
}

impl AlertingEngine {
    // ---
    pub fn new(
        config: &AlertingConfig,
        readings: Arc<dyn ReadingStore>,
        alerts: Arc<dyn AlertStore>,
    ) -> Self {
        Self {
            policy: ThresholdPolicy::new(config.thresholds.clone()),
            required_count: config.consecutive_breach_count.max(1),
            readings,
            alerts,
            locks: KeyedLocks::new(),
        }
    }

    pub fn required_count(&self) -> usize {
        self.required_count
    }

    /// Validate, stamp and store `new`, then evaluate it.
    ///
    /// A storage failure aborts before alerting. An alerting failure is
    /// returned with the reading left in the store.
    pub async fn ingest(&self, new: NewReading) -> Result<Ingested, IngestError> {
        // ---
        new.validate().map_err(IngestError::Invalid)?;
        let key = pair_key(new.sensor_id.trim(), &normalize_metric_type(&new.metric_type));
        let _guard = self.locks.acquire(&key).await;

        let reading = new.into_reading(Utc::now()).map_err(IngestError::Invalid)?;
        let reading = self
            .readings
            .append(reading)
            .await
            .map_err(IngestError::Store)?;
        info!(
            "Stored reading {} ({} / {} = {})",
            reading.id, reading.sensor_id, reading.metric_type, reading.value
        );

        let alert = self.on_reading_ingested(&reading).await?;
        Ok(Ingested { reading, alert })
    }

    /// Evaluate `reading`, which must already be in the reading store, and
    /// persist an alert if it completes a breach run.
    ///
    /// Callers serialize per sensor+metric; [`ingest`](Self::ingest) does so
    /// by holding the pair lock.
    async fn on_reading_ingested(&self, reading: &Reading) -> Result<Option<Alert>, AlertingError> {
        // ---
        let metric_type = normalize_metric_type(&reading.metric_type);

        let Some(spec) = self.policy.resolve(&metric_type) else {
            debug!(
                "No threshold configured for metric '{}', skipping alert check",
                metric_type
            );
            return Ok(None);
        };

        let history = self
            .readings
            .recent_for(RecentQuery {
                sensor_id: &reading.sensor_id,
                metric_type: &metric_type,
                up_to: reading.timestamp_utc,
                exclude: Some(reading.id),
                limit: self.required_count - 1,
            })
            .await
            .map_err(AlertingError::History)?;

        let mut values = Vec::with_capacity(history.len() + 1);
        values.push(reading.value);
        values.extend(history.iter().map(|r| r.value));

        if values.len() < self.required_count {
            debug!(
                "Sensor '{}' metric '{}': {} of {} readings available, skipping",
                reading.sensor_id,
                metric_type,
                values.len(),
                self.required_count
            );
            return Ok(None);
        }

        if !is_consecutive_breach(&values, &spec, self.required_count) {
            return Ok(None);
        }

        let alert = Alert {
            id: Uuid::new_v4(),
            sensor_id: reading.sensor_id.clone(),
            metric_type,
            alert_kind: format!("Consecutive {} breach", self.required_count),
            value: reading.value,
            threshold: spec.max(),
            threshold_min: spec.min(),
            timestamp_utc: Utc::now(),
        };

        let alert = self
            .alerts
            .append(alert)
            .await
            .map_err(|source| AlertingError::Persist {
                reading_id: reading.id,
                source,
            })?;

        warn!(
            "Alert created for sensor '{}', metric '{}', value {} ({} policy, threshold {})",
            alert.sensor_id,
            alert.metric_type,
            alert.value,
            if spec.is_range() { "range" } else { "upper" },
            alert.threshold
        );
        Ok(Some(alert))
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::error::StoreError;
    use crate::store::{MemoryAlertStore, MemoryReadingStore, StoreResult};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::oneshot;

    struct Harness {
        engine: AlertingEngine,
        readings: Arc<MemoryReadingStore>,
        alerts: Arc<MemoryAlertStore>,
        clock: DateTime<Utc>,
    }

    impl Harness {
        fn new(required_count: usize) -> Self {
            // ---
            let mut config = AlertingConfig::default();
            config.consecutive_breach_count = required_count;
            config.thresholds.custom.insert("pressure".to_string(), 1050.0);

            let readings = Arc::new(MemoryReadingStore::new());
            let alerts = Arc::new(MemoryAlertStore::new());
            let engine = AlertingEngine::new(&config, readings.clone(), alerts.clone());

            Self {
                engine,
                readings,
                alerts,
                clock: Utc.with_ymd_and_hms(2025, 9, 2, 20, 0, 0).unwrap(),
            }
        }

        /// Store a reading one second after the previous one, then evaluate it.
        async fn ingest(&mut self, sensor_id: &str, metric_type: &str, value: f64) -> Option<Alert> {
            // ---
            self.clock += Duration::seconds(1);
            let reading = Reading {
                id: Uuid::new_v4(),
                sensor_id: sensor_id.to_string(),
                metric_type: normalize_metric_type(metric_type),
                value,
                timestamp_utc: self.clock,
            };
            let reading = self.readings.append(reading).await.unwrap();
            self.engine.on_reading_ingested(&reading).await.unwrap()
        }

        async fn alert_count(&self) -> usize {
            self.alerts.recent(usize::MAX).await.unwrap().len()
        }
    }

    #[tokio::test]
    async fn test_unconfigured_metric_never_alerts() {
        // ---
        let mut h = Harness::new(3);
        for _ in 0..10 {
            assert!(h.ingest("s1", "vibration", 1e12).await.is_none());
        }
        assert_eq!(h.alert_count().await, 0);
    }

    #[tokio::test]
    async fn test_three_consecutive_breaches_alert_with_newest_value() {
        // ---
        let mut h = Harness::new(3);
        assert!(h.ingest("s1", "temperature", 31.0).await.is_none());
        assert!(h.ingest("s1", "temperature", 32.0).await.is_none());

        let alert = h.ingest("s1", "temperature", 33.5).await.unwrap();
        assert_eq!(alert.value, 33.5);
        assert_eq!(alert.sensor_id, "s1");
        assert_eq!(alert.metric_type, "temperature");
        assert_eq!(alert.alert_kind, "Consecutive 3 breach");
        assert_eq!(alert.threshold, 30.0);
        assert_eq!(alert.threshold_min, None);
        assert_eq!(h.alert_count().await, 1);
    }

    #[tokio::test]
    async fn test_ingested_reading_is_not_counted_twice() {
        // ---
        // Two breaching readings plus one in range earlier must not look like three
        let mut h = Harness::new(3);
        h.ingest("s1", "temperature", 10.0).await;
        h.ingest("s1", "temperature", 31.0).await;
        assert!(h.ingest("s1", "temperature", 31.0).await.is_none());
    }

    #[tokio::test]
    async fn test_interior_in_range_value_prevents_alert() {
        // ---
        let mut h = Harness::new(3);
        h.ingest("s1", "temperature", 500.0).await;
        h.ingest("s1", "temperature", 30.0).await;
        assert!(h.ingest("s1", "temperature", 500.0).await.is_none());
        assert!(h.ingest("s1", "temperature", 500.0).await.is_none());
        assert_eq!(h.alert_count().await, 0);

        // The run is recomputed from history, so the third breach after the gap alerts
        assert!(h.ingest("s1", "temperature", 500.0).await.is_some());
    }

    #[tokio::test]
    async fn test_each_reading_in_a_long_run_alerts() {
        // ---
        let mut h = Harness::new(3);
        for _ in 0..5 {
            h.ingest("s1", "temperature", 40.0).await;
        }
        assert_eq!(h.alert_count().await, 3);
    }

    #[tokio::test]
    async fn test_humidity_range_records_both_bounds() {
        // ---
        let mut h = Harness::new(3);
        h.ingest("s1", "humidity", 15.0).await;
        h.ingest("s1", "humidity", 15.0).await;
        let alert = h.ingest("s1", "humidity", 15.0).await.unwrap();

        assert_eq!(alert.threshold, 70.0);
        assert_eq!(alert.threshold_min, Some(20.0));
    }

    #[tokio::test]
    async fn test_humidity_gap_in_range_prevents_alert() {
        // ---
        let mut h = Harness::new(3);
        h.ingest("s1", "humidity", 15.0).await;
        h.ingest("s1", "humidity", 25.0).await;
        assert!(h.ingest("s1", "humidity", 15.0).await.is_none());
    }

    #[tokio::test]
    async fn test_mixed_case_metric_shares_history() {
        // ---
        let mut h = Harness::new(3);
        h.ingest("s1", "Temperature", 31.0).await;
        h.ingest("s1", "TEMPERATURE", 31.0).await;
        let alert = h.ingest("s1", "temperature", 31.0).await.unwrap();
        assert_eq!(alert.metric_type, "temperature");
    }

    #[tokio::test]
    async fn test_sensors_are_evaluated_independently() {
        // ---
        let mut h = Harness::new(3);
        h.ingest("s1", "temperature", 31.0).await;
        h.ingest("s2", "temperature", 31.0).await;
        h.ingest("s1", "temperature", 31.0).await;
        assert!(h.ingest("s2", "temperature", 10.0).await.is_none());
        assert!(h.ingest("s1", "temperature", 31.0).await.is_some());
    }

    #[tokio::test]
    async fn test_custom_metric_threshold() {
        // ---
        let mut h = Harness::new(2);
        h.ingest("s1", "pressure", 1051.0).await;
        let alert = h.ingest("s1", "Pressure", 1060.0).await.unwrap();
        assert_eq!(alert.threshold, 1050.0);
        assert_eq!(alert.alert_kind, "Consecutive 2 breach");
    }

    #[tokio::test]
    async fn test_required_count_one_alerts_on_every_breach() {
        // ---
        let mut h = Harness::new(1);
        assert!(h.ingest("s1", "temperature", 31.0).await.is_some());
        assert!(h.ingest("s1", "temperature", 29.0).await.is_none());
        assert!(h.ingest("s1", "temperature", 31.0).await.is_some());
    }

    #[tokio::test]
    async fn test_zero_required_count_is_clamped() {
        // ---
        let h = Harness::new(0);
        assert_eq!(h.engine.required_count(), 1);
    }

    fn new_reading(sensor_id: &str, metric_type: &str, value: f64) -> NewReading {
        NewReading {
            sensor_id: sensor_id.to_string(),
            metric_type: metric_type.to_string(),
            value,
            timestamp: None,
        }
    }

    type Gate = (oneshot::Sender<()>, oneshot::Receiver<()>);

    /// Reading store whose next `append` can be held open until released.
    struct GatedReadingStore {
        inner: MemoryReadingStore,
        gate: StdMutex<Option<Gate>>,
    }

    impl GatedReadingStore {
        fn new() -> Self {
            Self {
                inner: MemoryReadingStore::new(),
                gate: StdMutex::new(None),
            }
        }

        /// Hold the next append. Returns a receiver that fires once that
        /// append has started, and a sender that lets it finish.
        fn arm(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
            let (entered_tx, entered_rx) = oneshot::channel();
            let (release_tx, release_rx) = oneshot::channel();
            *self.gate.lock().unwrap() = Some((entered_tx, release_rx));
            (entered_rx, release_tx)
        }
    }

    #[async_trait]
    impl ReadingStore for GatedReadingStore {
        async fn append(&self, reading: Reading) -> StoreResult<Reading> {
            let gate = self.gate.lock().unwrap().take();
            if let Some((entered, release)) = gate {
                let _ = entered.send(());
                let _ = release.await;
            }
            self.inner.append(reading).await
        }

        async fn recent_for(&self, query: RecentQuery<'_>) -> StoreResult<Vec<Reading>> {
            self.inner.recent_for(query).await
        }

        async fn in_window(&self, metric_type: &str, start: DateTime<Utc>) -> StoreResult<Vec<Reading>> {
            self.inner.in_window(metric_type, start).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_slow_append_does_not_hide_reading_from_next_evaluation() {
        // ---
        // A is stamped first but its write stalls; B arrives meanwhile. B must
        // not be stamped or evaluated until A is stored, so B sees the full run.
        let readings = Arc::new(GatedReadingStore::new());
        let alerts = Arc::new(MemoryAlertStore::new());
        let engine = Arc::new(AlertingEngine::new(
            &AlertingConfig::default(),
            readings.clone(),
            alerts.clone(),
        ));

        let first = engine.ingest(new_reading("s1", "temperature", 40.0)).await.unwrap();
        assert!(first.alert.is_none());

        let (entered, release) = readings.arm();
        let task_a = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.ingest(new_reading("s1", "temperature", 41.0)).await })
        };
        entered.await.unwrap();

        let task_b = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.ingest(new_reading("s1", "temperature", 42.0)).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        release.send(()).unwrap();

        let a = task_a.await.unwrap().unwrap();
        let b = task_b.await.unwrap().unwrap();

        assert!(a.alert.is_none());
        assert!(b.reading.timestamp_utc >= a.reading.timestamp_utc);
        assert_eq!(b.alert.map(|alert| alert.value), Some(42.0));
        assert_eq!(alerts.recent(usize::MAX).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_matches_sequential_evaluation() {
        // ---
        let readings = Arc::new(MemoryReadingStore::new());
        let alerts = Arc::new(MemoryAlertStore::new());
        let engine = AlertingEngine::new(&AlertingConfig::default(), readings.clone(), alerts.clone());

        let mut raised = Vec::new();
        for value in [31.0, 32.0, 33.0, 10.0, 34.0] {
            let ingested = engine.ingest(new_reading(" s1 ", "Temperature", value)).await.unwrap();
            assert_eq!(ingested.reading.sensor_id, "s1");
            assert_eq!(ingested.reading.metric_type, "temperature");
            raised.push(ingested.alert.is_some());
        }
        assert_eq!(raised, vec![false, false, true, false, false]);
    }

    #[tokio::test]
    async fn test_invalid_reading_is_not_stored() {
        // ---
        let readings = Arc::new(MemoryReadingStore::new());
        let engine = AlertingEngine::new(
            &AlertingConfig::default(),
            readings.clone(),
            Arc::new(MemoryAlertStore::new()),
        );

        let err = engine
            .ingest(new_reading("s1", "temperature", f64::NAN))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Invalid(_)));

        let window = readings
            .in_window("temperature", Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert!(window.is_empty());
    }

    /// Stores readings but cannot read history back.
    struct BrokenHistoryStore {
        inner: MemoryReadingStore,
    }

    #[async_trait]
    impl ReadingStore for BrokenHistoryStore {
        async fn append(&self, reading: Reading) -> StoreResult<Reading> {
            self.inner.append(reading).await
        }

        async fn recent_for(&self, _query: RecentQuery<'_>) -> StoreResult<Vec<Reading>> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn in_window(&self, metric_type: &str, start: DateTime<Utc>) -> StoreResult<Vec<Reading>> {
            self.inner.in_window(metric_type, start).await
        }
    }

    #[tokio::test]
    async fn test_history_failure_reports_error_without_alert() {
        // ---
        let readings = Arc::new(BrokenHistoryStore {
            inner: MemoryReadingStore::new(),
        });
        let alerts = Arc::new(MemoryAlertStore::new());
        let engine = AlertingEngine::new(&AlertingConfig::default(), readings.clone(), alerts.clone());

        let err = engine
            .ingest(new_reading("s1", "temperature", 99.0))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Alerting(AlertingError::History(_))));

        assert!(alerts.recent(usize::MAX).await.unwrap().is_empty());
        let window = readings
            .in_window("temperature", Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
    }

    struct FailingAlertStore;

    #[async_trait]
    impl AlertStore for FailingAlertStore {
        async fn append(&self, _alert: Alert) -> StoreResult<Alert> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }

        async fn count_in_window(&self, _metric_type: &str, _start: DateTime<Utc>) -> StoreResult<u64> {
            Ok(0)
        }

        async fn recent(&self, _limit: usize) -> StoreResult<Vec<Alert>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_alert_write_failure_keeps_reading() {
        // ---
        let readings = Arc::new(MemoryReadingStore::new());
        let engine = AlertingEngine::new(
            &AlertingConfig {
                consecutive_breach_count: 1,
                ..AlertingConfig::default()
            },
            readings.clone(),
            Arc::new(FailingAlertStore),
        );

        let reading = Reading {
            id: Uuid::new_v4(),
            sensor_id: "s1".to_string(),
            metric_type: "temperature".to_string(),
            value: 99.0,
            timestamp_utc: Utc::now(),
        };
        let reading = readings.append(reading).await.unwrap();

        let err = engine.on_reading_ingested(&reading).await.unwrap_err();
        match err {
            AlertingError::Persist { reading_id, .. } => assert_eq!(reading_id, reading.id),
            other => panic!("unexpected error: {other}"),
        }

        let window = readings
            .in_window("temperature", reading.timestamp_utc)
            .await
            .unwrap();
        assert_eq!(window, vec![reading]);
    }
}
