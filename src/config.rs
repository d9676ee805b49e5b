//! Configuration loader for the `sensorflow-alerting` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). The environment is snapshotted once into a map so
//! that the alerting engine receives an immutable configuration value instead
//! of performing live lookups.
//!
use std::collections::HashMap;
use std::env;

use anyhow::{anyhow, bail, Result};

/// Parse an optional environment variable of type `$ty` with a default value.
macro_rules! parse_var {
    ($vars:expr, $var_name:expr, $ty:ty, $default:expr) => {
        $vars
            .get($var_name)
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional threshold variable, rejecting non-finite values.
macro_rules! parse_threshold {
    ($vars:expr, $var_name:expr, $default:expr) => {
        finite($var_name, parse_var!($vars, $var_name, f64, $default))?
    };
}

const THRESHOLD_PREFIX: &str = "THRESHOLDS_";
const TEMPERATURE_VAR: &str = "THRESHOLDS_TEMPERATURE";
const HUMIDITY_MIN_VAR: &str = "THRESHOLDS_HUMIDITY_MIN";
const HUMIDITY_MAX_VAR: &str = "THRESHOLDS_HUMIDITY_MAX";

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string. When absent the service runs on
    /// in-memory stores.
    pub db_url: Option<String>,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// TCP port the HTTP server binds to.
    pub listen_port: u16,

    /// Settings consumed by the alerting engine.
    pub alerting: AlertingConfig,
}

/// Settings for consecutive-breach detection.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertingConfig {
    // ---
    /// Number of consecutive breaching readings required to raise an alert.
    /// Always at least 1.
    pub consecutive_breach_count: usize,

    pub thresholds: ThresholdConfig,
}

/// Per-metric-type threshold values.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdConfig {
    // ---
    pub temperature_max: f64,
    pub humidity_min: f64,
    pub humidity_max: f64,

    /// Upper bounds for any other metric type, keyed by lowercase name.
    pub custom: HashMap<String, f64>,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            consecutive_breach_count: 3,
            thresholds: ThresholdConfig::default(),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            temperature_max: 30.0,
            humidity_min: 20.0,
            humidity_max: 70.0,
            custom: HashMap::new(),
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `DATABASE_URL` – PostgreSQL connection string (unset: in-memory stores)
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `LISTEN_PORT` – HTTP port (default: 8080)
/// - `ALERTING_CONSECUTIVE_BREACH_COUNT` – breach run length (default: 3)
/// - `THRESHOLDS_TEMPERATURE` – temperature upper bound (default: 30.0)
/// - `THRESHOLDS_HUMIDITY_MIN` / `THRESHOLDS_HUMIDITY_MAX` – humidity range
///   (default: 20.0 / 70.0)
/// - `THRESHOLDS_<METRIC>` – upper bound for any other metric type
///
/// Returns an error if any variable is present but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    load_from(&env::vars().collect())
}

/// Build a [`Config`] from an explicit variable map.
pub fn load_from(vars: &HashMap<String, String>) -> Result<Config> {
    // ---
    let db_url = vars
        .get("DATABASE_URL")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let db_pool_max = parse_var!(vars, "DB_POOL_MAX", u32, 5);
    let listen_port = parse_var!(vars, "LISTEN_PORT", u16, 8080);

    let consecutive_breach_count = parse_var!(vars, "ALERTING_CONSECUTIVE_BREACH_COUNT", usize, 3);
    if consecutive_breach_count == 0 {
        bail!("ALERTING_CONSECUTIVE_BREACH_COUNT must be at least 1");
    }

    let defaults = ThresholdConfig::default();
    let temperature_max = parse_threshold!(vars, TEMPERATURE_VAR, defaults.temperature_max);
    let humidity_min = parse_threshold!(vars, HUMIDITY_MIN_VAR, defaults.humidity_min);
    let humidity_max = parse_threshold!(vars, HUMIDITY_MAX_VAR, defaults.humidity_max);
    if humidity_min > humidity_max {
        bail!(
            "{} ({}) must not exceed {} ({})",
            HUMIDITY_MIN_VAR,
            humidity_min,
            HUMIDITY_MAX_VAR,
            humidity_max
        );
    }

    let mut custom = HashMap::new();
    for (name, raw) in vars {
        if !name.starts_with(THRESHOLD_PREFIX)
            || [TEMPERATURE_VAR, HUMIDITY_MIN_VAR, HUMIDITY_MAX_VAR].contains(&name.as_str())
        {
            continue;
        }
        let metric = name[THRESHOLD_PREFIX.len()..].to_lowercase();
        if metric.is_empty() {
            continue;
        }
        let value = raw
            .trim()
            .parse::<f64>()
            .map_err(|e| anyhow!("Invalid {}: {}", name, e))?;
        custom.insert(metric, finite(name, value)?);
    }

    Ok(Config {
        db_url,
        db_pool_max,
        listen_port,
        alerting: AlertingConfig {
            consecutive_breach_count,
            thresholds: ThresholdConfig {
                temperature_max,
                humidity_min,
                humidity_max,
                custom,
            },
        },
    })
}

fn finite(var_name: &str, value: f64) -> Result<f64> {
    // ---
    if value.is_finite() {
        Ok(value)
    } else {
        Err(anyhow!("Invalid {}: threshold must be finite, got {}", var_name, value))
    }
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords while showing
    /// all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        let db_display = match &self.db_url {
            Some(url) => mask_password(url),
            None => "<unset: in-memory stores>".to_string(),
        };
        let thresholds = &self.alerting.thresholds;

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL                      : {}", db_display);
        tracing::info!("  DB_POOL_MAX                       : {}", self.db_pool_max);
        tracing::info!("  LISTEN_PORT                       : {}", self.listen_port);
        tracing::info!(
            "  ALERTING_CONSECUTIVE_BREACH_COUNT : {}",
            self.alerting.consecutive_breach_count
        );
        tracing::info!("  THRESHOLDS_TEMPERATURE            : {}", thresholds.temperature_max);
        tracing::info!("  THRESHOLDS_HUMIDITY_MIN           : {}", thresholds.humidity_min);
        tracing::info!("  THRESHOLDS_HUMIDITY_MAX           : {}", thresholds.humidity_max);
        for (metric, max) in &thresholds.custom {
            tracing::info!("  THRESHOLDS_{:<23}: {}", metric.to_uppercase(), max);
        }
    }
}

/// Mask the password in a connection URL.
fn mask_password(db_url: &str) -> String {
    // ---
    if let Some(at_pos) = db_url.rfind('@') {
        if let Some(colon_pos) = db_url[..at_pos].rfind(':') {
            return format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..]);
        }
    }
    db_url.to_string()
}
