use crate::config::ThresholdConfig;

// ---

/// Resolved threshold policy for one metric type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdSpec {
    /// Breach when the value is strictly above `max`.
    Upper { max: f64 },
    /// Breach when the value is strictly below `min` or strictly above `max`.
    Range { min: f64, max: f64 },
}

impl ThresholdSpec {
    pub fn is_range(&self) -> bool {
        matches!(self, Self::Range { .. })
    }

    /// Lower bound, `None` for upper-bound-only policies.
    pub fn min(&self) -> Option<f64> {
        match self {
            Self::Upper { .. } => None,
            Self::Range { min, .. } => Some(*min),
        }
    }

    pub fn max(&self) -> f64 {
        match self {
            Self::Upper { max } | Self::Range { max, .. } => *max,
        }
    }

    /// Whether a single value falls outside the policy. Values equal to a
    /// bound are inside.
    pub fn is_breach(&self, value: f64) -> bool {
        match *self {
            Self::Upper { max } => value > max,
            Self::Range { min, max } => value < min || value > max,
        }
    }
}

/// Maps metric types to threshold policies.
///
/// `temperature` is upper-bound-only, `humidity` is a min/max range, and any
/// other metric type uses its configured upper bound if one exists.
#[derive(Debug, Clone)]
pub struct ThresholdPolicy {
    config: ThresholdConfig,
}

impl ThresholdPolicy {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    /// Resolve the policy for `metric_type` (compared case-insensitively).
    ///
    /// `None` means no policy is configured and evaluation is skipped. A
    /// NaN bound is treated the same way.
    pub fn resolve(&self, metric_type: &str) -> Option<ThresholdSpec> {
        // ---
        let metric_type = metric_type.trim().to_lowercase();
        let spec = match metric_type.as_str() {
            "temperature" => ThresholdSpec::Upper {
                max: self.config.temperature_max,
            },
            "humidity" => ThresholdSpec::Range {
                min: self.config.humidity_min,
                max: self.config.humidity_max,
            },
            other => ThresholdSpec::Upper {
                max: *self.config.custom.get(other)?,
            },
        };

        if spec.max().is_nan() || spec.min().is_some_and(f64::is_nan) {
            return None;
        }
        Some(spec)
    }
}
