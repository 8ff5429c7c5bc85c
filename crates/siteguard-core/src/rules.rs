//! Tuning rules and thresholds for tracking and proximity alerts.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RulesError {
    #[error("collision threshold must be a positive finite number of degrees, got {0}")]
    InvalidThreshold(f64),
}

/// Shortest loop or sound period honoured, in milliseconds.
pub const MIN_PERIOD_MS: u64 = 1;

/// Configuration for tracking and alerting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingRules {
    /// Worker/machine separation that raises an alert, in raw degrees
    pub collision_threshold_deg: f64,
    /// A held fix older than this is replaced by any newer fix (milliseconds)
    pub staleness_window_ms: u64,
    /// Accuracy loss tolerated for a newer fix from the same provider (meters)
    pub accuracy_margin_m: f64,
    /// Period of the local location publish loop (milliseconds)
    pub location_refresh_ms: u64,
    /// Period of the collision check loop (milliseconds)
    pub collision_check_ms: u64,
    /// Interval between alert sound repeats (milliseconds)
    pub alert_sound_interval_ms: u64,
}

impl Default for TrackingRules {
    fn default() -> Self {
        Self {
            collision_threshold_deg: 0.0001,
            staleness_window_ms: 2 * 60 * 1000,
            accuracy_margin_m: 200.0,
            location_refresh_ms: 2000,
            collision_check_ms: 1000,
            alert_sound_interval_ms: 2000,
        }
    }
}

impl TrackingRules {
    pub fn location_refresh(&self) -> Duration {
        Duration::from_millis(self.location_refresh_ms.max(MIN_PERIOD_MS))
    }

    pub fn collision_check(&self) -> Duration {
        Duration::from_millis(self.collision_check_ms.max(MIN_PERIOD_MS))
    }

    pub fn alert_sound_interval(&self) -> Duration {
        Duration::from_millis(self.alert_sound_interval_ms.max(MIN_PERIOD_MS))
    }
}

/// Accept only thresholds the collision engine can use.
pub fn validate_threshold(threshold_deg: f64) -> Result<f64, RulesError> {
    if threshold_deg.is_finite() && threshold_deg > 0.0 {
        Ok(threshold_deg)
    } else {
        Err(RulesError::InvalidThreshold(threshold_deg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_field_calibration() {
        let rules = TrackingRules::default();
        assert_eq!(rules.collision_threshold_deg, 0.0001);
        assert_eq!(rules.staleness_window_ms, 120_000);
        assert_eq!(rules.accuracy_margin_m, 200.0);
        assert_eq!(rules.collision_check(), Duration::from_secs(1));
        assert_eq!(rules.location_refresh(), Duration::from_secs(2));
    }

    #[test]
    fn zero_periods_are_raised_to_the_minimum() {
        let rules = TrackingRules {
            collision_check_ms: 0,
            alert_sound_interval_ms: 0,
            ..TrackingRules::default()
        };
        assert_eq!(rules.collision_check(), Duration::from_millis(1));
        assert_eq!(rules.alert_sound_interval(), Duration::from_millis(1));
    }

    #[test]
    fn threshold_must_be_positive_and_finite() {
        assert_eq!(validate_threshold(0.0002), Ok(0.0002));
        assert!(validate_threshold(0.0).is_err());
        assert!(validate_threshold(-0.1).is_err());
        assert!(validate_threshold(f64::NAN).is_err());
        assert!(validate_threshold(f64::INFINITY).is_err());
    }
}
