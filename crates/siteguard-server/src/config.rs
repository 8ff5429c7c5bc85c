//! Server configuration from environment.

use std::env;
use std::str::FromStr;

use siteguard_core::{normalize_device_id, TrackingRules, MIN_PERIOD_MS};

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_path: String,
    pub database_max_connections: u32,
    /// Hardware id of the device this process runs on, if it is tracked itself
    pub device_id: Option<String>,
    /// Worksite loaded into the fusion cache at startup
    pub worksite: Option<String>,
    /// Only react to alert flags on the bus; do not run collision checks
    pub watch_only: bool,
    /// Bounded depth of the radio and sensor queues
    pub queue_depth: usize,
    pub rules: TrackingRules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            database_path: "data/siteguard.db".to_string(),
            database_max_connections: 5,
            device_id: None,
            worksite: None,
            watch_only: false,
            queue_depth: 64,
            rules: TrackingRules::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let default_rules = defaults.rules.clone();

        Self {
            server_port: env_parse("SITEGUARD_PORT").unwrap_or(defaults.server_port),
            database_path: env::var("SITEGUARD_DATABASE_PATH")
                .unwrap_or(defaults.database_path),
            database_max_connections: env_parse("SITEGUARD_DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            device_id: env::var("SITEGUARD_DEVICE_ID")
                .ok()
                .map(|raw| normalize_device_id(&raw))
                .filter(|id| !id.is_empty()),
            worksite: env::var("SITEGUARD_WORKSITE")
                .ok()
                .filter(|name| !name.trim().is_empty()),
            watch_only: env::var("SITEGUARD_WATCH_ONLY")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.watch_only),
            queue_depth: env_parse::<usize>("SITEGUARD_QUEUE_DEPTH")
                .unwrap_or(defaults.queue_depth)
                .max(1),
            rules: TrackingRules {
                collision_threshold_deg: env_parse("SITEGUARD_COLLISION_THRESHOLD_DEG")
                    .filter(|v: &f64| v.is_finite() && *v > 0.0)
                    .unwrap_or(default_rules.collision_threshold_deg),
                staleness_window_ms: env_parse("SITEGUARD_STALENESS_WINDOW_MS")
                    .unwrap_or(default_rules.staleness_window_ms),
                accuracy_margin_m: env_parse("SITEGUARD_ACCURACY_MARGIN_M")
                    .filter(|m: &f64| m.is_finite() && *m >= 0.0)
                    .unwrap_or(default_rules.accuracy_margin_m),
                location_refresh_ms: env_period("SITEGUARD_LOCATION_REFRESH_MS")
                    .unwrap_or(default_rules.location_refresh_ms),
                collision_check_ms: env_period("SITEGUARD_COLLISION_CHECK_MS")
                    .unwrap_or(default_rules.collision_check_ms),
                alert_sound_interval_ms: env_period("SITEGUARD_ALERT_SOUND_MS")
                    .unwrap_or(default_rules.alert_sound_interval_ms),
            },
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Loop periods of zero would spin.
fn env_period(key: &str) -> Option<u64> {
    env_parse::<u64>(key).map(|ms| ms.max(MIN_PERIOD_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unusable_periods_and_margins_are_not_taken_from_env() {
        env::set_var("SITEGUARD_COLLISION_CHECK_MS", "0");
        env::set_var("SITEGUARD_ALERT_SOUND_MS", "-5");
        env::set_var("SITEGUARD_ACCURACY_MARGIN_M", "NaN");
        env::set_var("SITEGUARD_LOCATION_REFRESH_MS", "250");

        let rules = Config::from_env().rules;
        assert_eq!(rules.collision_check_ms, MIN_PERIOD_MS);
        assert_eq!(rules.alert_sound_interval_ms, 2000);
        assert_eq!(rules.accuracy_margin_m, 200.0);
        assert_eq!(rules.location_refresh_ms, 250);

        env::set_var("SITEGUARD_ACCURACY_MARGIN_M", "-1");
        assert_eq!(Config::from_env().rules.accuracy_margin_m, 200.0);

        for key in [
            "SITEGUARD_COLLISION_CHECK_MS",
            "SITEGUARD_ALERT_SOUND_MS",
            "SITEGUARD_ACCURACY_MARGIN_M",
            "SITEGUARD_LOCATION_REFRESH_MS",
        ] {
            env::remove_var(key);
        }
    }
}
