//! Pre-defined worksite scenarios for exercising the alert pipeline.

use siteguard_core::{EntityKind, GeoPoint, Worksite};
use std::sync::Arc;

use super::paths::{LinearPath, MovementPath, StationaryPath};

/// Half-width of the generated worksite image, in degrees.
const SITE_HALF_SPAN_DEG: f64 = 0.002;

/// A named worksite with simulated entities.
pub struct Scenario {
    pub name: String,
    pub worksite: Worksite,
    pub entities: Vec<(String, EntityKind, Arc<dyn MovementPath>)>,
}

impl Scenario {
    /// Time until every finite path has ended.
    pub fn duration_s(&self) -> f64 {
        self.entities
            .iter()
            .filter_map(|(_, _, path)| path.duration_s())
            .fold(0.0, f64::max)
    }
}

/// A worker standing at the center while a machine drives past.
///
/// The machine starts `pass_offset_deg` west of the worker and ends the same
/// distance east, so the alert should raise midway and clear again.
pub fn create_approach_scenario(
    worksite: &str,
    center_lat: f64,
    center_lon: f64,
    pass_offset_deg: f64,
    travel_s: f64,
) -> Scenario {
    let site = Worksite::new(
        worksite,
        GeoPoint::new(center_lat + SITE_HALF_SPAN_DEG, center_lon - SITE_HALF_SPAN_DEG)
            .to_feed_string(),
        GeoPoint::new(center_lat - SITE_HALF_SPAN_DEG, center_lon + SITE_HALF_SPAN_DEG)
            .to_feed_string(),
    );

    let worker = Arc::new(StationaryPath::new(center_lat, center_lon));
    let machine = Arc::new(LinearPath::new(
        GeoPoint::new(center_lat, center_lon - pass_offset_deg),
        GeoPoint::new(center_lat, center_lon + pass_offset_deg),
        travel_s,
    ));

    Scenario {
        name: "approach".to_string(),
        worksite: site,
        entities: vec![
            ("WORKER001".to_string(), EntityKind::Worker, worker),
            ("MACHINE001".to_string(), EntityKind::Machine, machine),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separation(scenario: &Scenario, t: f64) -> f64 {
        let a = scenario.entities[0].2.position(t);
        let b = scenario.entities[1].2.position(t);
        ((a.lat - b.lat).powi(2) + (a.lon - b.lon).powi(2)).sqrt()
    }

    #[test]
    fn machine_passes_through_the_worker() {
        let scenario = create_approach_scenario("quarry", 33.0, -117.0, 0.001, 20.0);
        assert_eq!(scenario.duration_s(), 20.0);
        assert!(separation(&scenario, 0.0) > 0.0001);
        assert!(separation(&scenario, 10.0) < 1e-9);
        assert!(separation(&scenario, 20.0) > 0.0001);
    }

    #[test]
    fn worksite_bounds_cover_the_pass() {
        let scenario = create_approach_scenario("quarry", 33.0, -117.0, 0.001, 20.0);
        let bounds = scenario.worksite.bounds().unwrap();
        let start = scenario.entities[1].2.position(0.0);
        assert!(bounds.contains(&start));
    }
}
