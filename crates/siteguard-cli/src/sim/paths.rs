//! Movement path implementations.

use siteguard_core::GeoPoint;

/// Position of a simulated entity over time.
pub trait MovementPath: Send + Sync {
    /// Position at `t` seconds from the start.
    fn position(&self, t: f64) -> GeoPoint;

    /// Seconds until the path ends; `None` for open-ended paths.
    fn duration_s(&self) -> Option<f64> {
        None
    }
}

/// An entity that does not move.
pub struct StationaryPath {
    pub point: GeoPoint,
}

impl StationaryPath {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            point: GeoPoint::new(lat, lon),
        }
    }
}

impl MovementPath for StationaryPath {
    fn position(&self, _t: f64) -> GeoPoint {
        self.point
    }
}

/// Straight line from `start` to `end`, then parked at `end`.
pub struct LinearPath {
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub travel_s: f64,
}

impl LinearPath {
    pub fn new(start: GeoPoint, end: GeoPoint, travel_s: f64) -> Self {
        Self {
            start,
            end,
            travel_s: travel_s.max(f64::EPSILON),
        }
    }
}

impl MovementPath for LinearPath {
    fn position(&self, t: f64) -> GeoPoint {
        let progress = (t / self.travel_s).clamp(0.0, 1.0);
        GeoPoint::new(
            self.start.lat + (self.end.lat - self.start.lat) * progress,
            self.start.lon + (self.end.lon - self.start.lon) * progress,
        )
    }

    fn duration_s(&self) -> Option<f64> {
        Some(self.travel_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_path_interpolates_and_parks() {
        let path = LinearPath::new(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 10.0), 10.0);
        assert_eq!(path.position(0.0), GeoPoint::new(0.0, 0.0));
        assert_eq!(path.position(5.0), GeoPoint::new(0.0, 5.0));
        assert_eq!(path.position(30.0), GeoPoint::new(0.0, 10.0));
        assert_eq!(path.duration_s(), Some(10.0));
    }

    #[test]
    fn stationary_path_never_moves() {
        let path = StationaryPath::new(1.0, 2.0);
        assert_eq!(path.position(0.0), path.position(1000.0));
        assert_eq!(path.duration_s(), None);
    }
}
