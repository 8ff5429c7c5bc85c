pub mod collision;
pub mod coords;
pub mod fusion;
pub mod models;
pub mod projection;
pub mod rules;

pub use collision::{Collision, CollisionEngine, FleetSnapshot};
pub use coords::{CoordError, GeoPoint};
pub use fusion::{evaluate_fix, FixDecision, FusionPolicy, LocationFusion};
pub use models::{
    normalize_device_id, AlertState, EntityKind, LocalPoint, PositionFix, Provider,
    TrackedEntity, Worksite,
};
pub use projection::{project, Projection, ProjectionError, WorksiteBounds};
pub use rules::{RulesError, TrackingRules, MIN_PERIOD_MS};
