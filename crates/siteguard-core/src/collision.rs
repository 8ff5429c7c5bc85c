//! Worker/machine proximity detection.
//!
//! Every worker is compared against every machine on each check cycle. The
//! separation is measured as planar distance in raw degrees; the threshold is
//! calibrated against exactly this formula for a small worksite, so it is not
//! converted to meters.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::models::{EntityKind, TrackedEntity};
use crate::rules::{validate_threshold, RulesError, TrackingRules};

/// A worker and a machine found within the alert threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collision {
    pub worker_id: String,
    pub machine_id: String,
    pub distance_deg: f64,
}

/// Consistent copy of the tracked fleet taken for one detection pass.
#[derive(Debug, Clone, Default)]
pub struct FleetSnapshot {
    pub workers: HashMap<String, TrackedEntity>,
    pub machines: HashMap<String, TrackedEntity>,
}

impl FleetSnapshot {
    /// Split a flat list of entities by kind.
    pub fn from_entities<'a>(entities: impl IntoIterator<Item = &'a TrackedEntity>) -> Self {
        let mut snapshot = Self::default();
        for entity in entities {
            let target = match entity.kind {
                EntityKind::Worker => &mut snapshot.workers,
                EntityKind::Machine => &mut snapshot.machines,
            };
            target.insert(entity.id.clone(), entity.clone());
        }
        snapshot
    }

    /// Every tracked id, with or without a fix.
    pub fn entity_ids(&self) -> BTreeSet<String> {
        self.workers
            .keys()
            .chain(self.machines.keys())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len() + self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pairwise proximity detector with a runtime-adjustable threshold.
#[derive(Debug, Clone)]
pub struct CollisionEngine {
    threshold_deg: f64,
}

impl Default for CollisionEngine {
    fn default() -> Self {
        Self {
            threshold_deg: TrackingRules::default().collision_threshold_deg,
        }
    }
}

impl CollisionEngine {
    pub fn new(threshold_deg: f64) -> Result<Self, RulesError> {
        Ok(Self {
            threshold_deg: validate_threshold(threshold_deg)?,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold_deg
    }

    pub fn set_threshold(&mut self, threshold_deg: f64) -> Result<(), RulesError> {
        self.threshold_deg = validate_threshold(threshold_deg)?;
        Ok(())
    }

    /// Ids of every entity currently too close to an entity of the other kind.
    pub fn detect(&self, snapshot: &FleetSnapshot) -> BTreeSet<String> {
        detect(&snapshot.workers, &snapshot.machines, self.threshold_deg)
    }

    /// Colliding pairs, sorted by worker then machine id.
    pub fn detect_pairs(&self, snapshot: &FleetSnapshot) -> Vec<Collision> {
        detect_pairs(&snapshot.workers, &snapshot.machines, self.threshold_deg)
    }
}

/// Ids of every worker and machine in an unsafe pair.
///
/// Entities without a current fix are skipped.
pub fn detect(
    workers: &HashMap<String, TrackedEntity>,
    machines: &HashMap<String, TrackedEntity>,
    threshold_deg: f64,
) -> BTreeSet<String> {
    let mut colliding = BTreeSet::new();
    for collision in detect_pairs(workers, machines, threshold_deg) {
        colliding.insert(collision.worker_id);
        colliding.insert(collision.machine_id);
    }
    colliding
}

/// Every (worker, machine) pair within `threshold_deg`, inclusive.
pub fn detect_pairs(
    workers: &HashMap<String, TrackedEntity>,
    machines: &HashMap<String, TrackedEntity>,
    threshold_deg: f64,
) -> Vec<Collision> {
    let mut collisions = Vec::new();

    for worker in workers.values() {
        let Some(worker_fix) = worker.current_fix.as_ref() else {
            continue;
        };

        for machine in machines.values() {
            let Some(machine_fix) = machine.current_fix.as_ref() else {
                continue;
            };

            let delta_lat = worker_fix.lat - machine_fix.lat;
            let delta_lon = worker_fix.lon - machine_fix.lon;
            let distance_deg = (delta_lat.powi(2) + delta_lon.powi(2)).sqrt();

            if distance_deg <= threshold_deg {
                collisions.push(Collision {
                    worker_id: worker.id.clone(),
                    machine_id: machine.id.clone(),
                    distance_deg,
                });
            }
        }
    }

    collisions.sort_by(|a, b| {
        a.worker_id
            .cmp(&b.worker_id)
            .then_with(|| a.machine_id.cmp(&b.machine_id))
    });
    collisions
}
