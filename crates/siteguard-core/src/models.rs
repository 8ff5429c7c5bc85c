//! Core data models for the worksite tracking system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::coords::{CoordError, GeoPoint};
use crate::projection::{ProjectionError, WorksiteBounds};

/// Source of a position fix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Satellite receiver on the device
    Gps,
    /// Cell/Wi-Fi derived position
    Network,
    /// Platform fused provider
    Fused,
    /// Reported by another device over the feed
    #[default]
    Remote,
}

/// A single position reading. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub lat: f64,
    pub lon: f64,
    pub provider: Provider,
    /// Estimated error radius in meters (lower is better)
    pub accuracy_m: f64,
    pub timestamp: DateTime<Utc>,
}

impl PositionFix {
    /// Accuracy recorded when a reading does not report one. Any measured
    /// fix within the staleness window outranks it.
    pub const UNKNOWN_ACCURACY_M: f64 = f64::MAX;

    pub fn new(
        lat: f64,
        lon: f64,
        provider: Provider,
        accuracy_m: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            lat,
            lon,
            provider,
            accuracy_m,
            timestamp,
        }
    }

    /// Build a fix from a feed point.
    pub fn from_point(
        point: GeoPoint,
        provider: Provider,
        accuracy_m: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(point.lat, point.lon, provider, accuracy_m, timestamp)
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Worker,
    Machine,
}

/// A worker or machine tracked on a worksite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEntity {
    /// Stable hardware identifier, primary key across the system
    pub id: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub name: Option<String>,
    pub worksite_id: String,
    #[serde(default)]
    pub current_fix: Option<PositionFix>,
}

impl TrackedEntity {
    pub fn new(id: impl Into<String>, kind: EntityKind, worksite_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: None,
            worksite_id: worksite_id.into(),
            current_fix: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_fix(mut self, fix: PositionFix) -> Self {
        self.current_fix = Some(fix);
        self
    }
}

/// Alert flag for one entity, as written to the alert bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    pub entity_id: String,
    pub active: bool,
}

impl AlertState {
    pub fn new(entity_id: impl Into<String>, active: bool) -> Self {
        Self {
            entity_id: entity_id.into(),
            active,
        }
    }
}

/// A point in worksite image (pixel) space. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalPoint {
    pub x: i64,
    pub y: i64,
}

impl LocalPoint {
    /// Where out-of-frame entities are drawn so they stay off the canvas.
    pub const OFF_CANVAS: LocalPoint = LocalPoint { x: -50, y: -50 };

    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Worksite record as held by the external record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worksite {
    pub name: String,
    /// `"<lat>,<lon>"` of the image's top-left corner
    pub top_left_gps: String,
    /// `"<lat>,<lon>"` of the image's bottom-right corner
    pub bottom_right_gps: String,
    #[serde(default)]
    pub worker_ids: BTreeSet<String>,
    #[serde(default)]
    pub machine_ids: BTreeSet<String>,
}

impl Worksite {
    pub fn new(
        name: impl Into<String>,
        top_left_gps: impl Into<String>,
        bottom_right_gps: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            top_left_gps: top_left_gps.into(),
            bottom_right_gps: bottom_right_gps.into(),
            worker_ids: BTreeSet::new(),
            machine_ids: BTreeSet::new(),
        }
    }

    pub fn add_entity(&mut self, kind: EntityKind, id: impl Into<String>) {
        match kind {
            EntityKind::Worker => self.worker_ids.insert(id.into()),
            EntityKind::Machine => self.machine_ids.insert(id.into()),
        };
    }

    pub fn remove_entity(&mut self, id: &str) {
        self.worker_ids.remove(id);
        self.machine_ids.remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.worker_ids.contains(id) || self.machine_ids.contains(id)
    }

    /// Parse both corners strictly.
    pub fn corners(&self) -> Result<(GeoPoint, GeoPoint), CoordError> {
        Ok((
            GeoPoint::parse(&self.top_left_gps)?,
            GeoPoint::parse(&self.bottom_right_gps)?,
        ))
    }

    /// Validated image bounds. Unparseable corners collapse to the origin
    /// sentinel, which then surfaces as a degenerate-bounds error.
    pub fn bounds(&self) -> Result<WorksiteBounds, ProjectionError> {
        let (top_left, _) = GeoPoint::parse_or_origin(&self.top_left_gps);
        let (bottom_right, _) = GeoPoint::parse_or_origin(&self.bottom_right_gps);
        let bounds = WorksiteBounds::new(top_left, bottom_right);
        bounds.validate()?;
        Ok(bounds)
    }
}

/// Normalize a hardware address into the key used on the bus and in the store.
///
/// `"f4:a4:9e:fc:ce:05"` becomes `"F4A49EFCCE05"`.
pub fn normalize_device_id(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
