//! Geographic to worksite-image projection.
//!
//! The worksite image is treated as flat and axis-aligned with north at the
//! top, so a position maps to pixels by linear interpolation between the
//! image's corner coordinates. Images that straddle the antimeridian are not
//! supported.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coords::GeoPoint;
use crate::models::LocalPoint;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("worksite bounds have zero extent (height {height_deg}, width {width_deg})")]
    DegenerateBounds { height_deg: f64, width_deg: f64 },
    #[error("worksite bounds are inverted: top-left {top_left} must be north-west of bottom-right {bottom_right}")]
    InvertedBounds {
        top_left: GeoPoint,
        bottom_right: GeoPoint,
    },
    #[error("frame size {width}x{height} has no area")]
    EmptyFrame { width: u32, height: u32 },
}

/// Corner coordinates of a worksite image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorksiteBounds {
    pub top_left: GeoPoint,
    pub bottom_right: GeoPoint,
}

impl WorksiteBounds {
    pub fn new(top_left: GeoPoint, bottom_right: GeoPoint) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    pub fn top(&self) -> f64 {
        self.top_left.lat
    }

    pub fn bottom(&self) -> f64 {
        self.bottom_right.lat
    }

    pub fn left(&self) -> f64 {
        self.top_left.lon
    }

    pub fn right(&self) -> f64 {
        self.bottom_right.lon
    }

    pub fn height_deg(&self) -> f64 {
        self.top() - self.bottom()
    }

    pub fn width_deg(&self) -> f64 {
        self.right() - self.left()
    }

    /// Check the north-up, no-wraparound invariant.
    pub fn validate(&self) -> Result<(), ProjectionError> {
        let height_deg = self.height_deg();
        let width_deg = self.width_deg();
        if height_deg == 0.0 || width_deg == 0.0 {
            return Err(ProjectionError::DegenerateBounds {
                height_deg,
                width_deg,
            });
        }
        if height_deg < 0.0 || width_deg < 0.0 {
            return Err(ProjectionError::InvertedBounds {
                top_left: self.top_left,
                bottom_right: self.bottom_right,
            });
        }
        Ok(())
    }

    /// Strictly inside the bounds (edges count as outside).
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat > self.bottom()
            && point.lat < self.top()
            && point.lon > self.left()
            && point.lon < self.right()
    }
}

/// Where a point lands in the worksite frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Projection {
    InFrame(LocalPoint),
    OutOfFrame,
}

impl Projection {
    /// Point to draw at; out-of-frame entities are parked off the canvas
    /// rather than clamped to an edge.
    pub fn render_point(&self) -> LocalPoint {
        match self {
            Projection::InFrame(point) => *point,
            Projection::OutOfFrame => LocalPoint::OFF_CANVAS,
        }
    }
}

/// Map `point` into a `frame_width` x `frame_height` image of `bounds`.
pub fn project(
    point: &GeoPoint,
    bounds: &WorksiteBounds,
    frame_width: u32,
    frame_height: u32,
) -> Result<Projection, ProjectionError> {
    bounds.validate()?;
    if frame_width == 0 || frame_height == 0 {
        return Err(ProjectionError::EmptyFrame {
            width: frame_width,
            height: frame_height,
        });
    }

    if !bounds.contains(point) {
        return Ok(Projection::OutOfFrame);
    }

    let y = ((bounds.top() - point.lat) / bounds.height_deg() * frame_height as f64).round();
    let x = ((point.lon - bounds.left()) / bounds.width_deg() * frame_width as f64).round();
    Ok(Projection::InFrame(LocalPoint::new(x as i64, y as i64)))
}
