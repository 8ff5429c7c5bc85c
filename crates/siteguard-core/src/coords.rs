//! Geographic points and the `"<lat>,<lon>"` wire format.
//!
//! Every position that crosses a process boundary (the record store, the
//! position feed, worksite corner records) is carried as a comma-joined pair of
//! decimal degrees. Parsing never panics; callers decide whether a malformed
//! string rejects the record or falls back to the origin sentinel.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors produced while parsing a coordinate string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    #[error("expected \"<lat>,<lon>\" but found {found} field(s) in {input:?}")]
    WrongFieldCount { input: String, found: usize },
    #[error("coordinate field {field:?} is not a number")]
    NotNumeric { field: String },
    #[error("coordinate field {field:?} is not finite")]
    NotFinite { field: String },
}

/// A latitude/longitude pair in decimal degrees.
///
/// On a map latitude is Y and longitude is X.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Sentinel substituted for unparseable coordinates.
    pub const ORIGIN: GeoPoint = GeoPoint { lat: 0.0, lon: 0.0 };

    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Parse a `"<lat>,<lon>"` string.
    pub fn parse(input: &str) -> Result<Self, CoordError> {
        let fields: Vec<&str> = input.split(',').collect();
        if fields.len() != 2 {
            return Err(CoordError::WrongFieldCount {
                input: input.to_string(),
                found: fields.len(),
            });
        }

        let lat = parse_field(fields[0])?;
        let lon = parse_field(fields[1])?;
        Ok(Self { lat, lon })
    }

    /// Parse a coordinate string, substituting [`GeoPoint::ORIGIN`] on failure.
    ///
    /// The error is handed back alongside the sentinel so the caller can log it
    /// with whatever context it has (entity id, worksite name).
    pub fn parse_or_origin(input: &str) -> (Self, Option<CoordError>) {
        match Self::parse(input) {
            Ok(point) => (point, None),
            Err(err) => (Self::ORIGIN, Some(err)),
        }
    }

    /// Render in the feed format accepted by [`GeoPoint::parse`].
    pub fn to_feed_string(&self) -> String {
        format!("{},{}", self.lat, self.lon)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lon)
    }
}

fn parse_field(raw: &str) -> Result<f64, CoordError> {
    let trimmed = raw.trim();
    let value: f64 = trimmed.parse().map_err(|_| CoordError::NotNumeric {
        field: trimmed.to_string(),
    })?;
    if !value.is_finite() {
        return Err(CoordError::NotFinite {
            field: trimmed.to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_degrees() {
        let point = GeoPoint::parse("33.6846,-117.8265").unwrap();
        assert_eq!(point, GeoPoint::new(33.6846, -117.8265));
    }

    #[test]
    fn tolerates_whitespace_around_fields() {
        let point = GeoPoint::parse(" 1.5 , -2.25 ").unwrap();
        assert_eq!(point, GeoPoint::new(1.5, -2.25));
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(matches!(
            GeoPoint::parse("1.0"),
            Err(CoordError::WrongFieldCount { found: 1, .. })
        ));
        assert!(matches!(
            GeoPoint::parse("1.0,2.0,3.0"),
            Err(CoordError::WrongFieldCount { found: 3, .. })
        ));
    }

    #[test]
    fn rejects_non_numeric_and_non_finite() {
        assert!(matches!(
            GeoPoint::parse("north,2.0"),
            Err(CoordError::NotNumeric { .. })
        ));
        assert!(matches!(
            GeoPoint::parse("NaN,2.0"),
            Err(CoordError::NotFinite { .. })
        ));
        assert!(matches!(GeoPoint::parse(""), Err(_)));
    }

    #[test]
    fn parse_or_origin_substitutes_sentinel() {
        let (point, err) = GeoPoint::parse_or_origin("garbage");
        assert_eq!(point, GeoPoint::ORIGIN);
        assert!(err.is_some());

        let (point, err) = GeoPoint::parse_or_origin("10,20");
        assert_eq!(point, GeoPoint::new(10.0, 20.0));
        assert!(err.is_none());
    }

    #[test]
    fn feed_string_parses_back() {
        let point = GeoPoint::new(47.61234, -122.33456);
        assert_eq!(GeoPoint::parse(&point.to_feed_string()).unwrap(), point);
    }
}
