//! Geographic bounding boxes and the fetch log entry type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bounding box in degrees.
///
/// `north >= south` is expected; `east > west` is not, and no dateline
/// normalisation is attempted, so boxes crossing the antimeridian produce
/// negative longitude spans.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl GeoBounds {
    /// Continental United States, the default initial view
    pub const USA: GeoBounds = GeoBounds {
        north: 49.384358,
        south: 24.396308,
        east: -66.93457,
        west: -125.0,
    };

    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    pub fn lng_span(&self) -> f64 {
        self.east - self.west
    }

    /// Planar area in square degrees
    pub fn area(&self) -> f64 {
        self.lat_span() * self.lng_span()
    }

    /// Planar area shared with `other`, zero when disjoint
    pub fn intersection_area(&self, other: &GeoBounds) -> f64 {
        let lat_overlap = (self.north.min(other.north) - self.south.max(other.south)).max(0.0);
        let lng_overlap = (self.east.min(other.east) - self.west.max(other.west)).max(0.0);
        lat_overlap * lng_overlap
    }

    /// Inclusive containment test
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.south && lat <= self.north && lng >= self.west && lng <= self.east
    }

    /// Grow each side by `fraction` of the corresponding span
    pub fn buffered(&self, fraction: f64) -> Self {
        let lat_pad = self.lat_span() * fraction;
        let lng_pad = self.lng_span() * fraction;
        Self {
            north: self.north + lat_pad,
            south: self.south - lat_pad,
            east: self.east + lng_pad,
            west: self.west - lng_pad,
        }
    }

    /// Bounding box of a ring of `[lng, lat]` pairs
    pub fn from_ring(ring: &[[f64; 2]]) -> Option<Self> {
        let first = ring.first()?;
        let mut bounds = GeoBounds::new(first[1], first[1], first[0], first[0]);
        for [lng, lat] in ring.iter().copied() {
            bounds.north = bounds.north.max(lat);
            bounds.south = bounds.south.min(lat);
            bounds.east = bounds.east.max(lng);
            bounds.west = bounds.west.min(lng);
        }
        Some(bounds)
    }
}

/// One entry of the fetched-area log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedArea {
    pub bounds: GeoBounds,
    pub zoom_level: f64,
    pub timestamp: DateTime<Utc>,
}

impl CachedArea {
    pub fn new(bounds: GeoBounds, zoom_level: f64) -> Self {
        Self {
            bounds,
            zoom_level,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersection_area() {
        let a = GeoBounds::new(10.0, 0.0, 10.0, 0.0);
        let b = GeoBounds::new(15.0, 5.0, 15.0, 5.0);
        assert_eq!(a.intersection_area(&b), 25.0);
        assert_eq!(a.intersection_area(&a), a.area());

        let far = GeoBounds::new(50.0, 40.0, 50.0, 40.0);
        assert_eq!(a.intersection_area(&far), 0.0);
    }

    #[test]
    fn test_buffered() {
        let b = GeoBounds::new(10.0, 0.0, 20.0, 0.0).buffered(0.1);
        assert_eq!(b, GeoBounds::new(11.0, -1.0, 22.0, -2.0));
    }

    #[test]
    fn test_from_ring() {
        let ring = [[1.0, 2.0], [3.0, -1.0], [-2.0, 4.0], [1.0, 2.0]];
        let b = GeoBounds::from_ring(&ring).unwrap();
        assert_eq!(b, GeoBounds::new(4.0, -1.0, 3.0, -2.0));
        assert!(GeoBounds::from_ring(&[]).is_none());
    }

    #[test]
    fn test_contains_is_inclusive() {
        let b = GeoBounds::new(10.0, 0.0, 10.0, 0.0);
        assert!(b.contains(10.0, 0.0));
        assert!(!b.contains(10.1, 5.0));
    }
}
