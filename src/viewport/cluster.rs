//! Point (non-hex) view of a single data type.
//!
//! Keeps the last fetched box and the feature collection built from it.
//! Each accepted fetch replaces the collection rather than merging.

use tracing::debug;

use crate::fetch::MovementPolicy;
use crate::models::{points_to_features, GeoBounds, Point, PointFeatureCollection};

/// Viewports taller than this many degrees of latitude are never fetched
pub const MAX_CLUSTER_LAT_SPAN: f64 = 30.0;

#[derive(Debug, Default)]
pub struct ClusterView {
    policy: MovementPolicy,
    last_bounds: Option<GeoBounds>,
    features: PointFeatureCollection,
}

impl ClusterView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a settled viewport warrants a fetch
    pub fn should_refresh(&self, bounds: &GeoBounds) -> bool {
        if bounds.lat_span() > MAX_CLUSTER_LAT_SPAN {
            debug!(
                "Cluster view skipped, latitude span {:.1} too wide",
                bounds.lat_span()
            );
            return false;
        }
        self.policy.should_fetch(bounds, self.last_bounds.as_ref())
    }

    /// Replace the view with a fetch for `bounds`
    pub fn replace(&mut self, bounds: GeoBounds, points: &[Point]) {
        self.last_bounds = Some(bounds);
        self.features = points_to_features(points);
    }

    pub fn features(&self) -> &PointFeatureCollection {
        &self.features
    }

    pub fn last_bounds(&self) -> Option<&GeoBounds> {
        self.last_bounds.as_ref()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataType, RawPoint};
    use serde_json::json;

    fn property(id: &str, lat: f64, lng: f64) -> Point {
        let raw: RawPoint = serde_json::from_value(json!({
            "id": id,
            "latitude": lat,
            "longitude": lng,
            "price": 10.0,
        }))
        .unwrap();
        Point::from_raw(DataType::AirSpace, raw)
    }

    #[test]
    fn test_tall_viewport_is_skipped() {
        let view = ClusterView::new();
        assert!(!view.should_refresh(&GeoBounds::new(60.0, 20.0, 10.0, 0.0)));
        assert!(view.should_refresh(&GeoBounds::new(40.0, 20.0, 10.0, 0.0)));
    }

    #[test]
    fn test_replace_then_small_pan_is_skipped() {
        let mut view = ClusterView::new();
        let first = GeoBounds::new(10.0, 0.0, 10.0, 0.0);
        view.replace(first, &[property("a", 5.0, 5.0)]);

        assert_eq!(view.features().len(), 1);
        assert_eq!(view.last_bounds(), Some(&first));
        assert!(!view.should_refresh(&GeoBounds::new(11.0, 1.0, 11.0, 1.0)));
        assert!(view.should_refresh(&GeoBounds::new(16.0, 6.0, 16.0, 6.0)));
    }

    #[test]
    fn test_replace_does_not_merge() {
        let mut view = ClusterView::new();
        view.replace(GeoBounds::new(10.0, 0.0, 10.0, 0.0), &[property("a", 5.0, 5.0)]);
        view.replace(
            GeoBounds::new(30.0, 20.0, 30.0, 20.0),
            &[property("b", 25.0, 25.0), property("c", 26.0, 26.0)],
        );

        let ids: Vec<&str> = view
            .features()
            .features
            .iter()
            .map(|f| f.properties.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }
}
