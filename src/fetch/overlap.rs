//! Fetch-suppression heuristics based on bounding-box overlap.
//!
//! Two independent policies guard two different viewport flows and apply
//! different conservatism:
//!
//! - [`ViewportOverlapPolicy`] (hex view): skip when the new box is mostly
//!   covered by any one of the recently fetched boxes.
//! - [`MovementPolicy`] (cluster view): fetch only after a substantial move
//!   away from the last fetched box.

use crate::models::GeoBounds;

/// Overlap ratio above which a viewport counts as already loaded
pub const VIEWPORT_OVERLAP_THRESHOLD: f64 = 0.85;
/// Number of recent fetch boxes compared against
pub const VIEWPORT_HISTORY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportOverlapPolicy {
    pub threshold: f64,
    pub history: usize,
}

impl ViewportOverlapPolicy {
    /// False when the overlap of `new` with any single box in `recent`
    /// exceeds `threshold` of the new box's area. Boxes are compared one at
    /// a time, not as a union. An empty history always fetches.
    pub fn should_fetch<'a>(
        &self,
        new: &GeoBounds,
        recent: impl IntoIterator<Item = &'a GeoBounds>,
    ) -> bool {
        let new_area = new.area();
        !recent
            .into_iter()
            .any(|prev| prev.intersection_area(new) / new_area > self.threshold)
    }
}

impl Default for ViewportOverlapPolicy {
    fn default() -> Self {
        Self {
            threshold: VIEWPORT_OVERLAP_THRESHOLD,
            history: VIEWPORT_HISTORY,
        }
    }
}

/// Fetch only when the shared area is at most half of the previous box and
/// at least two edges of the new box fall outside the previous one.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementPolicy;

impl MovementPolicy {
    pub fn should_fetch(&self, new: &GeoBounds, previous: Option<&GeoBounds>) -> bool {
        let Some(previous) = previous else {
            return true;
        };

        let shared = previous.intersection_area(new);
        shared <= previous.area() / 2.0 && edges_outside(previous, new) >= 2
    }
}

/// Number of edges of `curr` lying outside the span of `prev`
fn edges_outside(prev: &GeoBounds, curr: &GeoBounds) -> usize {
    let outside_lat = |v: f64| v > prev.north || v < prev.south;
    let outside_lng = |v: f64| v > prev.east || v < prev.west;

    [
        outside_lat(curr.north),
        outside_lat(curr.south),
        outside_lng(curr.east),
        outside_lng(curr.west),
    ]
    .into_iter()
    .filter(|outside| *outside)
    .count()
}
