//! Viewport culling of cached points before aggregation.

use h3o::CellIndex;
use hashbrown::HashSet;

use crate::hex::indexer;
use crate::models::{GeoBounds, Point};

/// Above this many cached points culling switches to coarse cells
pub const CELL_CULLING_THRESHOLD: usize = 10_000;
/// Fraction of each span added around the viewport in cell culling
pub const CULLING_BUFFER: f64 = 0.1;
/// Lattice intervals per axis when sampling the buffered viewport
const LATTICE_STEPS: usize = 10;

/// Coarse resolution used for cell culling: `floor(zoom / 2)` within 3..=6
pub fn culling_resolution(zoom: f64) -> u8 {
    ((zoom / 2.0).floor() as i32).clamp(3, 6) as u8
}

/// Points of `points` inside the viewport.
///
/// Small sets get an exact inclusive bounds test. Large sets are matched
/// by coarse cell against the cells sampled over the buffered viewport,
/// which is cheaper per point but approximate near the edges.
pub fn visible_points<'a>(points: &'a [Point], bounds: &GeoBounds, zoom: f64) -> Vec<&'a Point> {
    if points.len() <= CELL_CULLING_THRESHOLD {
        return points
            .iter()
            .filter(|p| matches!(p.coordinates(), Some((lat, lng)) if bounds.contains(lat, lng)))
            .collect();
    }

    let resolution = culling_resolution(zoom);
    let cells = viewport_cells(&bounds.buffered(CULLING_BUFFER), resolution);

    points
        .iter()
        .filter(|p| {
            p.coordinates()
                .and_then(|(lat, lng)| indexer::cell_for(lat, lng, resolution).ok())
                .is_some_and(|cell| cells.contains(&cell))
        })
        .collect()
}

/// Cells hit by an 11x11 lattice spanning `bounds` edge to edge.
/// Samples the index rejects (beyond the poles, say) are skipped.
fn viewport_cells(bounds: &GeoBounds, resolution: u8) -> HashSet<CellIndex> {
    let lat_step = bounds.lat_span() / LATTICE_STEPS as f64;
    let lng_step = bounds.lng_span() / LATTICE_STEPS as f64;

    let mut cells = HashSet::new();
    for i in 0..=LATTICE_STEPS {
        let lat = if i == LATTICE_STEPS {
            bounds.north
        } else {
            bounds.south + i as f64 * lat_step
        };
        for j in 0..=LATTICE_STEPS {
            let lng = if j == LATTICE_STEPS {
                bounds.east
            } else {
                bounds.west + j as f64 * lng_step
            };
            if let Ok(cell) = indexer::cell_for(lat, lng, resolution) {
                cells.insert(cell);
            }
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataType, RawPoint};
    use serde_json::json;

    fn drone(id: usize, lat: Option<f64>, lng: Option<f64>) -> Point {
        let raw: RawPoint = serde_json::from_value(json!({
            "id": id.to_string(),
            "deviceLocationLat": lat,
            "deviceLocationLng": lng,
        }))
        .unwrap();
        Point::from_raw(DataType::Drone, raw)
    }

    #[test]
    fn test_culling_resolution_is_clamped() {
        assert_eq!(culling_resolution(2.0), 3);
        assert_eq!(culling_resolution(9.5), 4);
        assert_eq!(culling_resolution(18.0), 6);
    }

    #[test]
    fn test_small_sets_use_exact_bounds() {
        let bounds = GeoBounds::new(10.0, 0.0, 10.0, 0.0);
        let points = vec![
            drone(0, Some(5.0), Some(5.0)),
            drone(1, Some(10.0), Some(0.0)),
            drone(2, Some(10.5), Some(5.0)),
            drone(3, None, Some(5.0)),
            // Missing coordinates are not treated as (0, 0)
            drone(4, None, None),
        ];

        let ids: Vec<&str> = visible_points(&points, &bounds, 6.0)
            .into_iter()
            .map(|p| p.id())
            .collect();
        assert_eq!(ids, vec!["0", "1"]);
    }

    #[test]
    fn test_large_sets_use_coarse_cells() {
        let bounds = GeoBounds::new(41.0, 39.0, -99.0, -101.0);
        let mut points: Vec<Point> = (0..CELL_CULLING_THRESHOLD)
            .map(|i| drone(i, Some(40.0 + (i % 100) as f64 * 0.001), Some(-100.0)))
            .collect();
        // Far outside the viewport
        points.push(drone(CELL_CULLING_THRESHOLD, Some(-33.9), Some(151.2)));
        points.push(drone(CELL_CULLING_THRESHOLD + 1, None, None));

        let visible = visible_points(&points, &bounds, 6.0);
        assert_eq!(visible.len(), CELL_CULLING_THRESHOLD);
        assert!(visible.iter().all(|p| p.coordinates().is_some_and(|(lat, _)| lat > 0.0)));
    }
}
