//! Point-to-hex binning.

use std::sync::Arc;
use std::time::Instant;

use h3o::CellIndex;
use hashbrown::HashMap;
use serde::Serialize;
use tracing::{debug, trace};

use super::grid_cache::{GridKey, HexGridCache};
use super::indexer;
use crate::models::{
    DataType, Feature, FeatureCollection, HexFeatureCollection, HexProperties, Point,
    PolygonGeometry,
};
use crate::perf::PerformanceSnapshot;

/// Feature budget of one hex layer outside performance mode
pub const MAX_FEATURES_PER_LAYER: usize = 2000;
/// Inputs above this many points are down-sampled before binning
pub const DYNAMIC_RENDERING_THRESHOLD: usize = 5000;
/// Coarsest resolution the zoom table produces
pub const MIN_RESOLUTION: u8 = 2;

/// Hex resolution for a map zoom level.
///
/// Performance mode drops one level (larger cells, fewer features), never
/// below [`MIN_RESOLUTION`].
pub fn resolution_for_zoom(zoom: f64, performance_mode: bool) -> u8 {
    let base: u8 = match zoom {
        z if z < 3.0 => 2,
        z if z < 4.0 => 3,
        z if z < 5.5 => 4,
        z if z < 7.0 => 5,
        z if z < 9.0 => 6,
        z if z < 11.0 => 7,
        z if z < 13.0 => 8,
        z if z < 15.0 => 9,
        _ => 10,
    };

    if performance_mode {
        base.saturating_sub(1).max(MIN_RESOLUTION)
    } else {
        base
    }
}

/// Bin `points` into cells at `resolution`.
///
/// Points without both coordinates, or whose coordinates the index rejects,
/// are skipped. When more than `max_features` cells result, only the densest
/// `max_features` survive (ties keep first-seen order). Cells whose boundary
/// cannot be computed are dropped.
pub fn points_to_hex_grid<'a>(
    points: impl IntoIterator<Item = &'a Point>,
    resolution: u8,
    tag: DataType,
    max_features: usize,
) -> HexFeatureCollection {
    let mut slots: HashMap<CellIndex, usize> = HashMap::new();
    let mut bins: Vec<(CellIndex, usize)> = Vec::new();
    let mut skipped = 0usize;

    for point in points {
        let Some((lat, lng)) = point.coordinates() else {
            skipped += 1;
            continue;
        };

        match indexer::cell_for(lat, lng, resolution) {
            Ok(cell) => {
                let slot = *slots.entry(cell).or_insert_with(|| {
                    bins.push((cell, 0));
                    bins.len() - 1
                });
                bins[slot].1 += 1;
            }
            Err(e) => {
                trace!("Skipping point {}: {}", point.id(), e);
                skipped += 1;
            }
        }
    }

    if bins.len() > max_features {
        bins.sort_by(|a, b| b.1.cmp(&a.1));
        bins.truncate(max_features);
    }

    let features = bins
        .into_iter()
        .filter_map(|(cell, count)| match indexer::boundary_of(cell) {
            Ok(ring) => Some(Feature::new(
                PolygonGeometry::from_ring(ring),
                HexProperties {
                    cell_id: cell.to_string(),
                    count,
                    resolution,
                    tag,
                },
            )),
            Err(e) => {
                trace!("Skipping cell {}: {}", cell, e);
                None
            }
        })
        .collect::<Vec<_>>();

    debug!(
        "[{}] Binned into {} cells at resolution {} ({} points skipped)",
        tag,
        features.len(),
        resolution,
        skipped
    );

    FeatureCollection::new(features)
}

/// Uniform random sample of roughly `threshold` points when the input is
/// larger. Non-deterministic; a new sample is drawn on every call.
pub fn down_sample<'a>(points: &[&'a Point], threshold: usize) -> Vec<&'a Point> {
    if points.len() <= threshold {
        return points.to_vec();
    }

    let rate = threshold as f64 / points.len() as f64;
    points
        .iter()
        .copied()
        .filter(|_| fastrand::f64() < rate)
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridStats {
    pub hex_cells: usize,
    pub points_processed: usize,
    pub generation_time_ms: u128,
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HexGridOutput {
    pub grid: Arc<HexFeatureCollection>,
    pub resolution: u8,
    pub stats: GridStats,
}

/// Zoom-aware binning with sampling and a bounded grid memo.
#[derive(Debug)]
pub struct HexAggregator {
    cache: HexGridCache,
    max_features: usize,
    sampling_threshold: usize,
}

impl HexAggregator {
    pub fn new(max_features: usize, sampling_threshold: usize, cache_capacity: usize) -> Self {
        Self {
            cache: HexGridCache::new(cache_capacity),
            max_features,
            sampling_threshold,
        }
    }

    /// Grid of `points` for the given zoom and performance state
    pub fn grid_for(
        &mut self,
        points: &[&Point],
        zoom: f64,
        tag: DataType,
        performance: &PerformanceSnapshot,
    ) -> HexGridOutput {
        let resolution = resolution_for_zoom(zoom, performance.performance_mode);
        let max_features = performance.max_features(self.max_features);
        let sampled = down_sample(points, self.sampling_threshold);

        if sampled.is_empty() {
            return HexGridOutput {
                grid: Arc::new(HexFeatureCollection::empty()),
                resolution,
                stats: GridStats::default(),
            };
        }

        let key = GridKey {
            tag,
            resolution,
            point_count: sampled.len(),
        };

        if let Some(grid) = self.cache.get(&key) {
            debug!("Hex grid cache hit for {}", key);
            let stats = GridStats {
                hex_cells: grid.len(),
                points_processed: sampled.len(),
                generation_time_ms: 0,
                cached: true,
            };
            return HexGridOutput {
                grid,
                resolution,
                stats,
            };
        }

        let started = Instant::now();
        let grid = Arc::new(points_to_hex_grid(
            sampled.iter().copied(),
            resolution,
            tag,
            max_features,
        ));
        self.cache.insert(key, Arc::clone(&grid));

        let stats = GridStats {
            hex_cells: grid.len(),
            points_processed: sampled.len(),
            generation_time_ms: started.elapsed().as_millis(),
            cached: false,
        };

        HexGridOutput {
            grid,
            resolution,
            stats,
        }
    }

    pub fn cached_grids(&self) -> usize {
        self.cache.len()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

impl Default for HexAggregator {
    fn default() -> Self {
        Self::new(
            MAX_FEATURES_PER_LAYER,
            DYNAMIC_RENDERING_THRESHOLD,
            super::grid_cache::DEFAULT_CAPACITY,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DronePoint, PropertyPoint};

    fn drone(id: usize, lat: Option<f64>, lng: Option<f64>) -> Point {
        Point::Drone(DronePoint {
            id: format!("d{id}"),
            user_id: "u".to_string(),
            device_location_lat: lat,
            device_location_lng: lng,
            ip_address: "0.0.0.0".to_string(),
            is_test: false,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            remote_data: None,
        })
    }

    fn property(id: usize, lat: f64, lng: f64) -> Point {
        Point::Property(PropertyPoint {
            id: format!("p{id}"),
            title: "t".to_string(),
            address: Some("a".to_string()),
            latitude: Some(lat),
            longitude: Some(lng),
            has_landing_deck: false,
            has_charging_station: false,
            has_storage_hub: false,
            is_rentable_airspace: true,
            no_fly_zone: false,
            is_boosted_area: false,
            transit_fee: "0".to_string(),
            owner_id: "o".to_string(),
            price: None,
        })
    }

    /// Deterministic spread over a 10x10 degree box
    fn grid_points(n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| {
                let lat = 30.0 + (i % 100) as f64 * 0.1;
                let lng = -100.0 + (i / 100) as f64 * (10.0 / (n / 100).max(1) as f64);
                drone(i, Some(lat), Some(lng))
            })
            .collect()
    }

    #[test]
    fn test_resolution_table() {
        assert_eq!(resolution_for_zoom(2.0, false), 2);
        assert_eq!(resolution_for_zoom(3.5, false), 3);
        assert_eq!(resolution_for_zoom(5.4, false), 4);
        assert_eq!(resolution_for_zoom(6.0, false), 5);
        assert_eq!(resolution_for_zoom(8.9, false), 6);
        assert_eq!(resolution_for_zoom(10.0, false), 7);
        assert_eq!(resolution_for_zoom(12.0, false), 8);
        assert_eq!(resolution_for_zoom(14.0, false), 9);
        assert_eq!(resolution_for_zoom(18.0, false), 10);
    }

    #[test]
    fn test_performance_mode_is_coarser() {
        assert_eq!(resolution_for_zoom(6.0, true), 4);
        assert_eq!(resolution_for_zoom(18.0, true), 9);
        assert_eq!(resolution_for_zoom(1.0, true), MIN_RESOLUTION);
    }

    #[test]
    fn test_missing_coordinates_never_contribute() {
        let points = vec![
            drone(0, Some(40.0), Some(-100.0)),
            drone(1, None, Some(-100.0)),
            drone(2, Some(40.0), None),
            drone(3, Some(f64::NAN), Some(-100.0)),
            drone(4, Some(40.0), Some(-100.0)),
        ];
        let grid = points_to_hex_grid(&points, 5, DataType::Drone, 10);
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.total_count(), 2);
        assert_eq!(grid.features[0].properties.tag, DataType::Drone);
    }

    #[test]
    fn test_max_features_keeps_densest() {
        let mut points = Vec::new();
        // Dense cell
        for i in 0..5 {
            points.push(property(i, 10.0, 10.0));
        }
        // Sparse cells far apart
        for i in 0..10 {
            points.push(property(100 + i, -40.0 + i as f64 * 5.0, 100.0));
        }

        let grid = points_to_hex_grid(&points, 6, DataType::AirSpace, 3);
        assert_eq!(grid.len(), 3);
        assert_eq!(grid.features[0].properties.count, 5);
        assert!(grid.total_count() <= points.len());
    }

    #[test]
    fn test_cells_carry_resolution_and_closed_ring() {
        let points = vec![property(0, 51.5, -0.12)];
        let grid = points_to_hex_grid(&points, 8, DataType::AirSpace, 10);
        let feature = &grid.features[0];
        assert_eq!(feature.properties.resolution, 8);
        let ring = &feature.geometry.coordinates[0];
        assert_eq!(ring.first(), ring.last());
        let cell = indexer::parse_cell(&feature.properties.cell_id).unwrap();
        assert!(indexer::cell_contains(cell, 51.5, -0.12));
    }

    #[test]
    fn test_down_sample_bounds() {
        let points = grid_points(20_000);
        let refs: Vec<&Point> = points.iter().collect();

        let small = down_sample(&refs[..100], 5000);
        assert_eq!(small.len(), 100);

        let sampled = down_sample(&refs, 5000);
        // Binomial(20000, 0.25): mean 5000, sd ~61
        assert!(sampled.len() > 4500 && sampled.len() < 5500);
    }

    #[test]
    fn test_scenario_five_thousand_drones_at_zoom_six() {
        let points = grid_points(5000);
        let refs: Vec<&Point> = points.iter().collect();
        let mut aggregator = HexAggregator::default();

        let output = aggregator.grid_for(&refs, 6.0, DataType::Drone, &PerformanceSnapshot::nominal());
        assert_eq!(output.resolution, 5);
        assert!(output.grid.len() <= 2000);
        assert!(output.grid.total_count() <= 5000);
        assert_eq!(output.stats.points_processed, 5000);
        assert!(!output.stats.cached);
    }

    #[test]
    fn test_empty_input_creates_no_cache_entry() {
        let mut aggregator = HexAggregator::default();
        for zoom in [2.0, 8.0, 16.0] {
            let output = aggregator.grid_for(&[], zoom, DataType::AirSpace, &PerformanceSnapshot::nominal());
            assert!(output.grid.is_empty());
        }
        assert_eq!(aggregator.cached_grids(), 0);
    }

    #[test]
    fn test_count_keyed_cache_returns_stale_grid() {
        let a = vec![property(0, 10.0, 10.0)];
        let b = vec![property(1, -10.0, -10.0)];
        let a_refs: Vec<&Point> = a.iter().collect();
        let b_refs: Vec<&Point> = b.iter().collect();
        let mut aggregator = HexAggregator::default();
        let perf = PerformanceSnapshot::nominal();

        let first = aggregator.grid_for(&a_refs, 8.0, DataType::AirSpace, &perf);
        let second = aggregator.grid_for(&b_refs, 8.0, DataType::AirSpace, &perf);

        assert!(second.stats.cached);
        assert_eq!(
            first.grid.features[0].properties.cell_id,
            second.grid.features[0].properties.cell_id
        );
        assert_eq!(aggregator.cached_grids(), 1);
    }

    #[test]
    fn test_performance_mode_budget() {
        let points = grid_points(5000);
        let refs: Vec<&Point> = points.iter().collect();
        let mut aggregator = HexAggregator::default();
        let perf = PerformanceSnapshot::with_fps(10, true);

        let output = aggregator.grid_for(&refs, 12.0, DataType::Drone, &perf);
        assert_eq!(output.resolution, 7);
        assert!(output.grid.len() <= 250);
    }
}
