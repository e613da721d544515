//! Hex-cell selection: which points sit in a clicked cell, when to fetch
//! more detail for it, and what the sidebar shows.

use h3o::CellIndex;
use hashbrown::HashSet;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::fetch::{FetchRequest, PointSource, MAX_POINTS_PER_REQUEST};
use crate::hex::indexer;
use crate::models::{DataType, GeoBounds, Point};

/// Local points at or above this count are shown without a fetch
pub const LOCAL_POINTS_SUFFICIENT: usize = 5;
/// Resolutions this fine always load cell detail
pub const DETAIL_RESOLUTION: u8 = 7;
/// Clicking never zooms the map past this level
pub const MAX_FLY_TO_ZOOM: f64 = 14.0;

/// Points among `points` whose cell at the clicked cell's resolution is `cell`
pub fn find_points_in_hex<'a>(
    cell: CellIndex,
    points: impl IntoIterator<Item = &'a Point>,
) -> Vec<&'a Point> {
    let resolution = indexer::resolution_of(cell);
    points
        .into_iter()
        .filter(|p| {
            p.coordinates()
                .and_then(|(lat, lng)| indexer::cell_for(lat, lng, resolution).ok())
                == Some(cell)
        })
        .collect()
}

/// Whether a click on a cell of `count` points should load its detail
pub fn should_load_details(count: usize, initial: usize, resolution: u8) -> bool {
    (count > LOCAL_POINTS_SUFFICIENT && (initial as f64) < count as f64 / 2.0)
        || resolution >= DETAIL_RESOLUTION
}

/// Camera move suggested after a click
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlyTo {
    /// `[lng, lat]`
    pub center: [f64; 2],
    pub zoom: f64,
}

pub fn fly_to_target(cell: CellIndex, count: usize, zoom: f64) -> Option<FlyTo> {
    (count > 1 && zoom < MAX_FLY_TO_ZOOM).then(|| FlyTo {
        center: indexer::center_of(cell),
        zoom: (zoom + 2.0).min(MAX_FLY_TO_ZOOM),
    })
}

/// Cells a detail fetch found nothing in, per data type
#[derive(Debug, Default)]
pub struct EmptyCells(HashSet<(CellIndex, DataType)>);

impl EmptyCells {
    pub fn contains(&self, cell: CellIndex, data_type: DataType) -> bool {
        self.0.contains(&(cell, data_type))
    }

    pub fn mark(&mut self, cell: CellIndex, data_type: DataType) {
        self.0.insert((cell, data_type));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Result of a cell detail load
#[derive(Debug, Clone, PartialEq)]
pub struct HexDetail {
    pub points: Vec<Point>,
    /// The fetch returned nothing inside the cell
    pub cell_empty: bool,
}

/// Load the points of one cell.
///
/// `local` are the cached points already found in the cell. Enough local
/// points are returned as they are; otherwise the cell's bounding box is
/// fetched, the results are filtered to the cell and merged behind the
/// local points without duplicate ids. A failed fetch falls back to the
/// local points. Only a missing data source is an error.
pub async fn load_hex_data<S: PointSource>(
    source: &S,
    cell: CellIndex,
    data_type: DataType,
    local: Vec<Point>,
) -> Result<HexDetail, ConfigError> {
    source.ensure_ready()?;

    if local.len() >= LOCAL_POINTS_SUFFICIENT {
        return Ok(HexDetail {
            points: local,
            cell_empty: false,
        });
    }

    let ring = match indexer::boundary_of(cell) {
        Ok(ring) => ring,
        Err(e) => {
            warn!("No boundary for cell {}: {}", cell, e);
            return Ok(HexDetail {
                points: local,
                cell_empty: false,
            });
        }
    };
    let Some(bounds) = GeoBounds::from_ring(&ring) else {
        return Ok(HexDetail {
            points: local,
            cell_empty: false,
        });
    };

    let request = FetchRequest::new(data_type, bounds).with_limit(MAX_POINTS_PER_REQUEST);
    let fetched = match source.fetch(&request).await {
        Ok(points) => points,
        Err(e) => {
            warn!("Error fetching {} data for cell {}: {}", data_type, cell, e);
            return Ok(HexDetail {
                points: local,
                cell_empty: false,
            });
        }
    };

    let in_cell: Vec<&Point> = find_points_in_hex(cell, &fetched);
    let cell_empty = in_cell.is_empty();
    debug!(
        "Cell {} detail: {} fetched, {} inside, {} local",
        cell,
        fetched.len(),
        in_cell.len(),
        local.len()
    );

    let mut seen: HashSet<String> = local.iter().map(|p| p.id().to_string()).collect();
    let mut points = local;
    for point in in_cell {
        if seen.insert(point.id().to_string()) {
            points.push(point.clone());
        }
    }

    Ok(HexDetail { points, cell_empty })
}

/// What the sidebar shows for a selected cell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SidebarPayload {
    pub hex_id: String,
    pub point_data: Vec<Point>,
    pub point_count: usize,
    pub point_type: DataType,
}

impl SidebarPayload {
    pub fn new(cell: CellIndex, data_type: DataType, points: Vec<Point>) -> Self {
        Self {
            hex_id: cell.to_string(),
            point_count: points.len(),
            point_data: points,
            point_type: data_type,
        }
    }
}

/// Everything a cell click produces
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HexSelection {
    pub sidebar: SidebarPayload,
    pub details_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fly_to: Option<FlyTo>,
}
