//! Thin wrapper over the H3 hexagonal index.
//!
//! All coordinate pairs handed out are `[lng, lat]` in degrees, matching
//! GeoJSON ordering.

use std::str::FromStr;

use geo::{Coord, LineString, Polygon};
use h3o::{CellIndex, LatLng, Resolution};

use crate::error::GeometryError;

/// Finest resolution supported by the index
pub const MAX_RESOLUTION: u8 = 15;

/// Cell containing `(lat, lng)` at `resolution`.
///
/// Fails for non-finite or out-of-range coordinates and resolutions above 15.
pub fn cell_for(lat: f64, lng: f64, resolution: u8) -> Result<CellIndex, GeometryError> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        // NaN fails both range checks as well
        return Err(GeometryError::InvalidCoordinate { lat, lng });
    }
    let resolution = Resolution::try_from(resolution)
        .map_err(|_| GeometryError::InvalidResolution(resolution))?;
    let latlng =
        LatLng::new(lat, lng).map_err(|_| GeometryError::InvalidCoordinate { lat, lng })?;

    Ok(latlng.to_cell(resolution))
}

/// Parse a cell id from its hexadecimal string form
pub fn parse_cell(id: &str) -> Result<CellIndex, GeometryError> {
    CellIndex::from_str(id).map_err(|_| GeometryError::InvalidCell(id.to_string()))
}

/// Closed boundary ring of a cell
pub fn boundary_of(cell: CellIndex) -> Result<Vec<[f64; 2]>, GeometryError> {
    let mut ring: Vec<[f64; 2]> = cell
        .boundary()
        .iter()
        .map(|ll| [ll.lng(), ll.lat()])
        .collect();

    if ring.len() < 3 || ring.iter().flatten().any(|c| !c.is_finite()) {
        return Err(GeometryError::InvalidCell(cell.to_string()));
    }

    ring.push(ring[0]);
    Ok(ring)
}

/// Centre of a cell
pub fn center_of(cell: CellIndex) -> [f64; 2] {
    let center = LatLng::from(cell);
    [center.lng(), center.lat()]
}

pub fn resolution_of(cell: CellIndex) -> u8 {
    u8::from(cell.resolution())
}

/// Boundary as a planar polygon in lng/lat space
pub fn boundary_polygon(cell: CellIndex) -> Result<Polygon<f64>, GeometryError> {
    let coords: Vec<Coord<f64>> = boundary_of(cell)?
        .into_iter()
        .map(|[x, y]| Coord { x, y })
        .collect();
    Ok(Polygon::new(LineString::new(coords), vec![]))
}

/// Whether `(lat, lng)` falls in `cell` at the cell's own resolution.
/// Invalid coordinates are simply not contained.
pub fn cell_contains(cell: CellIndex, lat: f64, lng: f64) -> bool {
    cell_for(lat, lng, resolution_of(cell))
        .map(|c| c == cell)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Intersects, Point};

    const CITIES: [(f64, f64); 4] = [
        (37.7749, -122.4194),
        (51.5074, -0.1278),
        (-33.8688, 151.2093),
        (40.7128, -74.0060),
    ];

    #[test]
    fn test_cell_for_is_deterministic() {
        for (lat, lng) in CITIES {
            for res in 0..=MAX_RESOLUTION {
                let a = cell_for(lat, lng, res).unwrap();
                let b = cell_for(lat, lng, res).unwrap();
                assert_eq!(a, b);
                assert_eq!(resolution_of(a), res);
            }
        }
    }

    #[test]
    fn test_boundary_contains_point() {
        for (lat, lng) in CITIES {
            for res in 5..=9 {
                let cell = cell_for(lat, lng, res).unwrap();
                let polygon = boundary_polygon(cell).unwrap();
                assert!(
                    polygon.intersects(&Point::new(lng, lat)),
                    "({lat}, {lng}) outside its cell at res {res}"
                );
            }
        }
    }

    #[test]
    fn test_boundary_is_closed_ring() {
        let cell = cell_for(37.7749, -122.4194, 7).unwrap();
        let ring = boundary_of(cell).unwrap();
        assert!(ring.len() >= 7);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn test_center_maps_back_to_cell() {
        let cell = cell_for(51.5074, -0.1278, 6).unwrap();
        let [lng, lat] = center_of(cell);
        assert!(cell_contains(cell, lat, lng));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            cell_for(f64::NAN, 0.0, 5),
            Err(GeometryError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            cell_for(91.0, 0.0, 5),
            Err(GeometryError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            cell_for(0.0, 180.5, 5),
            Err(GeometryError::InvalidCoordinate { .. })
        ));
        assert_eq!(
            cell_for(0.0, 0.0, 16),
            Err(GeometryError::InvalidResolution(16))
        );
        assert!(parse_cell("not-a-cell").is_err());
        assert!(!cell_contains(cell_for(0.0, 0.0, 5).unwrap(), f64::NAN, 0.0));
    }

    #[test]
    fn test_parse_round_trip() {
        let cell = cell_for(-33.8688, 151.2093, 8).unwrap();
        assert_eq!(parse_cell(&cell.to_string()).unwrap(), cell);
    }
}
