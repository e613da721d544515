//! Subdivision of oversized bounding boxes into fetchable chunks.

use crate::models::GeoBounds;

/// At or above this zoom a viewport is always fetched whole, at full detail
pub const MIN_ZOOM_FOR_FULL_DETAIL: f64 = 10.0;

/// Split `bounds` into a grid of sub-boxes when the view is wide and zoomed
/// out: 3x3 below zoom 4 for areas over 400 square degrees, 2x2 below zoom 6
/// for areas over 100, otherwise unchanged.
pub fn split_if_needed(bounds: &GeoBounds, zoom: f64) -> Vec<GeoBounds> {
    if zoom >= MIN_ZOOM_FOR_FULL_DETAIL {
        return vec![*bounds];
    }

    let area = bounds.area();

    if zoom < 4.0 && area > 400.0 {
        split_grid(bounds, 3)
    } else if zoom < 6.0 && area > 100.0 {
        split_grid(bounds, 2)
    } else {
        vec![*bounds]
    }
}

/// `n` x `n` equal sub-boxes, rows south to north, columns west to east.
/// Outer edges are copied from the input so the tiles cover it exactly.
fn split_grid(bounds: &GeoBounds, n: usize) -> Vec<GeoBounds> {
    let lat_edges = edges(bounds.south, bounds.north, n);
    let lng_edges = edges(bounds.west, bounds.east, n);

    let mut tiles = Vec::with_capacity(n * n);
    for lat in lat_edges.windows(2) {
        for lng in lng_edges.windows(2) {
            tiles.push(GeoBounds::new(lat[1], lat[0], lng[1], lng[0]));
        }
    }
    tiles
}

fn edges(start: f64, end: f64, n: usize) -> Vec<f64> {
    let step = (end - start) / n as f64;
    (0..=n)
        .map(|i| if i == n { end } else { start + i as f64 * step })
        .collect()
}
