//! Hexagonal binning of points.
//!
//! Wraps the H3 index and turns point sets into renderable cell
//! collections at a zoom-appropriate resolution.

pub mod aggregator;
mod grid_cache;
pub mod indexer;

pub use aggregator::{
    down_sample, points_to_hex_grid, resolution_for_zoom, GridStats, HexAggregator,
    HexGridOutput, DYNAMIC_RENDERING_THRESHOLD, MAX_FEATURES_PER_LAYER,
};
pub use grid_cache::{GridKey, HexGridCache};
pub use indexer::{
    boundary_of, boundary_polygon, cell_contains, cell_for, center_of, parse_cell, resolution_of,
};
