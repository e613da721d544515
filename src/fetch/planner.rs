//! Decides which sub-areas of a settled viewport need fetching.

use serde::Serialize;
use tracing::debug;

use super::splitter::{split_if_needed, MIN_ZOOM_FOR_FULL_DETAIL};
use crate::models::{DataType, GeoBounds};

/// Zoom-ins smaller than this reuse already loaded data
pub const ZOOM_REUSE_THRESHOLD: f64 = 1.5;

/// Requested level of detail for one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Standard,
    High,
}

impl DetailLevel {
    pub fn for_zoom(zoom: f64) -> Self {
        if zoom >= MIN_ZOOM_FOR_FULL_DETAIL {
            DetailLevel::High
        } else {
            DetailLevel::Standard
        }
    }
}

/// One request worth of area
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchArea {
    pub data_type: DataType,
    pub bounds: GeoBounds,
    pub detail: DetailLevel,
}

/// Areas to fetch for one data type.
///
/// A small zoom-in (less than 1.5 levels) over data already loaded for this
/// type is skipped entirely; anything else is delegated to the splitter.
pub fn plan_fetch(
    bounds: &GeoBounds,
    zoom: f64,
    data_type: DataType,
    prev_zoom: f64,
    cached_count: usize,
) -> Vec<FetchArea> {
    let zoom_diff = (zoom - prev_zoom).abs();
    if zoom_diff < ZOOM_REUSE_THRESHOLD && cached_count > 0 && zoom > prev_zoom {
        debug!(
            "[{}] Zoom-in {:.2} -> {:.2} over {} cached points, reusing",
            data_type, prev_zoom, zoom, cached_count
        );
        return Vec::new();
    }

    let detail = DetailLevel::for_zoom(zoom);
    split_if_needed(bounds, zoom)
        .into_iter()
        .map(|bounds| FetchArea {
            data_type,
            bounds,
            detail,
        })
        .collect()
}
