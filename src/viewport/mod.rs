//! Viewport-driven session control.
//!
//! Tracks the map viewport, plans and runs debounced fetch cycles, culls
//! the cache to what is visible, and serves hex and point views of it.

pub mod cluster;
pub mod controller;
pub mod selection;
pub mod session;
pub mod visible;

pub use cluster::{ClusterView, MAX_CLUSTER_LAT_SPAN};
pub use controller::{
    CyclePlan, CycleTrigger, FetchBanner, SkipReason, ViewportController, ViewportPhase,
    FETCH_FAILED_MESSAGE, NOT_CONFIGURED_MESSAGE,
};
pub use selection::{
    find_points_in_hex, fly_to_target, load_hex_data, should_load_details, EmptyCells, FlyTo,
    HexDetail, HexSelection, SidebarPayload,
};
pub use session::{
    CycleReport, ExplorerSession, ExplorerState, HexGridResponse, HexLayer, SessionStatus,
    TypeCounts,
};
pub use visible::{culling_resolution, visible_points, CELL_CULLING_THRESHOLD};
