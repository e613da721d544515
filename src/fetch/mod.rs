//! Fetch planning and the point data source.
//!
//! Turns a settled viewport into bounded sub-area requests, decides when a
//! fetch can be skipped, and issues the requests against the data API.

pub mod client;
pub mod overlap;
pub mod planner;
pub mod splitter;

pub use client::{request_url, FetchRequest, HttpPointSource, PointSource, MAX_POINTS_PER_REQUEST};
pub use overlap::{MovementPolicy, ViewportOverlapPolicy, VIEWPORT_HISTORY, VIEWPORT_OVERLAP_THRESHOLD};
pub use planner::{plan_fetch, DetailLevel, FetchArea, ZOOM_REUSE_THRESHOLD};
pub use splitter::{split_if_needed, MIN_ZOOM_FOR_FULL_DETAIL};
