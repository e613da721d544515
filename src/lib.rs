//! SkyTrade Explorer - hex-grid exploration of drone and airspace data
//!
//! This library provides the viewport session, fetch planning, point cache
//! and hex aggregation used by the `explorer` server binary.

pub mod config;
pub mod error;
pub mod fetch;
pub mod hex;
pub mod models;
pub mod perf;
pub mod store;
pub mod viewport;

pub use config::Config;
pub use error::{ExplorerError, Result};
pub use models::{DataType, GeoBounds, Point, TabType};
pub use viewport::ExplorerSession;
