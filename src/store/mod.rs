//! In-memory normalized point store.

mod cache;

pub use cache::{PointStore, FETCH_LOG_CAPACITY};
