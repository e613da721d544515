//! Memo of computed hex grids.
//!
//! Keys combine the tag, the resolution and the number of input points, not
//! a content hash: two different point sets of equal size at the same
//! resolution share an entry and the second one is served the first one's
//! grid. Point-count changes are what invalidates entries in practice.

use std::sync::Arc;

use tracing::debug;

use crate::models::{DataType, HexFeatureCollection};

/// Default number of grids retained
pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridKey {
    pub tag: DataType,
    pub resolution: u8,
    pub point_count: usize,
}

impl std::fmt::Display for GridKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.tag, self.resolution, self.point_count)
    }
}

/// Bounded grid memo. When over capacity the coarsest grids go first;
/// among equally coarse grids the most recently inserted is dropped.
#[derive(Debug)]
pub struct HexGridCache {
    capacity: usize,
    /// Insertion order
    entries: Vec<(GridKey, Arc<HexFeatureCollection>)>,
}

impl HexGridCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity + 1),
        }
    }

    pub fn get(&self, key: &GridKey) -> Option<Arc<HexFeatureCollection>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, grid)| Arc::clone(grid))
    }

    pub fn insert(&mut self, key: GridKey, grid: Arc<HexFeatureCollection>) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = grid;
            return;
        }

        self.entries.push((key, grid));

        if self.entries.len() > self.capacity {
            // Stable: insertion order survives among equal resolutions
            self.entries
                .sort_by(|a, b| b.0.resolution.cmp(&a.0.resolution));
            for (evicted, _) in self.entries.drain(self.capacity..) {
                debug!("Evicted hex grid {}", evicted);
            }
        }
    }

    pub fn contains(&self, key: &GridKey) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for HexGridCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
