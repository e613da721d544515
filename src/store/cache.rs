//! Points keyed by id, one map per data type, plus the fetched-area log.

use std::collections::VecDeque;

use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::models::{CachedArea, DataType, Point};

/// Fetched-area log entries retained
pub const FETCH_LOG_CAPACITY: usize = 100;

/// Insertion-ordered id map. Upserts replace in place.
#[derive(Debug, Default)]
struct Collection {
    index: HashMap<String, usize>,
    points: Vec<Point>,
}

impl Collection {
    /// Returns true when the id was new
    fn upsert(&mut self, point: Point) -> bool {
        match self.index.get(point.id()) {
            Some(&slot) => {
                self.points[slot] = point;
                false
            }
            None => {
                self.index.insert(point.id().to_string(), self.points.len());
                self.points.push(point);
                true
            }
        }
    }

    fn get(&self, id: &str) -> Option<&Point> {
        self.index.get(id).map(|&slot| &self.points[slot])
    }

    fn clear(&mut self) {
        self.index.clear();
        self.points.clear();
    }
}

/// Session-lifetime cache of everything fetched so far.
///
/// Not synchronised; owned by one viewport session and mutated only in
/// reaction to its events.
#[derive(Debug, Default)]
pub struct PointStore {
    drones: Collection,
    properties: Collection,
    fetch_log: VecDeque<CachedArea>,
}

impl PointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, data_type: DataType) -> &Collection {
        match data_type {
            DataType::Drone => &self.drones,
            DataType::AirSpace => &self.properties,
        }
    }

    fn collection_mut(&mut self, data_type: DataType) -> &mut Collection {
        match data_type {
            DataType::Drone => &mut self.drones,
            DataType::AirSpace => &mut self.properties,
        }
    }

    /// Upsert points by id. Points of the other data type are ignored.
    /// Returns the number of previously unseen ids.
    pub fn add_points(&mut self, data_type: DataType, points: impl IntoIterator<Item = Point>) -> usize {
        let collection = self.collection_mut(data_type);
        let mut added = 0;
        let mut mismatched = 0;

        for point in points {
            if point.data_type() != data_type {
                mismatched += 1;
                continue;
            }
            if collection.upsert(point) {
                added += 1;
            }
        }

        if mismatched > 0 {
            warn!("Ignored {} points not of type {}", mismatched, data_type);
        }
        debug!(
            "Stored {} new {} points ({} total)",
            added,
            data_type,
            collection.points.len()
        );

        added
    }

    /// All points of a type, in first-insertion order
    pub fn all_points(&self, data_type: DataType) -> &[Point] {
        &self.collection(data_type).points
    }

    pub fn get(&self, data_type: DataType, id: &str) -> Option<&Point> {
        self.collection(data_type).get(id)
    }

    pub fn len(&self, data_type: DataType) -> usize {
        self.collection(data_type).points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drones.points.is_empty() && self.properties.points.is_empty()
    }

    /// Append to the fetched-area log, keeping the newest entries
    pub fn record_fetched_area(&mut self, area: CachedArea) {
        self.fetch_log.push_back(area);
        while self.fetch_log.len() > FETCH_LOG_CAPACITY {
            self.fetch_log.pop_front();
        }
    }

    /// Log entries, oldest first
    pub fn fetched_areas(&self) -> impl Iterator<Item = &CachedArea> {
        self.fetch_log.iter()
    }

    /// The newest `n` log entries, oldest first
    pub fn recent_areas(&self, n: usize) -> impl Iterator<Item = &CachedArea> {
        self.fetch_log
            .iter()
            .skip(self.fetch_log.len().saturating_sub(n))
    }

    /// Drop all points and the fetched-area log
    pub fn clear(&mut self) {
        self.drones.clear();
        self.properties.clear();
        self.fetch_log.clear();
    }
}
