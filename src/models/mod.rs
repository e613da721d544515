//! Core data models for the explorer.

pub mod bounds;
pub mod feature;
pub mod point;

pub use bounds::{CachedArea, GeoBounds};
pub use feature::{
    points_to_features, Feature, FeatureCollection, HexFeature, HexFeatureCollection,
    HexProperties, PointFeatureCollection, PointGeometry, PointProperties, PolygonGeometry,
};
pub use point::{DataType, DronePoint, Point, PropertyPoint, RawPoint, RemoteData, TabType};
