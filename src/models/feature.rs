//! GeoJSON-like feature collections handed to the map renderer.

use serde::{Deserialize, Serialize};

use super::{DataType, Point};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection<G, P> {
    #[serde(rename = "type")]
    pub collection_type: String,
    pub features: Vec<Feature<G, P>>,
}

impl<G, P> FeatureCollection<G, P> {
    pub fn new(features: Vec<Feature<G, P>>) -> Self {
        Self {
            collection_type: "FeatureCollection".to_string(),
            features,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl<G, P> Default for FeatureCollection<G, P> {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature<G, P> {
    #[serde(rename = "type")]
    pub feature_type: String,
    pub geometry: G,
    pub properties: P,
}

impl<G, P> Feature<G, P> {
    pub fn new(geometry: G, properties: P) -> Self {
        Self {
            feature_type: "Feature".to_string(),
            geometry,
            properties,
        }
    }
}

/// Polygon geometry; `coordinates[0]` is the closed outer ring of `[lng, lat]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonGeometry {
    #[serde(rename = "type")]
    pub geo_type: String,
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

impl PolygonGeometry {
    pub fn from_ring(ring: Vec<[f64; 2]>) -> Self {
        Self {
            geo_type: "Polygon".to_string(),
            coordinates: vec![ring],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub geo_type: String,
    /// `[lng, lat]`
    pub coordinates: [f64; 2],
}

/// Paint-styling properties of one hex cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HexProperties {
    pub cell_id: String,
    pub count: usize,
    pub resolution: u8,
    pub tag: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointProperties {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_rentable_airspace: Option<bool>,
}

pub type HexFeature = Feature<PolygonGeometry, HexProperties>;
pub type HexFeatureCollection = FeatureCollection<PolygonGeometry, HexProperties>;
pub type PointFeature = Feature<PointGeometry, PointProperties>;
pub type PointFeatureCollection = FeatureCollection<PointGeometry, PointProperties>;

impl HexFeatureCollection {
    /// Sum of all cell counts
    pub fn total_count(&self) -> usize {
        self.features.iter().map(|f| f.properties.count).sum()
    }
}

/// Point features for the clustered (non-hex) view. Points without
/// coordinates are dropped.
pub fn points_to_features<'a>(points: impl IntoIterator<Item = &'a Point>) -> PointFeatureCollection {
    let features = points
        .into_iter()
        .filter_map(|point| {
            let (lat, lng) = point.coordinates()?;
            let (price, is_rentable_airspace) = match point {
                Point::Property(p) => (p.price, Some(p.is_rentable_airspace)),
                Point::Drone(_) => (None, None),
            };
            Some(Feature::new(
                PointGeometry {
                    geo_type: "Point".to_string(),
                    coordinates: [lng, lat],
                },
                PointProperties {
                    id: point.id().to_string(),
                    name: point.display_name(),
                    price,
                    is_rentable_airspace,
                },
            ))
        })
        .collect();

    FeatureCollection::new(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawPoint;
    use serde_json::json;

    #[test]
    fn test_hex_properties_wire_names() {
        let feature = Feature::new(
            PolygonGeometry::from_ring(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 0.0]]),
            HexProperties {
                cell_id: "85283473fffffff".to_string(),
                count: 3,
                resolution: 5,
                tag: DataType::AirSpace,
            },
        );
        let value = serde_json::to_value(&feature).unwrap();
        assert_eq!(value["type"], "Feature");
        assert_eq!(value["geometry"]["type"], "Polygon");
        assert_eq!(value["properties"]["cellId"], "85283473fffffff");
        assert_eq!(value["properties"]["tag"], "air_space");
    }

    #[test]
    fn test_points_to_features_skips_missing_coordinates() {
        let raw: Vec<RawPoint> = serde_json::from_value(json!([
            {"id": 1, "latitude": 10.0, "longitude": 20.0, "address": "1 Main St", "price": 99.0},
            {"id": 2, "latitude": 10.0}
        ]))
        .unwrap();
        let points: Vec<Point> = raw
            .into_iter()
            .map(|r| Point::from_raw(DataType::AirSpace, r))
            .collect();

        let collection = points_to_features(&points);
        assert_eq!(collection.len(), 1);
        let feature = &collection.features[0];
        assert_eq!(feature.geometry.coordinates, [20.0, 10.0]);
        assert_eq!(feature.properties.name, "1 Main St");
        assert_eq!(feature.properties.price, Some(99.0));
    }

    #[test]
    fn test_property_without_address_is_named_property() {
        let raw: RawPoint =
            serde_json::from_value(json!({"id": 3, "latitude": 1.0, "longitude": 2.0})).unwrap();
        let points = vec![Point::from_raw(DataType::AirSpace, raw)];

        let collection = points_to_features(&points);
        assert_eq!(collection.features[0].properties.name, "Property");
    }
}
