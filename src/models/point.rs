//! Drone and property point records as returned by the data API.

use chrono::Utc;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Kind of point data served by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Drone radar devices
    Drone,
    /// Air-rights properties
    AirSpace,
}

impl DataType {
    pub fn all() -> &'static [DataType] {
        &[DataType::Drone, DataType::AirSpace]
    }

    /// Path segment of the API endpoint serving this data type
    pub fn endpoint(&self) -> &'static str {
        match self {
            DataType::Drone => "droneRadar",
            DataType::AirSpace => "properties",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Drone => write!(f, "drone"),
            DataType::AirSpace => write!(f, "air_space"),
        }
    }
}

/// Which data types a view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabType {
    Drone,
    AirSpace,
    #[default]
    Both,
}

impl TabType {
    pub fn includes(&self, data_type: DataType) -> bool {
        match self {
            TabType::Both => true,
            TabType::Drone => data_type == DataType::Drone,
            TabType::AirSpace => data_type == DataType::AirSpace,
        }
    }

    pub fn data_types(&self) -> impl Iterator<Item = DataType> + '_ {
        DataType::all()
            .iter()
            .copied()
            .filter(move |t| self.includes(*t))
    }
}

/// Remote telemetry attached to a drone device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Battery percentage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DronePoint {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_location_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_location_lng: Option<f64>,
    pub ip_address: String,
    pub is_test: bool,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_data: Option<RemoteData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyPoint {
    pub id: String,
    pub title: String,
    /// Absent or empty addresses serialize as a placeholder
    #[serde(default, serialize_with = "serialize_address")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub has_landing_deck: bool,
    pub has_charging_station: bool,
    pub has_storage_hub: bool,
    pub is_rentable_airspace: bool,
    pub no_fly_zone: bool,
    pub is_boosted_area: bool,
    pub transit_fee: String,
    pub owner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

/// A located entity of either kind. Identity is the `id` field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Point {
    Drone(DronePoint),
    Property(PropertyPoint),
}

impl Point {
    pub fn id(&self) -> &str {
        match self {
            Point::Drone(d) => &d.id,
            Point::Property(p) => &p.id,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Point::Drone(_) => DataType::Drone,
            Point::Property(_) => DataType::AirSpace,
        }
    }

    /// `(lat, lng)` when both coordinates are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let (lat, lng) = match self {
            Point::Drone(d) => (d.device_location_lat, d.device_location_lng),
            Point::Property(p) => (p.latitude, p.longitude),
        };
        Some((lat?, lng?))
    }

    /// Display name used by the point/cluster view
    pub fn display_name(&self) -> String {
        match self {
            Point::Drone(d) => d
                .remote_data
                .as_ref()
                .and_then(|r| r.name.clone())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| d.id.clone()),
            Point::Property(p) => p
                .address
                .clone()
                .unwrap_or_else(|| "Property".to_string()),
        }
    }

    /// Decode a raw API record as the given data type
    pub fn from_raw(data_type: DataType, raw: RawPoint) -> Self {
        match data_type {
            DataType::Drone => Point::Drone(DronePoint::from(raw)),
            DataType::AirSpace => Point::Property(PropertyPoint::from(raw)),
        }
    }
}

/// Loosely typed record as served by either endpoint.
///
/// Every field is optional; the typed points fill the gaps with defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPoint {
    #[serde(default)]
    pub id: Value,
    pub title: Option<String>,
    pub user_id: Option<Value>,
    pub device_location_lat: Option<f64>,
    pub device_location_lng: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub price: Option<f64>,
    pub is_rentable_airspace: Option<bool>,
    pub ip_address: Option<String>,
    pub is_test: Option<bool>,
    pub created_at: Option<String>,
    pub remote_data: Option<Value>,
    pub has_landing_deck: Option<bool>,
    pub has_charging_station: Option<bool>,
    pub has_storage_hub: Option<bool>,
    pub transit_fee: Option<String>,
    pub no_fly_zone: Option<bool>,
    pub is_boosted_area: Option<bool>,
    pub owner_id: Option<Value>,
}

const NO_ADDRESS: &str = "No address provided";

fn serialize_address<S>(address: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(address.as_deref().unwrap_or(NO_ADDRESS))
}

/// Empty strings count as missing
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Ids and owner ids arrive as strings from one endpoint and numbers from the other
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl From<RawPoint> for DronePoint {
    fn from(raw: RawPoint) -> Self {
        let remote_data = raw
            .remote_data
            .and_then(|v| serde_json::from_value::<RemoteData>(v).ok());

        Self {
            id: value_to_string(&raw.id).unwrap_or_default(),
            user_id: raw
                .user_id
                .as_ref()
                .and_then(value_to_string)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "unknown".to_string()),
            device_location_lat: raw.device_location_lat,
            device_location_lng: raw.device_location_lng,
            ip_address: non_empty(raw.ip_address).unwrap_or_else(|| "0.0.0.0".to_string()),
            is_test: raw.is_test.unwrap_or(false),
            created_at: raw.created_at.unwrap_or_else(|| Utc::now().to_rfc3339()),
            remote_data,
        }
    }
}

impl From<RawPoint> for PropertyPoint {
    fn from(raw: RawPoint) -> Self {
        Self {
            id: value_to_string(&raw.id).unwrap_or_default(),
            title: non_empty(raw.title).unwrap_or_else(|| "Untitled Property".to_string()),
            address: non_empty(raw.address),
            latitude: raw.latitude,
            longitude: raw.longitude,
            has_landing_deck: raw.has_landing_deck.unwrap_or(false),
            has_charging_station: raw.has_charging_station.unwrap_or(false),
            has_storage_hub: raw.has_storage_hub.unwrap_or(false),
            is_rentable_airspace: raw.is_rentable_airspace.unwrap_or(false),
            no_fly_zone: raw.no_fly_zone.unwrap_or(false),
            is_boosted_area: raw.is_boosted_area.unwrap_or(false),
            transit_fee: non_empty(raw.transit_fee).unwrap_or_else(|| "Unknown".to_string()),
            owner_id: raw
                .owner_id
                .as_ref()
                .and_then(value_to_string)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "unknown".to_string()),
            price: raw.price,
        }
    }
}
