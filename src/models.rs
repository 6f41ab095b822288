use mongodb::bson::Document;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

pub(crate) const DEFAULT_RADIUS_KM: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

fn default_radius() -> f64 {
    DEFAULT_RADIUS_KM
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationQuery {
    pub city: Option<String>,
    pub area: Option<String>,
    #[serde(rename = "lat")]
    pub latitude: Option<f64>,
    #[serde(rename = "lon")]
    pub longitude: Option<f64>,
    #[serde(default = "default_radius")]
    pub radius: f64,
}

impl Default for LocationQuery {
    fn default() -> Self {
        Self {
            city: None,
            area: None,
            latitude: None,
            longitude: None,
            radius: DEFAULT_RADIUS_KM,
        }
    }
}

impl LocationQuery {
    /// The GPS pair, only when both halves were supplied.
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinate::new(latitude, longitude)),
            _ => None,
        }
    }

    /// City and area, only when both are non-empty.
    pub fn city_and_area(&self) -> Option<(&str, &str)> {
        let city = self.city.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let area = self.area.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some((city, area))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub city: Option<String>,
    pub area: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LocationSource {
    Gps,
    Geocoded,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub coordinate: Coordinate,
    pub detected_address: Option<Address>,
    pub source: LocationSource,
}

/// A registered pickup point. Everything besides `id` and `coordinate` is
/// provider-defined and passed through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct PickupPoint {
    pub id: String,
    pub coordinate: Coordinate,
    pub fields: Document,
}

const RESERVED_KEYS: [&str; 2] = ["id", "location"];

// Serialized as `{"id", "location": {latitude, longitude}, ...fields}`.
// Stored keys that collide with `id` or `location` are left out.
impl Serialize for PickupPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("location", &self.coordinate)?;
        for (key, value) in self.fields.iter().filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str())) {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub points: Vec<PickupPoint>,
    pub radius_used: f64,
    pub expanded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickupPoints {
    pub user_location: ResolvedLocation,
    pub pickup_points: Vec<PickupPoint>,
    pub search_expanded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickupPointCommand {
    pub name: String,
    pub coordinate: Coordinate,
    pub registered_by: String,
    pub fields: Document,
}
