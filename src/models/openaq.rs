//! Wire structures for the subset of the OpenAQ v3 API read by the OpenAQ source adapter.
//!
//! Only `/v3/locations` and `/v3/locations/{id}/latest` are consumed. Fields the
//! adapter never reads are left out; serde ignores them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generic metadata block of v3 responses.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetaV3 {
    pub name: String,
    pub website: String,
    pub page: u32,
    pub limit: u32,
    /// Either a number or a string such as `">1000"`, so it is kept untyped.
    #[serde(default)]
    pub found: Option<serde_json::Value>,
}

/// Geographical coordinates as OpenAQ reports them (latitude first, both nullable).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Coordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Date and time with UTC and local variants.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatetimeObject {
    pub utc: DateTime<Utc>,
    pub local: String, // Keep as string as timezone info might vary
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterBase {
    pub id: i32,
    pub name: String,
    pub units: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CountryBase {
    pub id: Option<i32>,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderBase {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SensorBase {
    pub id: i32,
    pub name: String,
    pub parameter: ParameterBase,
}

/// Response structure for the `/v3/locations` endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocationsResponse {
    pub meta: MetaV3,
    pub results: Vec<Location>,
}

/// A monitoring location; `locality` is usually the city name.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: i32,
    pub name: Option<String>,
    pub locality: Option<String>,
    pub country: CountryBase,
    pub provider: Option<ProviderBase>,
    #[serde(default)]
    pub is_mobile: bool,
    #[serde(default)]
    pub is_monitor: bool,
    #[serde(default)]
    pub sensors: Vec<SensorBase>,
    #[serde(default)]
    pub coordinates: Coordinates,
    pub datetime_last: Option<DatetimeObject>,
}

impl Location {
    /// Looks up the parameter a sensor of this location measures.
    pub fn parameter_for_sensor(&self, sensor_id: i32) -> Option<&ParameterBase> {
        self.sensors
            .iter()
            .find(|s| s.id == sensor_id)
            .map(|s| &s.parameter)
    }
}

/// Response structure for the `/v3/locations/{id}/latest` endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LatestResponse {
    pub meta: MetaV3,
    pub results: Vec<Latest>,
}

/// Latest value of one sensor at a location.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Latest {
    pub datetime: DatetimeObject,
    pub value: f64,
    #[serde(default)]
    pub coordinates: Coordinates,
    pub sensors_id: i32,
    pub locations_id: i32,
}
