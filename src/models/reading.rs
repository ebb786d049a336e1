//! Core observation records shared by the calculator, aggregator and ranking engine.
//!
//! Includes:
//! - `Pollutant` and `PollutantReading`: the pollutant vocabulary and a sparse set of concentrations.
//! - `NormalizedReading`: the single shape every source adapter produces.
//! - `StationObservation`: one monitoring point with its derived AQI.
//! - `AqiCategory` and `DataQuality`: ordered classification enums.

use crate::aqi::{compute_aqi, AqiResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Sentinel used when a reading carries no region or city.
pub const UNKNOWN_GROUP: &str = "Unknown";

/// The pollutants a station may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pollutant {
    Pm25,
    Pm10,
    No2,
    So2,
    O3,
    Co,
}

impl Pollutant {
    pub const ALL: [Pollutant; 6] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::No2,
        Pollutant::So2,
        Pollutant::O3,
        Pollutant::Co,
    ];

    /// Short lowercase key, matching provider parameter names (`pm25`, `no2`, ...).
    pub fn key(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm25",
            Pollutant::Pm10 => "pm10",
            Pollutant::No2 => "no2",
            Pollutant::So2 => "so2",
            Pollutant::O3 => "o3",
            Pollutant::Co => "co",
        }
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::No2 => "NO2",
            Pollutant::So2 => "SO2",
            Pollutant::O3 => "O3",
            Pollutant::Co => "CO",
        }
    }

    /// Canonical unit of a `PollutantReading` value for this pollutant.
    pub fn unit(self) -> &'static str {
        match self {
            Pollutant::Co => "mg/m³",
            _ => "µg/m³",
        }
    }

    /// Parses a provider parameter name, tolerating common spellings (`pm2.5`, `PM2_5`).
    pub fn from_key(key: &str) -> Option<Self> {
        let normalized: String = key
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "pm25" => Some(Pollutant::Pm25),
            "pm10" => Some(Pollutant::Pm10),
            "no2" => Some(Pollutant::No2),
            "so2" => Some(Pollutant::So2),
            "o3" => Some(Pollutant::O3),
            "co" => Some(Pollutant::Co),
            _ => None,
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Concentrations for zero or more pollutants.
///
/// Values are µg/m³ except CO, which is mg/m³. Absent, negative and non-finite
/// values are all treated as "not reported".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollutantReading {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm25: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm10: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub so2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub o3: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co: Option<f64>,
}

impl PollutantReading {
    /// Raw stored value for a pollutant, without validity filtering.
    pub fn get(&self, pollutant: Pollutant) -> Option<f64> {
        match pollutant {
            Pollutant::Pm25 => self.pm25,
            Pollutant::Pm10 => self.pm10,
            Pollutant::No2 => self.no2,
            Pollutant::So2 => self.so2,
            Pollutant::O3 => self.o3,
            Pollutant::Co => self.co,
        }
    }

    pub fn set(&mut self, pollutant: Pollutant, value: Option<f64>) {
        let slot = match pollutant {
            Pollutant::Pm25 => &mut self.pm25,
            Pollutant::Pm10 => &mut self.pm10,
            Pollutant::No2 => &mut self.no2,
            Pollutant::So2 => &mut self.so2,
            Pollutant::O3 => &mut self.o3,
            Pollutant::Co => &mut self.co,
        };
        *slot = value;
    }

    /// Builder-style setter.
    pub fn with(mut self, pollutant: Pollutant, value: f64) -> Self {
        self.set(pollutant, Some(value));
        self
    }

    /// Usable value for a pollutant: present, finite and non-negative.
    pub fn valid(&self, pollutant: Pollutant) -> Option<f64> {
        self.get(pollutant)
            .filter(|value| value.is_finite() && *value >= 0.0)
    }

    /// Iterates over every usable `(pollutant, value)` pair in canonical order.
    pub fn reported(&self) -> impl Iterator<Item = (Pollutant, f64)> + '_ {
        Pollutant::ALL
            .into_iter()
            .filter_map(move |p| self.valid(p).map(|v| (p, v)))
    }

    /// Number of distinct pollutants with a usable value.
    pub fn reported_count(&self) -> usize {
        self.reported().count()
    }

    pub fn is_empty(&self) -> bool {
        self.reported_count() == 0
    }
}

/// A geographic point. Longitude comes first, matching GeoJSON ordering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Builds a point only when both values are finite and inside Earth bounds.
    pub fn checked(longitude: Option<f64>, latitude: Option<f64>) -> Option<Self> {
        let (lon, lat) = (longitude?, latitude?);
        let plausible = lon.is_finite()
            && lat.is_finite()
            && (-180.0..=180.0).contains(&lon)
            && (-90.0..=90.0).contains(&lat);
        plausible.then(|| Self::new(lon, lat))
    }

    /// Great-circle distance in metres (haversine, mean Earth radius).
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_000.0;
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

/// A reading as produced by a source adapter, before validation.
///
/// Adapters assign source-prefixed ids (`"<source>-<local id>"`) so different
/// providers never collide by accident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReading {
    pub id: String,
    pub name: String,
    pub city: Option<String>,
    pub region: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub source: String,
    pub pollutants: PollutantReading,
    pub observed_at: DateTime<Utc>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Ordered AQI category. Boundaries: good ≤50, moderate ≤100, unhealthy ≤150,
/// very-unhealthy ≤200, hazardous above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AqiCategory {
    Good,
    Moderate,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    pub const ALL: [AqiCategory; 5] = [
        AqiCategory::Good,
        AqiCategory::Moderate,
        AqiCategory::Unhealthy,
        AqiCategory::VeryUnhealthy,
        AqiCategory::Hazardous,
    ];

    /// The one boundary table used everywhere an AQI is classified.
    pub fn from_aqi(aqi: u16) -> Self {
        match aqi {
            0..=50 => AqiCategory::Good,
            51..=100 => AqiCategory::Moderate,
            101..=150 => AqiCategory::Unhealthy,
            151..=200 => AqiCategory::VeryUnhealthy,
            _ => AqiCategory::Hazardous,
        }
    }

    /// Stable kebab-case identifier, identical to the serialized form.
    pub fn key(self) -> &'static str {
        match self {
            AqiCategory::Good => "good",
            AqiCategory::Moderate => "moderate",
            AqiCategory::Unhealthy => "unhealthy",
            AqiCategory::VeryUnhealthy => "very-unhealthy",
            AqiCategory::Hazardous => "hazardous",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Qualitative data-quality tier. Ordered `Poor < Fair < Good < Excellent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl DataQuality {
    pub const ALL: [DataQuality; 4] = [
        DataQuality::Excellent,
        DataQuality::Good,
        DataQuality::Fair,
        DataQuality::Poor,
    ];

    pub fn key(self) -> &'static str {
        match self {
            DataQuality::Excellent => "excellent",
            DataQuality::Good => "good",
            DataQuality::Fair => "fair",
            DataQuality::Poor => "poor",
        }
    }
}

impl fmt::Display for DataQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One monitoring point after aggregation.
///
/// `aqi`, `category` and `dominant_pollutant` are private and always derived from
/// the reading; `replace_reading` is the only way to change the reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationObservation {
    pub id: String,
    pub name: String,
    pub city: Option<String>,
    pub region: Option<String>,
    pub coordinates: GeoPoint,
    pub sources: BTreeSet<String>,
    reading: PollutantReading,
    aqi: u16,
    category: AqiCategory,
    dominant_pollutant: Option<Pollutant>,
    pub observed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl StationObservation {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        coordinates: GeoPoint,
        reading: PollutantReading,
        observed_at: DateTime<Utc>,
    ) -> Self {
        let AqiResult {
            aqi,
            category,
            dominant_pollutant,
        } = compute_aqi(&reading);
        Self {
            id: id.into(),
            name: name.into(),
            city: None,
            region: None,
            coordinates,
            sources: BTreeSet::new(),
            reading,
            aqi,
            category,
            dominant_pollutant,
            observed_at,
            last_updated: None,
        }
    }

    /// Builds an observation from an adapter reading whose coordinates were already validated.
    pub fn from_normalized(reading: NormalizedReading, coordinates: GeoPoint) -> Self {
        let name = if reading.name.trim().is_empty() {
            reading.id.clone()
        } else {
            reading.name
        };
        let mut observation =
            Self::new(reading.id, name, coordinates, reading.pollutants, reading.observed_at)
                .with_source(reading.source);
        observation.city = reading.city.filter(|c| !c.trim().is_empty());
        observation.region = reading.region.filter(|r| !r.trim().is_empty());
        observation.last_updated = reading.last_updated;
        observation
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        let source = source.into();
        if !source.is_empty() {
            self.sources.insert(source);
        }
        self
    }

    /// Swaps the reading and recomputes the derived AQI fields.
    pub fn replace_reading(&mut self, reading: PollutantReading) {
        let result = compute_aqi(&reading);
        self.reading = reading;
        self.aqi = result.aqi;
        self.category = result.category;
        self.dominant_pollutant = result.dominant_pollutant;
    }

    pub fn reading(&self) -> &PollutantReading {
        &self.reading
    }

    pub fn aqi(&self) -> u16 {
        self.aqi
    }

    pub fn category(&self) -> AqiCategory {
        self.category
    }

    pub fn dominant_pollutant(&self) -> Option<Pollutant> {
        self.dominant_pollutant
    }

    /// True when at least one pollutant contributed to the AQI.
    pub fn has_measurement(&self) -> bool {
        self.dominant_pollutant.is_some()
    }

    /// Country key used for grouping; `"Unknown"` when the region is absent or blank.
    pub fn country_key(&self) -> &str {
        non_blank(self.region.as_deref()).unwrap_or(UNKNOWN_GROUP)
    }

    /// City key used for grouping; `"Unknown"` when the city is absent or blank.
    pub fn city_key(&self) -> &str {
        non_blank(self.city.as_deref()).unwrap_or(UNKNOWN_GROUP)
    }
}

/// Trimmed `value`, or `None` when it is absent or only whitespace.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 20, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_pollutant_from_key_variants() {
        assert_eq!(Pollutant::from_key("pm25"), Some(Pollutant::Pm25));
        assert_eq!(Pollutant::from_key("PM2.5"), Some(Pollutant::Pm25));
        assert_eq!(Pollutant::from_key("pm2_5"), Some(Pollutant::Pm25));
        assert_eq!(Pollutant::from_key("O3"), Some(Pollutant::O3));
        assert_eq!(Pollutant::from_key("temperature"), None);
    }

    #[test]
    fn test_reading_ignores_negative_and_nan() {
        let reading = PollutantReading::default()
            .with(Pollutant::Pm25, -3.0)
            .with(Pollutant::Pm10, f64::NAN)
            .with(Pollutant::No2, 20.0);
        assert_eq!(reading.reported_count(), 1);
        assert_eq!(reading.valid(Pollutant::Pm25), None);
        assert_eq!(reading.get(Pollutant::Pm25), Some(-3.0));
        assert!(!reading.is_empty());
        assert!(PollutantReading::default().is_empty());
    }

    #[test]
    fn test_geopoint_bounds() {
        assert!(GeoPoint::checked(Some(20.46), Some(44.81)).is_some());
        assert!(GeoPoint::checked(Some(181.0), Some(44.0)).is_none());
        assert!(GeoPoint::checked(Some(20.0), Some(-90.5)).is_none());
        assert!(GeoPoint::checked(None, Some(44.0)).is_none());
        assert!(GeoPoint::checked(Some(f64::INFINITY), Some(44.0)).is_none());
    }

    #[test]
    fn test_geopoint_distance() {
        // Belgrade to Novi Sad is roughly 70 km.
        let belgrade = GeoPoint::new(20.4573, 44.7872);
        let novi_sad = GeoPoint::new(19.8335, 45.2671);
        let d = belgrade.distance_m(&novi_sad);
        assert!(d > 65_000.0 && d < 75_000.0, "distance was {}", d);
        assert!(belgrade.distance_m(&belgrade).abs() < 1e-6);
    }

    #[test]
    fn test_category_boundaries() {
        assert_eq!(AqiCategory::from_aqi(0), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(50), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(51), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_aqi(100), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_aqi(150), AqiCategory::Unhealthy);
        assert_eq!(AqiCategory::from_aqi(200), AqiCategory::VeryUnhealthy);
        assert_eq!(AqiCategory::from_aqi(201), AqiCategory::Hazardous);
        assert!(AqiCategory::Good < AqiCategory::Hazardous);
    }

    #[test]
    fn test_observation_derives_aqi_and_recomputes() {
        let mut obs = StationObservation::new(
            "sepa-1",
            "Vračar",
            GeoPoint::new(20.47, 44.80),
            PollutantReading::default().with(Pollutant::Pm25, 12.0),
            at(),
        );
        assert_eq!(obs.aqi(), 50);
        assert_eq!(obs.category(), AqiCategory::Good);
        assert_eq!(obs.dominant_pollutant(), Some(Pollutant::Pm25));

        obs.replace_reading(PollutantReading::default().with(Pollutant::Pm25, 35.4));
        assert_eq!(obs.aqi(), 100);
        assert_eq!(obs.category(), AqiCategory::Moderate);

        obs.replace_reading(PollutantReading::default());
        assert_eq!(obs.aqi(), 0);
        assert!(!obs.has_measurement());
    }

    #[test]
    fn test_from_normalized_falls_back_to_id_and_drops_blank_fields() {
        let reading = NormalizedReading {
            id: "openaq-42".to_string(),
            name: "  ".to_string(),
            city: Some(String::new()),
            region: Some("RS".to_string()),
            longitude: Some(20.4),
            latitude: Some(44.8),
            source: "openaq".to_string(),
            pollutants: PollutantReading::default().with(Pollutant::Pm10, 40.0),
            observed_at: at(),
            last_updated: None,
        };
        let obs = StationObservation::from_normalized(reading, GeoPoint::new(20.4, 44.8));
        assert_eq!(obs.name, "openaq-42");
        assert_eq!(obs.city, None);
        assert_eq!(obs.city_key(), UNKNOWN_GROUP);
        assert_eq!(obs.country_key(), "RS");
        assert!(obs.sources.contains("openaq"));
    }

    #[test]
    fn test_blank_group_keys_fall_back_to_unknown() {
        let obs = StationObservation::new("s", "S", GeoPoint::new(20.0, 44.0), PollutantReading::default(), at())
            .with_region("")
            .with_city("   ");
        assert_eq!(obs.country_key(), UNKNOWN_GROUP);
        assert_eq!(obs.city_key(), UNKNOWN_GROUP);

        let obs = obs.with_region(" RS ").with_city("Niš");
        assert_eq!(obs.country_key(), "RS");
        assert_eq!(obs.city_key(), "Niš");
    }
}
