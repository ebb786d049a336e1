//! Row shapes for the observation archive.

use super::reading::{Pollutant, StationObservation};
use chrono::{DateTime, Utc};
use num_traits::FromPrimitive;
use serde::Serialize;
use sqlx::types::Decimal;
use tracing::warn;

/// One archived observation, as stored in the `observations` table.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DbObservation {
    /// Primary key (assigned by the database, None before insertion).
    pub id: Option<i32>,
    pub station_id: String,
    pub name: String,
    pub city: Option<String>,
    pub region: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Comma-separated, sorted source identifiers.
    pub sources: String,
    pub pm25: Option<Decimal>,
    pub pm10: Option<Decimal>,
    pub no2: Option<Decimal>,
    pub so2: Option<Decimal>,
    pub o3: Option<Decimal>,
    pub co: Option<Decimal>,
    pub aqi: i32,
    pub category: String,
    pub dominant_pollutant: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl From<&StationObservation> for DbObservation {
    fn from(observation: &StationObservation) -> Self {
        let reading = observation.reading();
        let decimal = |pollutant: Pollutant| {
            let value = reading.valid(pollutant)?;
            let converted = Decimal::from_f64(value);
            if converted.is_none() {
                warn!(
                    "Could not convert {} value {} of '{}' to Decimal; storing NULL",
                    pollutant, value, observation.id
                );
            }
            converted
        };

        Self {
            id: None,
            station_id: observation.id.clone(),
            name: observation.name.clone(),
            city: observation.city.clone(),
            region: observation.region.clone(),
            latitude: observation.coordinates.latitude,
            longitude: observation.coordinates.longitude,
            sources: observation
                .sources
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(","),
            pm25: decimal(Pollutant::Pm25),
            pm10: decimal(Pollutant::Pm10),
            no2: decimal(Pollutant::No2),
            so2: decimal(Pollutant::So2),
            o3: decimal(Pollutant::O3),
            co: decimal(Pollutant::Co),
            aqi: i32::from(observation.aqi()),
            category: observation.category().key().to_string(),
            dominant_pollutant: observation
                .dominant_pollutant()
                .map(|p| p.key().to_string()),
            observed_at: observation.observed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, PollutantReading};
    use chrono::TimeZone;

    #[test]
    fn test_db_observation_from_station() {
        let observed_at = Utc.with_ymd_and_hms(2024, 12, 1, 8, 0, 0).unwrap();
        let observation = StationObservation::new(
            "mock-rs-beograd-0",
            "Beograd #1",
            GeoPoint::new(20.45, 44.79),
            PollutantReading::default()
                .with(Pollutant::Pm25, 35.5)
                .with(Pollutant::No2, 40.0),
            observed_at,
        )
        .with_city("Beograd")
        .with_region("RS")
        .with_source("openaq")
        .with_source("mock");

        let row = DbObservation::from(&observation);
        assert_eq!(row.id, None);
        assert_eq!(row.station_id, "mock-rs-beograd-0");
        assert_eq!(row.sources, "mock,openaq");
        assert_eq!(row.pm25, Decimal::from_f64(35.5));
        assert_eq!(row.pm10, None);
        assert_eq!(row.aqi, 101);
        assert_eq!(row.category, "unhealthy");
        assert_eq!(row.dominant_pollutant.as_deref(), Some("pm25"));
        assert_eq!(row.observed_at, observed_at);
    }
}
