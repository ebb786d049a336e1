//! Provides a mock reading source generating plausible Balkan air quality data.
//!
//! Used when no OpenAQ key is configured, and in tests where controllable data is
//! needed without hitting a real API.

use super::source::ReadingSource;
use crate::error::Result;
use crate::models::{NormalizedReading, Pollutant, PollutantReading};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::debug;

/// Identifier used as the `source` of every mock reading.
pub const MOCK_SOURCE: &str = "mock";

/// `(country, city, latitude, longitude, pollution factor)`; a higher factor means dirtier air.
const BALKAN_CITIES: &[(&str, &str, f64, f64, f64)] = &[
    ("RS", "Beograd", 44.7866, 20.4489, 1.6),
    ("RS", "Novi Sad", 45.2671, 19.8335, 1.3),
    ("RS", "Niš", 43.3209, 21.8958, 1.5),
    ("RS", "Valjevo", 44.2751, 19.8982, 1.9),
    ("BA", "Sarajevo", 43.8563, 18.4131, 2.0),
    ("BA", "Tuzla", 44.5384, 18.6671, 2.1),
    ("BA", "Banja Luka", 44.7722, 17.1910, 1.4),
    ("MK", "Skopje", 41.9981, 21.4254, 2.2),
    ("MK", "Tetovo", 42.0069, 20.9715, 2.0),
    ("ME", "Podgorica", 42.4304, 19.2594, 1.1),
    ("ME", "Pljevlja", 43.3567, 19.3584, 2.3),
    ("HR", "Zagreb", 45.8150, 15.9819, 1.0),
    ("HR", "Split", 43.5081, 16.4402, 0.8),
    ("SI", "Ljubljana", 46.0569, 14.5058, 0.9),
    ("AL", "Tirana", 41.3275, 19.8187, 1.5),
    ("XK", "Prishtina", 42.6629, 21.1655, 1.9),
    ("BG", "Sofia", 42.6977, 23.3219, 1.4),
    ("GR", "Thessaloniki", 40.6401, 22.9444, 1.1),
    ("RO", "Timișoara", 45.7489, 21.2087, 1.0),
];

/// Generates mock station readings for a set of country codes.
pub struct MockSource {
    countries: Vec<String>,
    stations_per_city: usize,
}

impl MockSource {
    pub fn new(countries: Vec<String>) -> Self {
        debug!("Creating MockSource for {:?}", countries);
        Self {
            countries: countries.iter().map(|c| c.to_uppercase()).collect(),
            stations_per_city: 3,
        }
    }

    pub fn with_stations_per_city(mut self, stations_per_city: usize) -> Self {
        self.stations_per_city = stations_per_city;
        self
    }

    /// Generates readings for one country. Unsupported codes yield an empty vector.
    pub fn generate_for_country(&self, country: &str, now: DateTime<Utc>) -> Vec<NormalizedReading> {
        let country = country.to_uppercase();
        let cities: Vec<_> = BALKAN_CITIES
            .iter()
            .filter(|(code, ..)| *code == country)
            .collect();
        if cities.is_empty() {
            debug!(
                "Mock data requested for unsupported country: {}. Returning empty.",
                country
            );
            return Vec::new();
        }

        let mut rng = rand::thread_rng();
        let mut readings = Vec::with_capacity(cities.len() * self.stations_per_city);

        for (code, city, lat, lon, factor) in cities {
            for n in 0..self.stations_per_city {
                let mut pollutants = PollutantReading::default();
                for pollutant in Pollutant::ALL {
                    // Not every station instruments every pollutant.
                    if rng.gen_bool(0.75) {
                        pollutants.set(pollutant, Some(mock_value(pollutant, *factor, &mut rng)));
                    }
                }

                let observed_at = now - Duration::minutes(rng.gen_range(0..180));
                readings.push(NormalizedReading {
                    id: format!("{}-{}-{}-{}", MOCK_SOURCE, code.to_lowercase(), slug(city), n),
                    name: format!("{} #{}", city, n + 1),
                    city: Some(city.to_string()),
                    region: Some(code.to_string()),
                    longitude: Some(lon + rng.gen_range(-0.03..0.03)),
                    latitude: Some(lat + rng.gen_range(-0.03..0.03)),
                    source: MOCK_SOURCE.to_string(),
                    pollutants,
                    observed_at,
                    last_updated: Some(now),
                });
            }
        }

        debug!("Generated {} mock readings for {}", readings.len(), country);
        readings
    }

    fn generate(&self, now: DateTime<Utc>) -> Vec<NormalizedReading> {
        self.countries
            .iter()
            .flat_map(|country| self.generate_for_country(country, now))
            .collect()
    }
}

#[async_trait]
impl ReadingSource for MockSource {
    fn name(&self) -> &str {
        MOCK_SOURCE
    }

    async fn fetch_readings(&self) -> Result<Vec<NormalizedReading>> {
        Ok(self.generate(Utc::now()))
    }
}

/// A plausible concentration in the reading's canonical unit, scaled by the city factor.
fn mock_value(pollutant: Pollutant, factor: f64, rng: &mut impl Rng) -> f64 {
    let (min_base, max_base) = match pollutant {
        Pollutant::Pm25 => (5.0, 35.0),
        Pollutant::Pm10 => (10.0, 50.0),
        Pollutant::No2 => (10.0, 60.0),
        Pollutant::So2 => (2.0, 20.0),
        Pollutant::O3 => (30.0, 100.0),
        Pollutant::Co => (0.2, 1.2), // mg/m³
    };
    let min = (min_base * factor).max(0.0);
    let max = (max_base * factor).max(min + 0.1);
    let value: f64 = rng.gen_range(min..max);
    (value * 10.0).round() / 10.0
}

/// Lowercase ASCII identifier fragment for a city name.
fn slug(city: &str) -> String {
    city.chars()
        .map(|c| match c {
            'š' | 'Š' | 'ș' | 'Ș' => 's',
            'č' | 'ć' | 'Č' | 'Ć' => 'c',
            'ž' | 'Ž' => 'z',
            'đ' | 'Đ' => 'd',
            c if c.is_ascii_alphanumeric() => c.to_ascii_lowercase(),
            _ => '-',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_unsupported_country_is_empty() {
        let source = MockSource::new(vec!["NL".to_string()]);
        assert!(source.generate_for_country("NL", now()).is_empty());
    }

    #[test]
    fn test_generated_readings_are_well_formed() {
        let source = MockSource::new(vec!["rs".to_string()]).with_stations_per_city(2);
        let readings = source.generate_for_country("rs", now());
        assert_eq!(readings.len(), 4 * 2);
        for reading in &readings {
            assert!(reading.id.starts_with("mock-rs-"));
            assert_eq!(reading.region.as_deref(), Some("RS"));
            assert!(reading.observed_at <= now());
            assert!(reading.observed_at > now() - Duration::minutes(180));
            for (_, value) in reading.pollutants.reported() {
                assert!(value >= 0.0);
            }
        }
        assert!(readings.iter().any(|r| r.id == "mock-rs-nis-1"));
    }

    #[tokio::test]
    async fn test_mock_readings_survive_aggregation() {
        let source = MockSource::new(vec!["BA".to_string(), "MK".to_string(), "XX".to_string()]);
        let readings = source.fetch_readings().await.unwrap();
        assert_eq!(readings.len(), 5 * 3);
        let observations = aggregate(vec![readings]);
        assert_eq!(observations.len(), 15);
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Banja Luka"), "banja-luka");
        assert_eq!(slug("Timișoara"), "timisoara");
        assert_eq!(slug("Niš"), "nis");
    }
}
