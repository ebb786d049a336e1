//! Provides an OpenAQ v3 reading source.
//!
//! Locations are listed per country (`/v3/locations?iso=..`), then each location's
//! latest sensor values are fetched (`/v3/locations/{id}/latest`) and resolved to
//! pollutants through the location's sensor list. Every country is a separate source.

use super::source::ReadingSource;
use crate::aqi::normalize_concentration;
use crate::error::{AppError, Result};
use crate::models::{
    Latest, LatestResponse, Location, LocationsResponse, NormalizedReading, Pollutant,
    PollutantReading,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

const BASE_URL: &str = "https://api.openaq.org/v3";

/// Identifier used as the `source` of every reading and as the id prefix.
pub const OPENAQ_SOURCE: &str = "openaq";

/// Page size for location listings.
const PAGE_LIMIT: u32 = 100;

/// Hard stop for pagination per country.
const MAX_PAGES: u32 = 5;

/// In-flight requests allowed across all countries sharing one permit pool.
pub const MAX_CONCURRENT_REQUESTS: usize = 8;

/// `latest` lookups queued at once for a single country.
const LOCATION_FETCH_CONCURRENCY: usize = 4;

/// OpenAQ v3 client for one country.
///
/// Each country is its own `ReadingSource`, so a slow or failing country is timed
/// out on its own and never discards what the others returned. Sources built by
/// [`openaq_sources`] share one HTTP client and one request permit pool.
pub struct OpenAqSource {
    client: Client,
    api_key: String,
    base_url: String,
    country: String,
    name: String,
    permits: Arc<Semaphore>,
}

/// One source per ISO country code against the public v3 endpoint.
pub fn openaq_sources(api_key: &str, countries: &[String]) -> Vec<Arc<dyn ReadingSource>> {
    openaq_sources_with_base_url(api_key, countries, BASE_URL)
}

/// Like [`openaq_sources`] but against a custom base URL (e.g. a mock server).
pub fn openaq_sources_with_base_url(
    api_key: &str,
    countries: &[String],
    base_url: &str,
) -> Vec<Arc<dyn ReadingSource>> {
    let client = Client::new();
    let permits = Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS));
    countries
        .iter()
        .map(|country| {
            let source = OpenAqSource::with_base_url(api_key.to_string(), country.clone(), base_url)
                .with_client(client.clone())
                .with_permits(Arc::clone(&permits));
            Arc::new(source) as Arc<dyn ReadingSource>
        })
        .collect()
}

impl OpenAqSource {
    /// Creates a source for one ISO country code using the public v3 endpoint.
    pub fn new(api_key: String, country: String) -> Self {
        Self::with_base_url(api_key, country, BASE_URL)
    }

    /// Creates a source with a custom base URL (e.g. a mock server).
    pub fn with_base_url(api_key: String, country: String, base_url: &str) -> Self {
        let country = country.trim().to_uppercase();
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            name: format!("{}:{}", OPENAQ_SOURCE, country),
            country,
            permits: Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS)),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Shares a request permit pool with other sources.
    pub fn with_permits(mut self, permits: Arc<Semaphore>) -> Self {
        self.permits = permits;
        self
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    /// Lists fixed (non-mobile) locations for the country, following pagination.
    pub async fn get_locations(&self) -> Result<Vec<Location>> {
        info!("Fetching OpenAQ locations for country: {}", self.country);
        let url = format!("{}/locations", self.base_url);
        let mut locations = Vec::new();

        for page in 1..=MAX_PAGES {
            let response: LocationsResponse = self
                .get_json(
                    &url,
                    &[
                        ("iso", self.country.clone()),
                        ("limit", PAGE_LIMIT.to_string()),
                        ("page", page.to_string()),
                    ],
                )
                .await?;
            let received = response.results.len();
            locations.extend(response.results.into_iter().filter(|l| !l.is_mobile));
            debug!("Page {} for {}: {} locations", page, self.country, received);
            if received < PAGE_LIMIT as usize {
                break;
            }
        }

        Ok(locations)
    }

    /// Latest value of every sensor at a location.
    pub async fn get_latest_for_location(&self, location_id: i32) -> Result<Vec<Latest>> {
        let url = format!("{}/locations/{}/latest", self.base_url, location_id);
        let response: LatestResponse = self.get_json(&url, &[]).await?;
        debug!(
            "Received {} latest values for location {}",
            response.results.len(),
            location_id
        );
        Ok(response.results)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| AppError::upstream(&self.name, e.to_string()))?;

        let mut request = self.client.get(url).header("X-API-Key", &self.api_key);
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request
            .send()
            .await
            .map_err(|e| {
                error!("Error requesting {}: {}", url, e);
                AppError::Api(e.into())
            })?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                let status = e.status();
                error!(
                    "API request to {} failed with status {}: {}",
                    url,
                    status.unwrap_or_default(),
                    e
                );
                if status == Some(reqwest::StatusCode::UNAUTHORIZED)
                    || status == Some(reqwest::StatusCode::FORBIDDEN)
                {
                    error!("Received 401/403. Check OPENAQ_KEY validity and permissions.");
                }
                return Err(AppError::Api(e.into()));
            },
        };

        response.json::<T>().await.map_err(|e| {
            error!("Error parsing API response JSON from {}: {}", url, e);
            AppError::Api(e.into())
        })
    }
}

#[async_trait]
impl ReadingSource for OpenAqSource {
    fn name(&self) -> &str {
        &self.name
    }

    /// Latest values for every location of the country, skipping failed locations.
    async fn fetch_readings(&self) -> Result<Vec<NormalizedReading>> {
        let locations = self.get_locations().await?;
        let location_ids: Vec<i32> = locations.iter().map(|location| location.id).collect();
        let latest: Vec<Result<Vec<Latest>>> = stream::iter(
            location_ids
                .into_iter()
                .map(|id| self.get_latest_for_location(id)),
        )
        .buffered(LOCATION_FETCH_CONCURRENCY)
        .collect()
        .await;

        let readings: Vec<NormalizedReading> = locations
            .iter()
            .zip(latest)
            .filter_map(|(location, latest)| match latest {
                Ok(latest) => to_normalized(location, &latest),
                Err(e) => {
                    warn!("Skipping OpenAQ location {}: {}", location.id, e);
                    None
                },
            })
            .collect();

        info!(
            "OpenAQ produced {} readings from {} locations in {}",
            readings.len(),
            locations.len(),
            self.country
        );
        Ok(readings)
    }
}

/// Folds a location and its latest sensor values into one normalised reading.
///
/// Sensors measuring something other than the six pollutants, or reporting in an
/// unknown unit, are ignored. When several sensors report the same pollutant the most
/// recent value wins. Returns `None` when the location has no latest values.
pub fn to_normalized(location: &Location, latest: &[Latest]) -> Option<NormalizedReading> {
    if latest.is_empty() {
        return None;
    }

    let mut newest: HashMap<Pollutant, (DateTime<Utc>, f64)> = HashMap::new();
    for value in latest {
        let Some(parameter) = location.parameter_for_sensor(value.sensors_id) else {
            continue;
        };
        let Some(pollutant) = Pollutant::from_key(&parameter.name) else {
            continue;
        };
        let Some(normalized) = normalize_concentration(pollutant, value.value, &parameter.units)
        else {
            debug!(
                "Unsupported unit '{}' for {} at location {}",
                parameter.units, pollutant, location.id
            );
            continue;
        };
        let when = value.datetime.utc;
        match newest.get(&pollutant) {
            Some((existing, _)) if *existing >= when => {},
            _ => {
                newest.insert(pollutant, (when, normalized));
            },
        }
    }

    let mut pollutants = PollutantReading::default();
    for (pollutant, (_, value)) in &newest {
        pollutants.set(*pollutant, Some(*value));
    }

    let observed_at = latest.iter().map(|l| l.datetime.utc).max()?;
    let fallback = latest.first().map(|l| l.coordinates.clone()).unwrap_or_default();

    Some(NormalizedReading {
        id: format!("{}-{}", OPENAQ_SOURCE, location.id),
        name: location
            .name
            .clone()
            .unwrap_or_else(|| format!("Location {}", location.id)),
        city: location.locality.clone(),
        region: Some(location.country.code.clone()),
        longitude: location.coordinates.longitude.or(fallback.longitude),
        latitude: location.coordinates.latitude.or(fallback.latitude),
        source: OPENAQ_SOURCE.to_string(),
        pollutants,
        observed_at,
        last_updated: location.datetime_last.as_ref().map(|d| d.utc),
    })
}

#[cfg(test)]
#[path = "openaq_test.rs"]
mod tests;
