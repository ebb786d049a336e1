//! Merges normalised readings from every source into station observations.

use crate::models::{GeoPoint, NormalizedReading, PollutantReading, StationObservation};
use rayon::prelude::*; // Used for parallel observation construction
use tracing::{debug, info};

/// Flattens all source batches, drops readings without an id or plausible
/// coordinates, and builds one observation per surviving reading.
///
/// Order is preserved and ids are not deduplicated: two providers instrumenting the
/// same station yield two observations. An empty input yields an empty output.
pub fn aggregate<I>(source_batches: I) -> Vec<StationObservation>
where
    I: IntoIterator<Item = Vec<NormalizedReading>>,
{
    let readings: Vec<NormalizedReading> = source_batches.into_iter().flatten().collect();
    if readings.is_empty() {
        debug!("No readings to aggregate.");
        return Vec::new();
    }

    let total = readings.len();
    // `collect` on a rayon iterator keeps the input order.
    let observations: Vec<StationObservation> = readings
        .into_par_iter()
        .filter_map(into_observation)
        .collect();

    let dropped = total - observations.len();
    if dropped > 0 {
        info!(
            "Dropped {} of {} readings lacking an id or valid coordinates",
            dropped, total
        );
    }
    debug!("Aggregated {} observations", observations.len());
    observations
}

fn into_observation(reading: NormalizedReading) -> Option<StationObservation> {
    if reading.id.trim().is_empty() {
        debug!("Skipping reading without id from source '{}'", reading.source);
        return None;
    }
    let Some(point) = GeoPoint::checked(reading.longitude, reading.latitude) else {
        debug!(
            "Skipping reading '{}': implausible coordinates ({:?}, {:?})",
            reading.id, reading.longitude, reading.latitude
        );
        return None;
    };
    Some(StationObservation::from_normalized(reading, point))
}

/// Opt-in merge of observations that sit within `radius_m` metres of each other in the
/// same city.
///
/// Each group is anchored on its first member (input order). The merged observation
/// keeps the anchor's name, place and coordinates, takes the lexicographically smallest
/// member id, the union of sources, the latest timestamps, and the per-pollutant mean
/// over members that reported it. Its AQI is recomputed from that merged reading.
pub fn merge_colocated(
    observations: Vec<StationObservation>,
    radius_m: f64,
) -> Vec<StationObservation> {
    if !radius_m.is_finite() || radius_m < 0.0 {
        return observations;
    }

    let mut groups: Vec<Vec<StationObservation>> = Vec::new();
    for observation in observations {
        let target = groups.iter_mut().find(|group| {
            let anchor = &group[0];
            anchor.city_key() == observation.city_key()
                && anchor.coordinates.distance_m(&observation.coordinates) <= radius_m
        });
        match target {
            Some(group) => group.push(observation),
            None => groups.push(vec![observation]),
        }
    }

    let merged: Vec<StationObservation> = groups.into_iter().map(merge_group).collect();
    debug!("Co-located merge produced {} observations", merged.len());
    merged
}

fn merge_group(mut group: Vec<StationObservation>) -> StationObservation {
    if group.len() == 1 {
        return group.remove(0);
    }

    let mut reading = PollutantReading::default();
    for pollutant in crate::models::Pollutant::ALL {
        let values: Vec<f64> = group
            .iter()
            .filter_map(|o| o.reading().valid(pollutant))
            .collect();
        if !values.is_empty() {
            reading.set(pollutant, Some(values.iter().sum::<f64>() / values.len() as f64));
        }
    }

    let id = group
        .iter()
        .map(|o| o.id.as_str())
        .min()
        .unwrap_or_default()
        .to_string();
    let observed_at = group.iter().map(|o| o.observed_at).max();
    let last_updated = group.iter().filter_map(|o| o.last_updated).max();
    let sources = group
        .iter()
        .flat_map(|o| o.sources.iter().cloned())
        .collect();

    let mut merged = group.remove(0);
    debug!(
        "Merging {} co-located observations into '{}'",
        group.len() + 1,
        id
    );
    merged.id = id;
    merged.sources = sources;
    merged.observed_at = observed_at.unwrap_or(merged.observed_at);
    merged.last_updated = last_updated;
    merged.replace_reading(reading);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AqiCategory, Pollutant};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 1, 10, 0, 0).unwrap()
    }

    fn reading(id: &str, source: &str, lon: Option<f64>, lat: Option<f64>, pm25: f64) -> NormalizedReading {
        NormalizedReading {
            id: id.to_string(),
            name: format!("Station {}", id),
            city: Some("Beograd".to_string()),
            region: Some("RS".to_string()),
            longitude: lon,
            latitude: lat,
            source: source.to_string(),
            pollutants: PollutantReading::default().with(Pollutant::Pm25, pm25),
            observed_at: at(),
            last_updated: None,
        }
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(aggregate(Vec::<Vec<NormalizedReading>>::new()).is_empty());
        assert!(aggregate(vec![Vec::new(), Vec::new()]).is_empty());
    }

    #[test]
    fn test_aggregate_flattens_in_order_and_computes_aqi() {
        let batches = vec![
            vec![
                reading("sepa-1", "sepa", Some(20.46), Some(44.81), 12.0),
                reading("sepa-2", "sepa", Some(20.40), Some(44.80), 35.4),
            ],
            vec![reading("openaq-9", "openaq", Some(20.47), Some(44.79), 60.0)],
        ];
        let observations = aggregate(batches);
        let ids: Vec<&str> = observations.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["sepa-1", "sepa-2", "openaq-9"]);
        assert_eq!(observations[0].aqi(), 50);
        assert_eq!(observations[1].category(), AqiCategory::Moderate);
        assert!(observations[2].sources.contains("openaq"));
    }

    #[test]
    fn test_aggregate_drops_invalid_readings() {
        let batches = vec![vec![
            reading("", "sepa", Some(20.0), Some(44.0), 10.0),
            reading("a", "sepa", None, Some(44.0), 10.0),
            reading("b", "sepa", Some(200.0), Some(44.0), 10.0),
            reading("c", "sepa", Some(20.0), Some(95.0), 10.0),
            reading("d", "sepa", Some(20.0), Some(44.0), 10.0),
        ]];
        let observations = aggregate(batches);
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].id, "d");
    }

    #[test]
    fn test_aggregate_keeps_duplicate_ids_from_different_sources() {
        let batches = vec![
            vec![reading("shared-1", "sepa", Some(20.0), Some(44.0), 10.0)],
            vec![reading("shared-1", "openaq", Some(20.0), Some(44.0), 40.0)],
        ];
        let observations = aggregate(batches);
        assert_eq!(observations.len(), 2);
        assert_ne!(observations[0].aqi(), observations[1].aqi());
    }

    #[test]
    fn test_merge_colocated_averages_and_recomputes() {
        let mut late = reading("openaq-7", "openaq", Some(20.4601), Some(44.8101), 30.0);
        late.observed_at = at() + Duration::minutes(20);
        let observations = aggregate(vec![vec![
            reading("sepa-3", "sepa", Some(20.46), Some(44.81), 10.0),
            late,
            reading("sepa-4", "sepa", Some(21.90), Some(43.32), 5.0),
        ]]);

        let merged = merge_colocated(observations, 250.0);
        assert_eq!(merged.len(), 2);

        let first = &merged[0];
        assert_eq!(first.id, "openaq-7");
        assert_eq!(first.name, "Station sepa-3");
        assert_eq!(first.reading().pm25, Some(20.0));
        assert_eq!(first.aqi(), 68);
        assert_eq!(first.observed_at, at() + Duration::minutes(20));
        assert_eq!(first.sources.len(), 2);
        assert_eq!(merged[1].id, "sepa-4");
    }

    #[test]
    fn test_merge_colocated_respects_city_boundary() {
        let mut other_city = reading("x-2", "x", Some(20.46), Some(44.81), 10.0);
        other_city.city = Some("Zemun".to_string());
        let observations = aggregate(vec![vec![
            reading("x-1", "x", Some(20.46), Some(44.81), 10.0),
            other_city,
        ]]);
        assert_eq!(merge_colocated(observations, 1_000.0).len(), 2);
    }
}
