//! Summary statistics and per-country / per-city grouping.

use super::ranking::data_quality;
use crate::models::{
    non_blank, AqiCategory, DataQuality, GroupSummary, NetworkStats, StationObservation,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Rounds to one decimal place, halves away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Mean AQI of the measured observations, rounded to one decimal; 0.0 when there are none.
pub fn average_aqi<'a, I>(observations: I) -> f64
where
    I: IntoIterator<Item = &'a StationObservation>,
{
    let (sum, count) = observations
        .into_iter()
        .filter(|o| o.has_measurement())
        .fold((0u64, 0usize), |(sum, count), o| {
            (sum + u64::from(o.aqi()), count + 1)
        });
    if count == 0 {
        0.0
    } else {
        round1(sum as f64 / count as f64)
    }
}

/// Totals, averages and distributions for one aggregation pass.
///
/// Accepts any iterator of observations so a ranking can be fed back in
/// (`entries.iter().map(|e| &e.observation)`) without changing the result.
pub fn compute_stats<'a, I>(observations: I, as_of: DateTime<Utc>) -> NetworkStats
where
    I: IntoIterator<Item = &'a StationObservation>,
{
    let observations: Vec<&StationObservation> = observations.into_iter().collect();

    let mut category_distribution: BTreeMap<AqiCategory, usize> =
        AqiCategory::ALL.iter().map(|c| (*c, 0)).collect();
    let mut quality_distribution: BTreeMap<DataQuality, usize> =
        DataQuality::ALL.iter().map(|q| (*q, 0)).collect();
    let mut cities = BTreeSet::new();
    let mut countries = BTreeSet::new();
    let mut max_aqi: Option<u16> = None;
    let mut min_aqi: Option<u16> = None;
    let mut measured = 0;

    for observation in &observations {
        if let Some(city) = non_blank(observation.city.as_deref()) {
            cities.insert(city);
        }
        if let Some(region) = non_blank(observation.region.as_deref()) {
            countries.insert(region);
        }
        *quality_distribution
            .entry(data_quality(observation, as_of))
            .or_insert(0) += 1;

        if observation.has_measurement() {
            measured += 1;
            *category_distribution
                .entry(observation.category())
                .or_insert(0) += 1;
            let aqi = observation.aqi();
            max_aqi = Some(max_aqi.map_or(aqi, |m| m.max(aqi)));
            min_aqi = Some(min_aqi.map_or(aqi, |m| m.min(aqi)));
        }
    }

    NetworkStats {
        total_stations: observations.len(),
        measured_stations: measured,
        total_cities: cities.len(),
        total_countries: countries.len(),
        average_aqi: average_aqi(observations.iter().copied()),
        max_aqi,
        min_aqi,
        category_distribution,
        quality_distribution,
    }
}

/// Buckets observations by region; missing or blank regions land under `"Unknown"`.
pub fn group_by_country(
    observations: &[StationObservation],
) -> BTreeMap<String, Vec<&StationObservation>> {
    group_by(observations, StationObservation::country_key)
}

/// Buckets observations by city; missing or blank cities land under `"Unknown"`.
pub fn group_by_city(
    observations: &[StationObservation],
) -> BTreeMap<String, Vec<&StationObservation>> {
    group_by(observations, StationObservation::city_key)
}

/// Per-country summaries, worst average first.
pub fn summarize_countries(observations: &[StationObservation]) -> Vec<GroupSummary> {
    summarize_groups(&group_by_country(observations))
}

/// Per-city summaries, worst average first.
pub fn summarize_cities(observations: &[StationObservation]) -> Vec<GroupSummary> {
    summarize_groups(&group_by_city(observations))
}

/// Rolls each group up into a `GroupSummary`, sorted by average AQI descending then key.
pub fn summarize_groups(
    groups: &BTreeMap<String, Vec<&StationObservation>>,
) -> Vec<GroupSummary> {
    let mut summaries: Vec<GroupSummary> = groups
        .iter()
        .map(|(key, members)| {
            let cities: BTreeSet<&str> = members
                .iter()
                .filter_map(|o| non_blank(o.city.as_deref()))
                .collect();
            GroupSummary {
                key: key.clone(),
                stations: members.len(),
                measured_stations: members.iter().filter(|o| o.has_measurement()).count(),
                cities: cities.len(),
                average_aqi: average_aqi(members.iter().copied()),
                worst_category: members
                    .iter()
                    .filter(|o| o.has_measurement())
                    .map(|o| o.category())
                    .max(),
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.average_aqi
            .total_cmp(&a.average_aqi)
            .then_with(|| a.key.cmp(&b.key))
    });
    summaries
}

fn group_by<'a>(
    observations: &'a [StationObservation],
    key: fn(&StationObservation) -> &str,
) -> BTreeMap<String, Vec<&'a StationObservation>> {
    let mut groups: BTreeMap<String, Vec<&StationObservation>> = BTreeMap::new();
    for observation in observations {
        groups
            .entry(key(observation).to_string())
            .or_default()
            .push(observation);
    }
    groups
}
