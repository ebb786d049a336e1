//! Deterministic best/worst/all rankings and the data-quality tag.

use crate::models::{DataQuality, RankingEntry, RankingKind, StationObservation};
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;

/// Observations younger than this count as fresh for data-quality purposes.
pub const FRESHNESS_WINDOW_MINUTES: i64 = 60;

/// Pollutant count at or above which a fresh observation is "excellent".
pub const EXCELLENT_MIN_POLLUTANTS: usize = 4;

/// Tags an observation by how many pollutants it carries and how old it is at `as_of`.
///
/// - poor: no usable pollutant data (AQI zero)
/// - excellent: ≥4 pollutants and fresh
/// - good: ≥2 pollutants, or ≥1 and fresh
/// - fair: a single stale pollutant
pub fn data_quality(observation: &StationObservation, as_of: DateTime<Utc>) -> DataQuality {
    let pollutants = observation.reading().reported_count();
    if pollutants == 0 || observation.aqi() == 0 {
        return DataQuality::Poor;
    }

    let age = as_of.signed_duration_since(observation.observed_at);
    let fresh = age < Duration::minutes(FRESHNESS_WINDOW_MINUTES);

    match (pollutants, fresh) {
        (n, true) if n >= EXCELLENT_MIN_POLLUTANTS => DataQuality::Excellent,
        (n, _) if n >= 2 => DataQuality::Good,
        (_, true) => DataQuality::Good,
        _ => DataQuality::Fair,
    }
}

/// Worst first: AQI descending, ties by id ascending, at most `limit` entries.
pub fn rank_worst(
    observations: &[StationObservation],
    limit: usize,
    as_of: DateTime<Utc>,
) -> Vec<RankingEntry> {
    ranked(observations, Direction::Descending, Some(limit), as_of)
}

/// Best first: AQI ascending, ties by id ascending, at most `limit` entries.
pub fn rank_best(
    observations: &[StationObservation],
    limit: usize,
    as_of: DateTime<Utc>,
) -> Vec<RankingEntry> {
    ranked(observations, Direction::Ascending, Some(limit), as_of)
}

/// Every observation, best to worst. Truncation is left to the caller.
pub fn rank_all(observations: &[StationObservation], as_of: DateTime<Utc>) -> Vec<RankingEntry> {
    ranked(observations, Direction::Ascending, None, as_of)
}

/// Dispatches on `kind`; `All` is truncated to `limit` here.
pub fn rank(
    kind: RankingKind,
    observations: &[StationObservation],
    limit: usize,
    as_of: DateTime<Utc>,
) -> Vec<RankingEntry> {
    match kind {
        RankingKind::Best => rank_best(observations, limit, as_of),
        RankingKind::Worst => rank_worst(observations, limit, as_of),
        RankingKind::All => {
            let mut entries = rank_all(observations, as_of);
            entries.truncate(limit);
            entries
        },
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Ascending,
    Descending,
}

fn ranked(
    observations: &[StationObservation],
    direction: Direction,
    limit: Option<usize>,
    as_of: DateTime<Utc>,
) -> Vec<RankingEntry> {
    let mut sorted: Vec<&StationObservation> = observations.iter().collect();
    sorted.sort_by(|a, b| compare(a, b, direction));

    sorted
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .enumerate()
        .map(|(i, observation)| RankingEntry {
            rank: i + 1,
            quality: data_quality(observation, as_of),
            observation: observation.clone(),
        })
        .collect()
}

fn compare(a: &StationObservation, b: &StationObservation, direction: Direction) -> Ordering {
    let by_aqi = match direction {
        Direction::Ascending => a.aqi().cmp(&b.aqi()),
        Direction::Descending => b.aqi().cmp(&a.aqi()),
    };
    by_aqi.then_with(|| a.id.cmp(&b.id))
}
