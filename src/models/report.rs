//! Output structures produced by the ranking and statistics engine and the archive.

use super::reading::{AqiCategory, DataQuality, StationObservation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A ranked station: its position, the observation itself and a data-quality tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    /// 1-based position within the ranking.
    pub rank: usize,
    #[serde(flatten)]
    pub observation: StationObservation,
    pub quality: DataQuality,
}

/// Which ordering a ranking request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingKind {
    Best,
    Worst,
    All,
}

impl RankingKind {
    pub fn key(self) -> &'static str {
        match self {
            RankingKind::Best => "best",
            RankingKind::Worst => "worst",
            RankingKind::All => "all",
        }
    }
}

impl fmt::Display for RankingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Summary statistics over a set of observations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkStats {
    pub total_stations: usize,
    /// Stations with at least one usable pollutant value.
    pub measured_stations: usize,
    pub total_cities: usize,
    pub total_countries: usize,
    /// Mean AQI over measured stations, one decimal, 0.0 when there are none.
    pub average_aqi: f64,
    pub max_aqi: Option<u16>,
    pub min_aqi: Option<u16>,
    pub category_distribution: BTreeMap<AqiCategory, usize>,
    pub quality_distribution: BTreeMap<DataQuality, usize>,
}

/// Per-country or per-city roll-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: String,
    pub stations: usize,
    pub measured_stations: usize,
    pub cities: usize,
    pub average_aqi: f64,
    pub worst_category: Option<AqiCategory>,
}

/// The cached unit of work: a ranking plus the stats of the pass that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct RankingReport {
    pub kind: RankingKind,
    pub limit: usize,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<RankingEntry>,
    pub stats: NetworkStats,
}

impl RankingReport {
    /// True when the aggregation pass produced nothing (no data available now).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One day of archived AQI for a city.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CityAqiHistory {
    pub city: String,
    pub day: DateTime<Utc>,
    pub average_aqi: f64,
    pub max_aqi: i32,
    pub samples: i64,
}
