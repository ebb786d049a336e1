//! Fetch, aggregate, rank, cache.

use super::aggregate::{aggregate, merge_colocated};
use super::query::RankingQuery;
use super::ranking::rank;
use super::stats::compute_stats;
use crate::api::{fetch_all_readings, ReadingSource};
use crate::cache::{Clock, RankingCache};
use crate::models::{RankingReport, StationObservation};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-source bound used unless overridden.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(8);

/// Owns the configured sources and the ranking cache.
pub struct RankingPipeline {
    sources: Vec<Arc<dyn ReadingSource>>,
    cache: RankingCache,
    clock: Arc<dyn Clock>,
    source_timeout: Duration,
    merge_radius_m: Option<f64>,
}

impl RankingPipeline {
    /// The cache and the data-quality age share `clock`.
    pub fn with_clock(
        sources: Vec<Arc<dyn ReadingSource>>,
        cache_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sources,
            cache: RankingCache::with_clock(cache_ttl, Arc::clone(&clock)),
            clock,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
            merge_radius_m: None,
        }
    }

    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    /// Enables co-located merging within `radius_m` metres.
    pub fn with_merge_radius(mut self, radius_m: Option<f64>) -> Self {
        self.merge_radius_m = radius_m;
        self
    }

    pub fn cache(&self) -> &RankingCache {
        &self.cache
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Current observations from every source. Empty when no source answered.
    pub async fn snapshot(&self) -> Vec<StationObservation> {
        let batches = fetch_all_readings(&self.sources, self.source_timeout).await;
        let observations = aggregate(batches);
        match self.merge_radius_m {
            Some(radius) => {
                let before = observations.len();
                let merged = merge_colocated(observations, radius);
                debug!(
                    "Merged {} observations into {} within {} m",
                    before,
                    merged.len(),
                    radius
                );
                merged
            },
            None => observations,
        }
    }

    /// Returns the cached report for `query` when one is fresh, otherwise recomputes.
    ///
    /// Empty reports are returned but never cached.
    pub async fn rankings(&self, query: &RankingQuery) -> RankingReport {
        let key = query.cache_key();
        if !query.fresh {
            if let Some(report) = self.cache.get(&key) {
                info!("Serving '{}' from cache", key);
                return report;
            }
        }

        let observations = self.snapshot().await;
        let report = self.build_report(query, &observations);
        if report.is_empty() {
            warn!("No air quality data currently available; '{}' not cached", key);
        } else {
            self.cache.set(key, report.clone());
        }
        report
    }

    /// Ranks `observations` for `query` and attaches the stats of the whole pass.
    pub fn build_report(
        &self,
        query: &RankingQuery,
        observations: &[StationObservation],
    ) -> RankingReport {
        let as_of = self.clock.now();
        RankingReport {
            kind: query.kind,
            limit: query.limit,
            generated_at: as_of,
            entries: rank(query.kind, observations, query.limit, as_of),
            stats: compute_stats(observations, as_of),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::error::{AppError, Result};
    use crate::models::{NormalizedReading, Pollutant, PollutantReading, RankingKind};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 1, 12, 0, 0).unwrap()
    }

    fn reading(id: &str, pm25: f64, longitude: f64) -> NormalizedReading {
        NormalizedReading {
            id: id.to_string(),
            name: id.to_uppercase(),
            city: Some("Sarajevo".to_string()),
            region: Some("BA".to_string()),
            longitude: Some(longitude),
            latitude: Some(43.85),
            source: "counting".to_string(),
            pollutants: PollutantReading::default().with(Pollutant::Pm25, pm25),
            observed_at: start(),
            last_updated: None,
        }
    }

    /// Returns a fixed batch and counts how often it was asked.
    struct CountingSource {
        calls: AtomicUsize,
        readings: Vec<NormalizedReading>,
    }

    impl CountingSource {
        fn new(readings: Vec<NormalizedReading>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                readings,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReadingSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        async fn fetch_readings(&self) -> Result<Vec<NormalizedReading>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.readings.clone())
        }
    }

    struct DownSource;

    #[async_trait]
    impl ReadingSource for DownSource {
        fn name(&self) -> &str {
            "down"
        }

        async fn fetch_readings(&self) -> Result<Vec<NormalizedReading>> {
            Err(AppError::upstream("down", "connection refused"))
        }
    }

    fn pipeline(source: Arc<CountingSource>, clock: Arc<ManualClock>) -> RankingPipeline {
        let sources: Vec<Arc<dyn ReadingSource>> = vec![source as Arc<dyn ReadingSource>];
        RankingPipeline::with_clock(sources, Duration::from_secs(300), clock)
    }

    fn sample() -> Vec<NormalizedReading> {
        vec![
            reading("b", 55.5, 18.40),
            reading("a", 8.0, 18.41),
            reading("c", 150.0, 18.42),
        ]
    }

    #[tokio::test]
    async fn test_rankings_are_cached_until_ttl() {
        let clock = Arc::new(ManualClock::new(start()));
        let source = CountingSource::new(sample());
        let pipeline = pipeline(Arc::clone(&source), Arc::clone(&clock));
        let query = RankingQuery::new("worst", 2, false).unwrap();

        let first = pipeline.rankings(&query).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(first.kind, RankingKind::Worst);
        let ids: Vec<&str> = first.entries.iter().map(|e| e.observation.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert_eq!(first.stats.total_stations, 3);

        clock.advance(chrono::Duration::seconds(300));
        let second = pipeline.rankings(&query).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(second.generated_at, first.generated_at);

        clock.advance(chrono::Duration::seconds(1));
        let third = pipeline.rankings(&query).await;
        assert_eq!(source.calls(), 2);
        assert!(third.generated_at > first.generated_at);
    }

    #[tokio::test]
    async fn test_fresh_bypasses_cache_and_refreshes_it() {
        let clock = Arc::new(ManualClock::new(start()));
        let source = CountingSource::new(sample());
        let pipeline = pipeline(Arc::clone(&source), Arc::clone(&clock));

        pipeline.rankings(&RankingQuery::new("best", 3, false).unwrap()).await;
        clock.advance(chrono::Duration::seconds(10));
        let fresh = pipeline.rankings(&RankingQuery::new("best", 3, true).unwrap()).await;
        assert_eq!(source.calls(), 2);
        assert_eq!(fresh.generated_at, start() + chrono::Duration::seconds(10));

        let cached = pipeline.rankings(&RankingQuery::new("best", 3, false).unwrap()).await;
        assert_eq!(source.calls(), 2);
        assert_eq!(cached.generated_at, fresh.generated_at);
    }

    #[tokio::test]
    async fn test_distinct_queries_use_distinct_keys() {
        let clock = Arc::new(ManualClock::new(start()));
        let source = CountingSource::new(sample());
        let pipeline = pipeline(Arc::clone(&source), clock);

        let all = pipeline.rankings(&RankingQuery::new("all", 2, false).unwrap()).await;
        pipeline.rankings(&RankingQuery::new("all", 3, false).unwrap()).await;
        assert_eq!(source.calls(), 2);
        assert_eq!(pipeline.cache().len(), 2);

        let ids: Vec<&str> = all.entries.iter().map(|e| e.observation.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        // Stats cover the whole pass, not the truncated ranking.
        assert_eq!(all.stats.total_stations, 3);
    }

    #[tokio::test]
    async fn test_empty_report_is_not_cached() {
        let clock = Arc::new(ManualClock::new(start()));
        let sources: Vec<Arc<dyn ReadingSource>> = vec![Arc::new(DownSource)];
        let pipeline = RankingPipeline::with_clock(sources, Duration::from_secs(300), clock);
        let report = pipeline.rankings(&RankingQuery::new("worst", 10, false).unwrap()).await;
        assert!(report.is_empty());
        assert_eq!(report.stats.total_stations, 0);
        assert_eq!(report.stats.average_aqi, 0.0);
        assert!(pipeline.cache().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_merges_when_radius_set() {
        let clock = Arc::new(ManualClock::new(start()));
        let source = CountingSource::new(vec![
            reading("x-2", 10.0, 18.4000),
            reading("x-1", 20.0, 18.4001),
        ]);
        let separate = pipeline(Arc::clone(&source), Arc::clone(&clock));
        assert_eq!(separate.snapshot().await.len(), 2);

        let merged = pipeline(source, clock).with_merge_radius(Some(50.0));
        let observations = merged.snapshot().await;
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].id, "x-1");
        assert_eq!(observations[0].reading().pm25, Some(15.0));
    }
}
