//! The seam between provider adapters and the aggregation core.

use crate::error::{AppError, Result};
use crate::models::NormalizedReading;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// A provider of normalised readings (OpenAQ, the mock generator, ...).
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Short identifier, also used as the `source` of every reading produced.
    fn name(&self) -> &str;

    /// Fetches the provider's current readings.
    async fn fetch_readings(&self) -> Result<Vec<NormalizedReading>>;
}

/// Queries every source concurrently, each bounded by `timeout`, and returns one batch
/// per source that answered.
///
/// A failing or slow source is logged and contributes nothing; the others are
/// unaffected. When every source fails the result is empty, which callers treat as
/// "no data available now".
pub async fn fetch_all_readings(
    sources: &[Arc<dyn ReadingSource>],
    timeout: Duration,
) -> Vec<Vec<NormalizedReading>> {
    if sources.is_empty() {
        warn!("No reading sources configured");
        return Vec::new();
    }

    let fetches = sources.iter().map(|source| async move {
        let name = source.name().to_string();
        let outcome = match tokio::time::timeout(timeout, source.fetch_readings()).await {
            Ok(Ok(readings)) => Ok(readings),
            Ok(Err(e)) => Err(AppError::upstream(&name, e.to_string())),
            Err(_) => Err(AppError::upstream(
                &name,
                format!("timed out after {:?}", timeout),
            )),
        };
        (name, outcome)
    });

    let mut batches = Vec::with_capacity(sources.len());
    let mut failures = 0;
    for (name, outcome) in join_all(fetches).await {
        match outcome {
            Ok(readings) => {
                info!("Source '{}' returned {} readings", name, readings.len());
                batches.push(readings);
            },
            Err(e) => {
                failures += 1;
                warn!("{}", e);
            },
        }
    }

    if failures == sources.len() {
        error!(
            "All {} reading sources failed; no data is available",
            failures
        );
    }
    batches
}
