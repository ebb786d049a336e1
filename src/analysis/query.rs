//! Validation of caller-supplied ranking parameters.

use crate::cache::ranking_cache_key;
use crate::error::{AppError, Result};
use crate::models::RankingKind;
use std::str::FromStr;

pub const MIN_RANKING_LIMIT: i64 = 1;
pub const MAX_RANKING_LIMIT: i64 = 100;
pub const DEFAULT_RANKING_LIMIT: i64 = 10;

impl FromStr for RankingKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best" => Ok(RankingKind::Best),
            "worst" => Ok(RankingKind::Worst),
            "all" => Ok(RankingKind::All),
            other => Err(AppError::InvalidInput(format!(
                "Unknown ranking type '{}'. Must be one of: best, worst, all",
                other
            ))),
        }
    }
}

/// A validated ranking request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingQuery {
    pub kind: RankingKind,
    pub limit: usize,
    /// Bypass the cache and recompute.
    pub fresh: bool,
}

impl RankingQuery {
    /// Rejects unknown kinds and limits outside `1..=100` before any work is done.
    pub fn new(kind: &str, limit: i64, fresh: bool) -> Result<Self> {
        let kind = kind.parse::<RankingKind>()?;
        if !(MIN_RANKING_LIMIT..=MAX_RANKING_LIMIT).contains(&limit) {
            return Err(AppError::InvalidInput(format!(
                "Ranking limit {} is out of range. Must be between {} and {}",
                limit, MIN_RANKING_LIMIT, MAX_RANKING_LIMIT
            )));
        }
        Ok(Self {
            kind,
            limit: limit as usize,
            fresh,
        })
    }

    pub fn cache_key(&self) -> String {
        ranking_cache_key(self.kind, self.limit)
    }
}
