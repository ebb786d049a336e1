//! Environment-driven configuration.
//!
//! `.env` is loaded through `dotenv`, then every setting is read from the process
//! environment. Empty values count as unset.

use crate::cache::DEFAULT_TTL;
use crate::error::{AppError, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Countries queried when `OPENAQ_COUNTRIES` is not set.
pub const DEFAULT_COUNTRIES: [&str; 11] = [
    "RS", // Serbia
    "BA", // Bosnia and Herzegovina
    "ME", // Montenegro
    "MK", // North Macedonia
    "HR", // Croatia
    "SI", // Slovenia
    "AL", // Albania
    "XK", // Kosovo
    "BG", // Bulgaria
    "GR", // Greece
    "RO", // Romania
];

pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 8;
const MAX_SOURCE_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Enables the OpenAQ source when present.
    pub openaq_key: Option<String>,
    pub countries: Vec<String>,
    pub use_mock_source: bool,
    /// Per-source fetch bound.
    pub source_timeout: Duration,
    /// Ranking cache freshness window.
    pub cache_ttl: Duration,
    /// Enables co-located merging when set.
    pub merge_radius_m: Option<f64>,
    /// Enables the Postgres archive when set.
    pub database_url: Option<String>,
    /// Adds a daily-rolling JSON log file when set.
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openaq_key: None,
            countries: DEFAULT_COUNTRIES.iter().map(|c| c.to_string()).collect(),
            use_mock_source: true,
            source_timeout: Duration::from_secs(DEFAULT_SOURCE_TIMEOUT_SECS),
            cache_ttl: DEFAULT_TTL,
            merge_radius_m: None,
            database_url: None,
            log_dir: None,
        }
    }
}

impl Config {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Config::default();

        let openaq_key = get("OPENAQ_KEY");

        let countries = match get("OPENAQ_COUNTRIES") {
            Some(list) => {
                let parsed: Vec<String> = list
                    .split(',')
                    .map(|c| c.trim().to_uppercase())
                    .filter(|c| !c.is_empty())
                    .collect();
                if parsed.iter().any(|c| c.len() != 2 || !c.chars().all(|ch| ch.is_ascii_alphabetic())) {
                    return Err(AppError::Config(format!(
                        "OPENAQ_COUNTRIES must be comma separated ISO alpha-2 codes, got '{}'",
                        list
                    )));
                }
                parsed
            },
            None => defaults.countries,
        };

        let use_mock_source = match get("USE_MOCK_SOURCE") {
            Some(value) => parse_bool("USE_MOCK_SOURCE", &value)?,
            None => openaq_key.is_none(),
        };

        let timeout_secs = parse_or("SOURCE_TIMEOUT_SECS", get("SOURCE_TIMEOUT_SECS"), DEFAULT_SOURCE_TIMEOUT_SECS)?;
        if !(1..=MAX_SOURCE_TIMEOUT_SECS).contains(&timeout_secs) {
            return Err(AppError::Config(format!(
                "SOURCE_TIMEOUT_SECS must be between 1 and {}, got {}",
                MAX_SOURCE_TIMEOUT_SECS, timeout_secs
            )));
        }

        let ttl_secs = parse_or("CACHE_TTL_SECS", get("CACHE_TTL_SECS"), defaults.cache_ttl.as_secs())?;
        if ttl_secs == 0 {
            return Err(AppError::Config("CACHE_TTL_SECS must be greater than 0".to_string()));
        }

        let merge_radius_m = match get("MERGE_RADIUS_METERS") {
            Some(value) => {
                let radius: f64 = parse("MERGE_RADIUS_METERS", &value)?;
                if !radius.is_finite() || radius < 0.0 {
                    return Err(AppError::Config(format!(
                        "MERGE_RADIUS_METERS must be a non-negative number, got {}",
                        value
                    )));
                }
                Some(radius)
            },
            None => None,
        };

        Ok(Self {
            openaq_key,
            countries,
            use_mock_source,
            source_timeout: Duration::from_secs(timeout_secs),
            cache_ttl: Duration::from_secs(ttl_secs),
            merge_radius_m,
            database_url: get("DATABASE_URL"),
            log_dir: get("LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| AppError::Config(format!("{} has an invalid value: '{}'", key, value)))
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(v) => parse(key, &v),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.use_mock_source);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.countries.len(), DEFAULT_COUNTRIES.len());
    }

    #[test]
    fn test_key_disables_mock_by_default() {
        let config = Config::from_lookup(lookup(&[("OPENAQ_KEY", "abc")])).unwrap();
        assert_eq!(config.openaq_key.as_deref(), Some("abc"));
        assert!(!config.use_mock_source);

        let config = Config::from_lookup(lookup(&[("OPENAQ_KEY", "abc"), ("USE_MOCK_SOURCE", "yes")])).unwrap();
        assert!(config.use_mock_source);
    }

    #[test]
    fn test_parses_all_values() {
        let config = Config::from_lookup(lookup(&[
            ("OPENAQ_COUNTRIES", "rs, ba ,mk"),
            ("SOURCE_TIMEOUT_SECS", "5"),
            ("CACHE_TTL_SECS", "120"),
            ("MERGE_RADIUS_METERS", "150.5"),
            ("DATABASE_URL", "postgres://localhost/air"),
            ("LOG_DIR", "/tmp/logs"),
            ("USE_MOCK_SOURCE", "0"),
        ]))
        .unwrap();
        assert_eq!(config.countries, vec!["RS", "BA", "MK"]);
        assert_eq!(config.source_timeout, Duration::from_secs(5));
        assert_eq!(config.cache_ttl, Duration::from_secs(120));
        assert_eq!(config.merge_radius_m, Some(150.5));
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/air"));
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/logs")));
        assert!(!config.use_mock_source);
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "  "), ("OPENAQ_KEY", "")])).unwrap();
        assert!(config.database_url.is_none());
        assert!(config.openaq_key.is_none());
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for pairs in [
            vec![("SOURCE_TIMEOUT_SECS", "0")],
            vec![("SOURCE_TIMEOUT_SECS", "soon")],
            vec![("CACHE_TTL_SECS", "0")],
            vec![("MERGE_RADIUS_METERS", "-1")],
            vec![("USE_MOCK_SOURCE", "maybe")],
            vec![("OPENAQ_COUNTRIES", "Serbia")],
        ] {
            match Config::from_lookup(lookup(&pairs)) {
                Err(AppError::Config(_)) => {},
                other => panic!("Expected Config error for {:?}, got {:?}", pairs, other),
            }
        }
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        env::set_var("CACHE_TTL_SECS", "42");
        env::set_var("OPENAQ_COUNTRIES", "SI");
        let config = Config::from_env();
        env::remove_var("CACHE_TTL_SECS");
        env::remove_var("OPENAQ_COUNTRIES");

        let config = config.unwrap();
        assert_eq!(config.cache_ttl, Duration::from_secs(42));
        assert_eq!(config.countries, vec!["SI"]);
    }
}
