//! Provides the PostgreSQL observation archive using `sqlx`.
//!
//! Includes connection pooling, idempotent schema creation, batched insertion of
//! station observations and daily per-city AQI history. Integration tests require the
//! `integration-tests` feature and a reachable database.

use crate::analysis::round1;
use crate::error::{AppError, Result};
use crate::models::{CityAqiHistory, DbObservation, StationObservation};
use rayon::prelude::*; // Used for parallel row conversion
use sqlx::{postgres::PgPoolOptions, Pool, Postgres, Row};
use tracing::{debug, error, info};

/// Archive of station observations backed by a Postgres pool.
pub struct Database {
    pool: Pool<Postgres>,
}

impl Database {
    /// Connects to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the connection pool cannot be established.
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| {
                error!("Failed to connect to database: {}", e);
                AppError::Db(e.into())
            })?;

        info!("Connected to database successfully");
        Ok(Self { pool })
    }

    /// Creates the `observations` table and its indexes if they do not exist.
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema (if necessary)...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS observations (
                id SERIAL PRIMARY KEY,
                station_id TEXT NOT NULL,
                name TEXT NOT NULL,
                city TEXT,
                region TEXT,
                latitude DOUBLE PRECISION NOT NULL,
                longitude DOUBLE PRECISION NOT NULL,
                sources TEXT NOT NULL,
                pm25 NUMERIC,
                pm10 NUMERIC,
                no2 NUMERIC,
                so2 NUMERIC,
                o3 NUMERIC,
                co NUMERIC,
                aqi INTEGER NOT NULL,
                category TEXT NOT NULL,
                dominant_pollutant TEXT,
                observed_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (station_id, observed_at)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create observations table: {}", e);
            AppError::Db(e.into())
        })?;

        for (name, statement) in [
            (
                "city",
                "CREATE INDEX IF NOT EXISTS idx_observations_city ON observations(city)",
            ),
            (
                "region",
                "CREATE INDEX IF NOT EXISTS idx_observations_region ON observations(region)",
            ),
            (
                "observed_at",
                "CREATE INDEX IF NOT EXISTS idx_observations_observed_at ON observations(observed_at)",
            ),
        ] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    error!("Failed to create {} index: {}", name, e);
                    AppError::Db(e.into())
                })?;
        }

        info!("Database schema initialized successfully");
        Ok(())
    }

    /// Archives a batch of observations in one transaction.
    ///
    /// A station already archived at the same `observed_at` is skipped. Returns the
    /// number of rows actually written.
    pub async fn insert_observations(&self, observations: &[StationObservation]) -> Result<u64> {
        if observations.is_empty() {
            debug!("No observations provided for insertion.");
            return Ok(0);
        }

        info!(
            "Preparing to archive {} observations...",
            observations.len()
        );

        let rows: Vec<DbObservation> = observations.par_iter().map(DbObservation::from).collect();

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin database transaction: {}", e);
            AppError::Db(e.into())
        })?;

        let mut inserted = 0;
        for row in &rows {
            let result = sqlx::query(
                r#"
                INSERT INTO observations
                (station_id, name, city, region, latitude, longitude, sources,
                 pm25, pm10, no2, so2, o3, co, aqi, category, dominant_pollutant, observed_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                ON CONFLICT (station_id, observed_at) DO NOTHING
                "#,
            )
            .bind(&row.station_id)
            .bind(&row.name)
            .bind(&row.city)
            .bind(&row.region)
            .bind(row.latitude)
            .bind(row.longitude)
            .bind(&row.sources)
            .bind(row.pm25)
            .bind(row.pm10)
            .bind(row.no2)
            .bind(row.so2)
            .bind(row.o3)
            .bind(row.co)
            .bind(row.aqi)
            .bind(&row.category)
            .bind(&row.dominant_pollutant)
            .bind(row.observed_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to insert observation '{}': {}", row.station_id, e);
                AppError::Db(e.into())
            })?;
            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(|e| {
            error!("Failed to commit database transaction: {}", e);
            AppError::Db(e.into())
        })?;

        info!(
            "Archived {} of {} observations ({} already present)",
            inserted,
            rows.len(),
            rows.len() as u64 - inserted
        );
        Ok(inserted)
    }

    /// Daily average and maximum AQI for `city` over the last `days` days, oldest first.
    ///
    /// Only observations with at least one measured pollutant are counted. The city
    /// match is case-insensitive.
    pub async fn get_city_history(&self, city: &str, days: i32) -> Result<Vec<CityAqiHistory>> {
        if days <= 0 {
            return Err(AppError::InvalidInput(format!(
                "History window must be at least one day, got {}",
                days
            )));
        }
        info!("Fetching {}-day AQI history for city: {}", days, city);

        let query = r#"
            SELECT
                MIN(city) AS city,
                DATE_TRUNC('day', observed_at) AS day,
                AVG(aqi)::DOUBLE PRECISION AS average_aqi,
                MAX(aqi) AS max_aqi,
                COUNT(*) AS samples
            FROM observations
            WHERE LOWER(city) = LOWER($1)
              AND dominant_pollutant IS NOT NULL
              AND observed_at >= NOW() - make_interval(days => $2)
            GROUP BY DATE_TRUNC('day', observed_at)
            ORDER BY day ASC
        "#;

        let rows = sqlx::query_as::<_, CityAqiHistory>(query)
            .bind(city)
            .bind(days)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to fetch history for {}: {}", city, e);
                AppError::Db(e.into())
            })?;

        debug!("History for {} has {} days", city, rows.len());
        Ok(rows
            .into_iter()
            .map(|mut row| {
                row.average_aqi = round1(row.average_aqi);
                row
            })
            .collect())
    }

    /// Checks whether the `observations` table exists.
    pub async fn is_schema_initialized(&self) -> Result<bool> {
        debug!("Checking if database schema is initialized...");
        let query = "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_schema = 'public' AND table_name = 'observations')";
        let result = sqlx::query(query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to check schema existence: {}", e);
                AppError::Db(e.into())
            })?;
        let initialized = result.try_get::<bool, _>(0).unwrap_or(false);
        debug!("Schema initialized status: {}", initialized);
        Ok(initialized)
    }

    /// Checks whether anything has been archived yet.
    pub async fn has_archived_data(&self) -> Result<bool> {
        if !self.is_schema_initialized().await? {
            debug!("Schema not initialized, therefore nothing archived.");
            return Ok(false);
        }
        let result = sqlx::query("SELECT EXISTS (SELECT 1 FROM observations LIMIT 1)")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to check for archived data: {}", e);
                AppError::Db(e.into())
            })?;
        Ok(result.try_get::<bool, _>(0).unwrap_or(false))
    }
}

// Run with `cargo test --features integration-tests` against a reachable DATABASE_URL.
#[cfg(test)]
#[cfg(feature = "integration-tests")]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, Pollutant, PollutantReading};
    use chrono::{DateTime, Duration, Utc};
    use num_traits::FromPrimitive;
    use sqlx::types::Decimal;
    use sqlx::PgPool;

    fn observation(id: &str, city: &str, pm25: Option<f64>, observed_at: DateTime<Utc>) -> StationObservation {
        let reading = match pm25 {
            Some(value) => PollutantReading::default().with(Pollutant::Pm25, value),
            None => PollutantReading::default(),
        };
        StationObservation::new(id, format!("Station {}", id), GeoPoint::new(20.45, 44.79), reading, observed_at)
            .with_city(city)
            .with_region("RS")
            .with_source("mock")
    }

    #[sqlx::test]
    async fn test_init_schema(pool: PgPool) -> Result<()> {
        let db = Database { pool };
        assert!(!db.is_schema_initialized().await?);
        db.init_schema().await?;
        db.init_schema().await?;
        assert!(db.is_schema_initialized().await?);

        for index_name in [
            "idx_observations_city",
            "idx_observations_region",
            "idx_observations_observed_at",
        ] {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT FROM pg_indexes WHERE schemaname = 'public' AND indexname = $1)",
            )
            .bind(index_name)
            .fetch_one(&db.pool)
            .await?;
            assert!(exists, "Index {} should exist after init_schema", index_name);
        }
        Ok(())
    }

    #[sqlx::test]
    async fn test_insert_observations_skips_duplicates(pool: PgPool) -> Result<()> {
        let db = Database { pool };
        db.init_schema().await?;
        assert!(!db.has_archived_data().await?);

        let at = Utc::now() - Duration::hours(1);
        let batch = vec![
            observation("a", "Beograd", Some(10.5), at),
            observation("b", "Beograd", Some(40.0), at),
        ];
        assert_eq!(db.insert_observations(&batch).await?, 2);
        assert_eq!(db.insert_observations(&batch).await?, 0);
        assert_eq!(db.insert_observations(&[]).await?, 0);
        assert!(db.has_archived_data().await?);

        let row = sqlx::query_as::<_, DbObservation>(
            "SELECT id, station_id, name, city, region, latitude, longitude, sources, pm25, pm10, no2, so2, o3, co, aqi, category, dominant_pollutant, observed_at FROM observations WHERE station_id = 'a'",
        )
        .fetch_one(&db.pool)
        .await?;
        assert_eq!(row.pm25, Decimal::from_f64(10.5));
        assert_eq!(row.aqi, 44);
        assert_eq!(row.category, "good");
        assert_eq!(row.sources, "mock");
        Ok(())
    }

    #[sqlx::test]
    async fn test_city_history(pool: PgPool) -> Result<()> {
        let db = Database { pool };
        db.init_schema().await?;

        let now = Utc::now();
        let batch = vec![
            observation("a", "Sarajevo", Some(12.0), now - Duration::minutes(5)),
            observation("b", "Sarajevo", Some(55.5), now - Duration::minutes(6)),
            // Unmeasured rows do not count.
            observation("c", "Sarajevo", None, now - Duration::minutes(7)),
            observation("d", "Tuzla", Some(200.0), now - Duration::minutes(5)),
            observation("e", "Sarajevo", Some(80.0), now - Duration::days(30)),
        ];
        db.insert_observations(&batch).await?;

        let history = db.get_city_history("sarajevo", 7).await?;
        let samples: i64 = history.iter().map(|h| h.samples).sum();
        assert_eq!(samples, 2);
        assert!(history.iter().all(|h| h.city == "Sarajevo"));
        assert_eq!(history.iter().map(|h| h.max_aqi).max(), Some(151));

        assert!(db.get_city_history("Nowhere", 7).await?.is_empty());
        assert!(matches!(
            db.get_city_history("Sarajevo", 0).await,
            Err(AppError::InvalidInput(_))
        ));
        Ok(())
    }
}
