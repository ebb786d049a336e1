use super::display::{
    render_aqi, render_groups, render_history, render_rankings, render_stats, NO_DATA_MESSAGE,
};
use crate::analysis::{
    compute_stats, rank_all, summarize_cities, summarize_countries, RankingPipeline, RankingQuery,
    DEFAULT_RANKING_LIMIT,
};
use crate::api::{openaq_sources, MockSource, ReadingSource};
use crate::aqi::{compute_aqi, sub_indices};
use crate::cache::{Clock, SystemClock};
use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{Pollutant, PollutantReading, StationObservation};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Air quality rankings and statistics for Balkan monitoring stations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Runs the interactive menu when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Rank stations by AQI
    Rankings(RankingsArgs),

    /// Network-wide statistics for the current snapshot
    Stats {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Per-country summaries, worst average first
    Countries,

    /// Per-city summaries, worst average first
    Cities {
        /// Restrict to one ISO country code
        #[arg(short, long)]
        country: Option<String>,
    },

    /// Compute an AQI from raw concentrations
    Aqi(AqiArgs),

    /// Initialize the archive schema
    InitDb,

    /// Archive the current snapshot
    Archive,

    /// Daily AQI history of a city from the archive
    History(HistoryArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct RankingsArgs {
    /// best, worst or all
    #[arg(short, long, default_value = "worst")]
    pub kind: String,

    /// Number of stations (1-100)
    #[arg(short, long, default_value_t = DEFAULT_RANKING_LIMIT, allow_negative_numbers = true)]
    pub limit: i64,

    /// Bypass the cache
    #[arg(long)]
    pub fresh: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Concentrations in µg/m³ (CO in mg/m³).
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct AqiArgs {
    #[arg(long)]
    pub pm25: Option<f64>,
    #[arg(long)]
    pub pm10: Option<f64>,
    #[arg(long)]
    pub no2: Option<f64>,
    #[arg(long)]
    pub so2: Option<f64>,
    #[arg(long)]
    pub o3: Option<f64>,
    #[arg(long)]
    pub co: Option<f64>,
}

impl AqiArgs {
    pub fn set(&mut self, pollutant: Pollutant, value: Option<f64>) {
        let slot = match pollutant {
            Pollutant::Pm25 => &mut self.pm25,
            Pollutant::Pm10 => &mut self.pm10,
            Pollutant::No2 => &mut self.no2,
            Pollutant::So2 => &mut self.so2,
            Pollutant::O3 => &mut self.o3,
            Pollutant::Co => &mut self.co,
        };
        *slot = value;
    }

    pub fn to_reading(&self) -> PollutantReading {
        PollutantReading {
            pm25: self.pm25,
            pm10: self.pm10,
            no2: self.no2,
            so2: self.so2,
            o3: self.o3,
            co: self.co,
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct HistoryArgs {
    #[arg(short, long)]
    pub city: String,

    /// Number of days to look back
    #[arg(short, long, default_value_t = 7)]
    pub days: i32,
}

/// Builds the reading sources enabled by `config`.
pub fn sources_from_config(config: &Config) -> Vec<Arc<dyn ReadingSource>> {
    let mut sources: Vec<Arc<dyn ReadingSource>> = Vec::new();
    if let Some(key) = &config.openaq_key {
        sources.extend(openaq_sources(key, &config.countries));
    }
    if config.use_mock_source {
        sources.push(Arc::new(MockSource::new(config.countries.clone())));
    }
    if sources.is_empty() {
        warn!("No reading source enabled; set OPENAQ_KEY or USE_MOCK_SOURCE=true");
    }
    sources
}

/// CLI application state.
pub struct App {
    config: Config,
    pipeline: RankingPipeline,
    clock: Arc<dyn Clock>,
    db: Option<Database>,
}

impl App {
    /// Builds the pipeline from `config` and connects to the archive when configured.
    pub async fn new(config: Config) -> Result<Self> {
        let db = match &config.database_url {
            Some(url) => Some(Database::new(url).await?),
            None => None,
        };
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let pipeline = RankingPipeline::with_clock(
            sources_from_config(&config),
            config.cache_ttl,
            Arc::clone(&clock),
        )
        .with_source_timeout(config.source_timeout)
        .with_merge_radius(config.merge_radius_m);

        info!(
            "Sources: {:?}, cache TTL {:?}, archive {}",
            pipeline.source_names(),
            config.cache_ttl,
            if db.is_some() { "enabled" } else { "disabled" }
        );
        Ok(Self {
            config,
            pipeline,
            clock,
            db,
        })
    }

    /// Application without an archive around an existing pipeline.
    pub fn with_pipeline(config: Config, pipeline: RankingPipeline, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            pipeline,
            clock,
            db: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one command and prints its output.
    pub async fn run_command(&self, command: Commands) -> Result<()> {
        let output = self.execute(command).await?;
        println!("{}", output);
        Ok(())
    }

    /// Runs one command and returns what would be printed.
    pub async fn execute(&self, command: Commands) -> Result<String> {
        match command {
            Commands::Rankings(args) => {
                let query = RankingQuery::new(&args.kind, args.limit, args.fresh)?;
                let report = with_spinner("Fetching readings...", self.pipeline.rankings(&query)).await?;
                if args.json {
                    Ok(serde_json::to_string_pretty(&report)?)
                } else {
                    Ok(render_rankings(&report))
                }
            },
            Commands::Stats { json } => {
                let observations = self.snapshot().await?;
                // Stats are computed over the full ranking of the pass.
                let as_of = self.clock.now();
                let ranked = rank_all(&observations, as_of);
                let stats = compute_stats(ranked.iter().map(|e| &e.observation), as_of);
                if json {
                    Ok(serde_json::to_string_pretty(&stats)?)
                } else {
                    Ok(render_stats(&stats))
                }
            },
            Commands::Countries => {
                let observations = self.snapshot().await?;
                Ok(render_groups("Country", &summarize_countries(&observations)))
            },
            Commands::Cities { country } => {
                let mut observations = self.snapshot().await?;
                if let Some(country) = country {
                    let country = country.trim().to_uppercase();
                    observations.retain(|o| o.country_key() == country);
                }
                Ok(render_groups("City", &summarize_cities(&observations)))
            },
            Commands::Aqi(args) => {
                let reading = args.to_reading();
                Ok(render_aqi(&reading, &sub_indices(&reading), &compute_aqi(&reading)))
            },
            Commands::InitDb => {
                self.database()?.init_schema().await?;
                Ok("Archive schema initialized".to_string())
            },
            Commands::Archive => {
                let db = self.database()?;
                db.init_schema().await?;
                let observations = self.snapshot().await?;
                if observations.is_empty() {
                    return Ok(NO_DATA_MESSAGE.to_string());
                }
                let inserted = db.insert_observations(&observations).await?;
                Ok(format!(
                    "Archived {} new observations ({} fetched)",
                    inserted,
                    observations.len()
                ))
            },
            Commands::History(args) => {
                let db = self.database()?;
                if !db.has_archived_data().await? {
                    return Ok(format!(
                        "{}. Run `archive` first to collect observations.",
                        NO_DATA_MESSAGE
                    ));
                }
                let rows = db.get_city_history(&args.city, args.days).await?;
                Ok(render_history(&rows))
            },
        }
    }

    async fn snapshot(&self) -> Result<Vec<StationObservation>> {
        with_spinner("Fetching readings...", self.pipeline.snapshot()).await
    }

    fn database(&self) -> Result<&Database> {
        self.db.as_ref().ok_or_else(|| {
            AppError::Cli("No archive configured. Set DATABASE_URL to enable it.".to_string())
        })
    }
}

/// Drives `future` while a spinner with `message` ticks on stderr.
async fn with_spinner<F, T>(message: &str, future: F) -> Result<T>
where
    F: Future<Output = T>,
{
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    let output = future.await;
    spinner.finish_and_clear();
    Ok(output)
}
