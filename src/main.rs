use balkan_air::cli::{self, App, Cli, Commands};
use balkan_air::config::Config;
use balkan_air::error::Result;
use clap::Parser;
use colored::*;
use dialoguer::{theme::ColorfulTheme, Select};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Stderr logging filtered by `RUST_LOG` (default `warn`), plus a daily JSON file in
/// `log_dir` when configured. The returned guard must outlive every log call.
fn init_logging(config: &Config) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")));

    let (json_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "balkan-air.log");
            let (writer, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(writer)
                .with_filter(EnvFilter::new("info"));
            (Some(layer), Some(guard))
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Invalid configuration:".red(), e);
            return Err(e);
        },
    };
    let _log_guard = init_logging(&config);

    info!("Initializing Balkan air quality app...");

    let app = match App::new(config).await {
        Ok(app) => {
            info!("Application initialized successfully.");
            app
        },
        Err(e) => {
            error!("Failed to initialize application: {:?}", e);
            println!(
                "{}",
                "Error: Failed to initialize application. Check logs.".red()
            );
            return Err(e);
        },
    };

    if let Some(command) = args.command {
        return app.run_command(command).await;
    }

    println!(
        "{}",
        "Welcome to the Balkan Air Quality CLI!".cyan().bold()
    );

    loop {
        let options = &[
            "Station Rankings",
            "Network Statistics",
            "Country Summaries",
            "City Summaries",
            "Calculate an AQI",
            "Initialize Archive Schema",
            "Archive Current Snapshot",
            "City History",
            "Exit",
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("What would you like to do?")
            .items(options)
            .default(0)
            .interact_opt()?
            .unwrap_or(options.len() - 1);

        println!("\n---\n");

        let command = match selection {
            0 => cli::prompt_rankings().map(Commands::Rankings),
            1 => Ok(Commands::Stats { json: false }),
            2 => Ok(Commands::Countries),
            3 => cli::prompt_country(&app.config().countries)
                .map(|country| Commands::Cities { country }),
            4 => cli::prompt_concentrations().map(Commands::Aqi),
            5 => Ok(Commands::InitDb),
            6 => Ok(Commands::Archive),
            7 => cli::prompt_history().map(Commands::History),
            _ => {
                println!("{}", "Exiting application. Goodbye!".green());
                break;
            },
        };

        let command_result = match command {
            Ok(command) => app.run_command(command).await,
            Err(e) => {
                println!("{} {}", "Failed to get input:".red(), e);
                continue;
            },
        };

        if let Err(e) = command_result {
            error!("Command execution failed: {:?}", e);
            println!(
                "{} {}",
                "Error executing command:".red(),
                e.to_string().red()
            );
        }

        println!("\n---\n");
    }

    Ok(())
}
