//! Tally CLI - Forecasting and anomaly detection for small-business ledgers
//!
//! Usage:
//!   tally init                              Initialize database
//!   tally import --file ledger.json         Import ledger records
//!   tally forecast --user acme              Forecast the next months
//!   tally anomalies --user acme -s high     Run anomaly detection
//!   tally serve --port 3000                 Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Import { file, user, client } => {
            commands::cmd_import(&cli.db, &file, user.as_deref(), client.as_deref()).map(|_| ())
        }
        Commands::Monthly { tenant, months } => {
            let service = commands::open_service(&cli.db, config)?;
            commands::cmd_monthly(&service, &tenant, months)
        }
        Commands::Forecast {
            tenant,
            time_range,
            periods,
        } => {
            let service = commands::open_service(&cli.db, config)?;
            commands::cmd_forecast(&service, &tenant, &time_range, periods)
        }
        Commands::Anomalies {
            tenant,
            period,
            sensitivity,
        } => {
            let service = commands::open_service(&cli.db, config)?;
            commands::cmd_anomalies(&service, &tenant, &period, &sensitivity)
        }
        Commands::Serve {
            port,
            host,
            allowed_origins,
        } => commands::cmd_serve(&cli.db, config, &host, port, allowed_origins).await,
    }
}
