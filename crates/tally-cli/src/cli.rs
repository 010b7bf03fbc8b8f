//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Tally - Forecasting and anomaly detection for small-business ledgers
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Auto-CFO analytics: forecasts, seasonality and anomaly detection", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Analytics config file (TOML)
    ///
    /// Defaults to ~/.local/share/tally/config/analytics.toml when present,
    /// otherwise the built-in thresholds are used.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Whose ledger a report reads
#[derive(Args, Debug, Clone)]
pub struct TenantArgs {
    /// Tenant (user) id
    #[arg(short, long)]
    pub user: String,

    /// Restrict to one client of the tenant
    #[arg(short, long)]
    pub client: Option<String>,

    /// Report date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub as_of: Option<String>,

    /// Print the raw JSON report
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Import ledger records from a JSON array
    Import {
        /// JSON file to import
        #[arg(short, long)]
        file: PathBuf,

        /// User id for records that do not carry one
        #[arg(short, long)]
        user: Option<String>,

        /// Client id for records that do not carry one
        #[arg(short, long)]
        client: Option<String>,
    },

    /// Monthly revenue, expenses and profit
    Monthly {
        #[command(flatten)]
        tenant: TenantArgs,

        /// Number of months ending with the current one
        #[arg(short, long, default_value = "12")]
        months: u32,
    },

    /// Revenue, expense and profit forecast
    Forecast {
        #[command(flatten)]
        tenant: TenantArgs,

        /// History preset: 30days, 90days, 180days, 1year, 2years
        #[arg(short, long, default_value = "90days")]
        time_range: String,

        /// Months to project (defaults to the configured value)
        #[arg(short, long)]
        periods: Option<u32>,
    },

    /// Detect anomalies in recent transactions
    Anomalies {
        #[command(flatten)]
        tenant: TenantArgs,

        /// Lookback such as 30d, 3m, 1y
        #[arg(short, long, default_value = "30d")]
        period: String,

        /// Outlier sensitivity: low, medium, high
        #[arg(short, long, default_value = "medium")]
        sensitivity: String,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Allowed CORS origin (repeatable)
        #[arg(long = "allow-origin")]
        allowed_origins: Vec<String>,
    },
}
