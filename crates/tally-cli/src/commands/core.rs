//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_store` - Open (and migrate) the ledger database
//! - `open_service` - Store plus analytics config, ready for reports
//! - `parse_as_of` - Report date parsing
//! - `cmd_init` - Initialize the database

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tally_core::{default_config_path, AnalyticsConfig, AnalyticsService, SqliteLedgerStore};

/// Open the ledger database, creating tables on first use
pub fn open_store(db_path: &Path) -> Result<SqliteLedgerStore> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    SqliteLedgerStore::open(path_str).context("Failed to open database")
}

/// Analytics config from `--config`, the data-dir override, or built-in defaults
pub fn load_config(config_path: Option<&Path>) -> Result<AnalyticsConfig> {
    AnalyticsConfig::resolve(config_path).context("Failed to load analytics config")
}

pub fn open_service(db_path: &Path, config_path: Option<&Path>) -> Result<AnalyticsService> {
    let store = open_store(db_path)?;
    let config = load_config(config_path)?;
    Ok(AnalyticsService::new(Arc::new(store), config))
}

/// Parse `--as-of`, defaulting to today (UTC)
pub fn parse_as_of(as_of: Option<&str>) -> Result<NaiveDate> {
    match as_of {
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .context("Invalid --as-of date format (use YYYY-MM-DD)"),
        None => Ok(Utc::now().date_naive()),
    }
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let store = open_store(db_path)?;
    println!("   Ledger records: {}", store.total_records()?);

    match default_config_path() {
        Some(path) if path.exists() => println!("   Config: {}", path.display()),
        Some(path) => println!("   Config: built-in defaults (override at {})", path.display()),
        None => println!("   Config: built-in defaults"),
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import records: tally import --file ledger.json --user <id>");
    println!("  2. Forecast: tally forecast --user <id>");
    println!("  3. Start API: tally serve");

    Ok(())
}
