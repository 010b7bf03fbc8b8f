//! Ledger import command

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{LedgerRecord, LedgerStore};
use tracing::{debug, warn};

use super::open_store;

/// Fill in tenant ids the file left out
///
/// Records keep their own `user_id`/`client_id` when present; blank ids fall
/// back to the command-line defaults.
pub fn apply_tenant_defaults(
    records: &mut [LedgerRecord],
    default_user: Option<&str>,
    default_client: Option<&str>,
) {
    for record in records.iter_mut() {
        if record.user_id.trim().is_empty() {
            if let Some(user) = default_user {
                record.user_id = user.to_string();
            }
        }
        let has_client = record
            .client_id
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        if !has_client {
            record.client_id = default_client.map(str::to_string);
        }
    }
}

/// Import a JSON array of ledger records, returning how many were stored
pub fn cmd_import(
    db_path: &Path,
    file: &Path,
    default_user: Option<&str>,
    default_client: Option<&str>,
) -> Result<usize> {
    println!("📥 Importing ledger records from {}...", file.display());

    let reader = BufReader::new(
        File::open(file).with_context(|| format!("Failed to open file: {}", file.display()))?,
    );
    let mut records: Vec<LedgerRecord> = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse {} as a JSON array of records", file.display()))?;

    println!("   Found {} records", records.len());

    apply_tenant_defaults(&mut records, default_user, default_client);

    let missing_user = records
        .iter()
        .filter(|r| r.user_id.trim().is_empty())
        .count();
    if missing_user > 0 {
        warn!(
            count = missing_user,
            "Records without a user id will be skipped (pass --user to assign one)"
        );
    }

    let store = open_store(db_path)?;
    let imported = store
        .insert_records(&records)
        .context("Failed to store records")?;
    debug!(imported, total = records.len(), "Import finished");

    println!();
    println!("✅ Import complete!");
    println!("   Imported: {}", imported);
    if missing_user > 0 {
        println!("   Skipped (no user id): {}", missing_user);
    }

    Ok(imported)
}
