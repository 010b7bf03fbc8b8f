//! SQLite ledger store with connection pooling and migrations

use chrono::{NaiveDate, NaiveTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{FlowKind, LedgerRecord};

use super::filter::LedgerFilter;
use super::{LedgerQuery, LedgerStore};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Ledger store backed by a pooled SQLite file
#[derive(Clone)]
pub struct SqliteLedgerStore {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl SqliteLedgerStore {
    /// Open (creating if needed) the database at `path` and run migrations
    pub fn open(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(10).build(manager)?;

        let store = Self {
            pool,
            db_path: path.to_string(),
        };
        store.run_migrations()?;

        Ok(store)
    }

    /// Fresh store in a unique temp file, for tests
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!("tally_test_{}_{}.db", std::process::id(), id));

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::open(&path.to_string_lossy())
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block the importer
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;

            CREATE TABLE IF NOT EXISTS ledger_transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                client_id TEXT,
                date TEXT NOT NULL,              -- YYYY-MM-DD
                time TEXT,                       -- HH:MM:SS when known
                amount REAL NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                category TEXT,
                description TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_ledger_user_date
                ON ledger_transactions(user_id, date);
            CREATE INDEX IF NOT EXISTS idx_ledger_user_client_date
                ON ledger_transactions(user_id, client_id, date);
            "#,
        )?;

        info!(path = %self.db_path, "Ledger migrations complete");
        Ok(())
    }

    /// Count a tenant's records, optionally for one client
    pub fn count_records(&self, user_id: &str, client_id: Option<&str>) -> Result<i64> {
        let conn = self.conn()?;
        let filter = LedgerFilter::new().user_id(user_id).client_id(client_id).build();
        let mut stmt = conn.prepare(&filter.build_count_query())?;
        let count: i64 = stmt.query_row(filter.params_refs().as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    /// Records across every tenant
    pub fn total_records(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM ledger_transactions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Helper to convert a row to LedgerRecord
    /// Column order: id, user_id, client_id, date, time, amount, type, category, description
    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<LedgerRecord> {
        let date_str: String = row.get(3)?;
        let time_str: Option<String> = row.get(4)?;
        let kind_str: String = row.get(6)?;

        let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
        // An unreadable time only loses the unusual-hours signal
        let time = time_str.and_then(|t| NaiveTime::parse_from_str(&t, "%H:%M:%S").ok());
        let kind = kind_str.parse::<FlowKind>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Text,
                Box::new(Error::InvalidData(e)),
            )
        })?;

        Ok(LedgerRecord {
            id: Some(row.get(0)?),
            user_id: row.get(1)?,
            client_id: row.get(2)?,
            date,
            time,
            amount: row.get(5)?,
            kind,
            category: row.get(7)?,
            description: row.get(8)?,
        })
    }
}

impl LedgerStore for SqliteLedgerStore {
    fn fetch_records(&self, query: &LedgerQuery) -> Result<Vec<LedgerRecord>> {
        let conn = self.conn()?;
        let filter = LedgerFilter::new()
            .user_id(&query.user_id)
            .client_id(query.client_id.as_deref())
            .date_range(query.start, query.end)
            .build();

        let mut stmt = conn.prepare(&filter.build_select_query())?;
        let records = stmt
            .query_map(filter.params_refs().as_slice(), |row| Self::row_to_record(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(
            user_id = %query.user_id,
            client_id = ?query.client_id,
            start = %query.start,
            end = %query.end,
            records = records.len(),
            "Fetched ledger records"
        );

        Ok(records)
    }

    fn insert_records(&self, records: &[LedgerRecord]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO ledger_transactions (user_id, client_id, date, time, amount, type, category, description)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )?;

            for record in records {
                if record.user_id.trim().is_empty() {
                    warn!(date = %record.date, "Skipping record without user_id");
                    continue;
                }
                stmt.execute(params![
                    record.user_id,
                    record.client_id,
                    record.date.to_string(),
                    record.time.map(|t| t.format("%H:%M:%S").to_string()),
                    record.amount,
                    record.kind.as_str(),
                    record.category,
                    record.description,
                ])?;
                inserted += 1;
            }
        }

        tx.commit()?;
        info!(inserted, skipped = records.len() - inserted, "Inserted ledger records");
        Ok(inserted)
    }
}

impl std::fmt::Debug for SqliteLedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLedgerStore")
            .field("path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_insert_and_fetch_round_trip() {
        let store = SqliteLedgerStore::in_memory().unwrap();
        let records = vec![
            LedgerRecord::expense(d(2024, 3, 2), 42.5)
                .with_tenant("u1", Some("c1"))
                .with_category("Office")
                .with_description("Paper")
                .with_time(NaiveTime::from_hms_opt(23, 30, 0).unwrap()),
            LedgerRecord::income(d(2024, 3, 1), 1000.0).with_tenant("u1", Some("c1")),
        ];
        assert_eq!(store.insert_records(&records).unwrap(), 2);

        let query = LedgerQuery::new("u1", Some("c1"), d(2024, 3, 1), d(2024, 3, 31)).unwrap();
        let fetched = store.fetch_records(&query).unwrap();
        assert_eq!(fetched.len(), 2);

        // Ordered by date
        assert_eq!(fetched[0].kind, FlowKind::Income);
        assert!(fetched[0].id.is_some());
        assert_eq!(fetched[1].category.as_deref(), Some("Office"));
        assert_eq!(fetched[1].description, "Paper");
        assert_eq!(fetched[1].time, NaiveTime::from_hms_opt(23, 30, 0));
        assert_eq!(fetched[1].amount, 42.5);
    }

    #[test]
    fn test_tenant_isolation() {
        let store = SqliteLedgerStore::in_memory().unwrap();
        store
            .insert_records(&[
                LedgerRecord::income(d(2024, 1, 5), 10.0).with_tenant("u1", Some("a")),
                LedgerRecord::income(d(2024, 1, 5), 20.0).with_tenant("u1", Some("b")),
                LedgerRecord::income(d(2024, 1, 5), 30.0).with_tenant("u2", None),
            ])
            .unwrap();

        let all = LedgerQuery::new("u1", None, d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        assert_eq!(store.fetch_records(&all).unwrap().len(), 2);

        let one = LedgerQuery::new("u1", Some("b"), d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        let fetched = store.fetch_records(&one).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].amount, 20.0);

        assert_eq!(store.count_records("u2", None).unwrap(), 1);
    }

    #[test]
    fn test_date_window_inclusive() {
        let store = SqliteLedgerStore::in_memory().unwrap();
        store
            .insert_records(&[
                LedgerRecord::expense(d(2023, 12, 31), 1.0).with_tenant("u1", None),
                LedgerRecord::expense(d(2024, 1, 1), 2.0).with_tenant("u1", None),
                LedgerRecord::expense(d(2024, 1, 31), 3.0).with_tenant("u1", None),
                LedgerRecord::expense(d(2024, 2, 1), 4.0).with_tenant("u1", None),
            ])
            .unwrap();

        let query = LedgerQuery::new("u1", None, d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        let amounts: Vec<f64> = store
            .fetch_records(&query)
            .unwrap()
            .iter()
            .map(|r| r.amount)
            .collect();
        assert_eq!(amounts, vec![2.0, 3.0]);
    }

    #[test]
    fn test_records_without_user_skipped() {
        let store = SqliteLedgerStore::in_memory().unwrap();
        let inserted = store
            .insert_records(&[LedgerRecord::income(d(2024, 1, 1), 5.0)])
            .unwrap();
        assert_eq!(inserted, 0);
    }
}
