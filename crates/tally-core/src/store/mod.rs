//! Ledger storage
//!
//! - `filter` - parameterized WHERE-clause builder for ledger queries
//! - `sqlite` - pooled SQLite store used by the server and CLI
//! - `memory` - in-process store for tests and one-off runs
//!
//! Analytics only ever read a tenant's records for a date window, so the
//! store surface is small: fetch by query, insert in bulk.

mod filter;
mod memory;
mod sqlite;

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::models::LedgerRecord;

pub use filter::{FilterResult, LedgerFilter};
pub use memory::MemoryLedgerStore;
pub use sqlite::{DbConn, DbPool, SqliteLedgerStore};

/// Which records to fetch: one tenant, optionally one client, a date window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerQuery {
    pub user_id: String,
    pub client_id: Option<String>,
    /// Inclusive
    pub start: NaiveDate,
    /// Inclusive
    pub end: NaiveDate,
}

impl LedgerQuery {
    pub fn new(user_id: &str, client_id: Option<&str>, start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if user_id.trim().is_empty() {
            return Err(Error::InvalidData("user_id is required".to_string()));
        }
        if start > end {
            return Err(Error::InvalidData(format!(
                "Query start {} is after end {}",
                start, end
            )));
        }
        Ok(Self {
            user_id: user_id.to_string(),
            client_id: client_id.map(str::to_string),
            start,
            end,
        })
    }

    /// Whether a record belongs to this query
    pub fn matches(&self, record: &LedgerRecord) -> bool {
        record.user_id == self.user_id
            && self
                .client_id
                .as_ref()
                .map_or(true, |c| record.client_id.as_ref() == Some(c))
            && record.date >= self.start
            && record.date <= self.end
    }
}

/// Source of ledger records
pub trait LedgerStore: Send + Sync {
    /// Records matching `query`, ordered by date then id
    fn fetch_records(&self, query: &LedgerQuery) -> Result<Vec<LedgerRecord>>;

    /// Store records, returning how many were written
    fn insert_records(&self, records: &[LedgerRecord]) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_query_validation() {
        assert!(LedgerQuery::new("", None, d(2024, 1, 1), d(2024, 2, 1)).is_err());
        assert!(LedgerQuery::new("u", None, d(2024, 2, 1), d(2024, 1, 1)).is_err());
        assert!(LedgerQuery::new("u", None, d(2024, 1, 1), d(2024, 1, 1)).is_ok());
    }

    #[test]
    fn test_query_matches() {
        let query = LedgerQuery::new("u1", Some("c1"), d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        let record = LedgerRecord::income(d(2024, 1, 15), 10.0).with_tenant("u1", Some("c1"));
        assert!(query.matches(&record));
        assert!(!query.matches(&record.clone().with_tenant("u1", Some("c2"))));
        assert!(!query.matches(&record.clone().with_tenant("u2", Some("c1"))));
        assert!(!query.matches(&record.clone().with_tenant("u1", None)));

        let any_client = LedgerQuery::new("u1", None, d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        assert!(any_client.matches(&record.clone().with_tenant("u1", None)));
        assert!(!any_client.matches(&LedgerRecord::income(d(2024, 2, 1), 1.0).with_tenant("u1", None)));
    }
}
