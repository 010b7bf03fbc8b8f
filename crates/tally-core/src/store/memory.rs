//! In-process ledger store

use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::models::LedgerRecord;

use super::{LedgerQuery, LedgerStore};

/// Ledger held in memory; ids are assigned on insert
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    records: RwLock<Vec<LedgerRecord>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with `records`
    pub fn with_records(records: Vec<LedgerRecord>) -> Result<Self> {
        let store = Self::new();
        store.insert_records(&records)?;
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn fetch_records(&self, query: &LedgerQuery) -> Result<Vec<LedgerRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| Error::InvalidData("ledger lock poisoned".to_string()))?;
        let mut matched: Vec<LedgerRecord> =
            records.iter().filter(|r| query.matches(r)).cloned().collect();
        matched.sort_by_key(|r| (r.date, r.id));
        Ok(matched)
    }

    fn insert_records(&self, records: &[LedgerRecord]) -> Result<usize> {
        let mut stored = self
            .records
            .write()
            .map_err(|_| Error::InvalidData("ledger lock poisoned".to_string()))?;
        let mut next_id = stored.iter().filter_map(|r| r.id).max().unwrap_or(0) + 1;
        let mut inserted = 0;

        for record in records.iter().filter(|r| !r.user_id.trim().is_empty()) {
            let mut record = record.clone();
            record.id = Some(next_id);
            next_id += 1;
            stored.push(record);
            inserted += 1;
        }

        Ok(inserted)
    }
}
