use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stocktake_core::{CheckRecordId, MaterialCode};
use stocktake_inventory::{CheckRecord, StockBalance, StockKey, StockLookup};

use super::query::{CheckRecordPage, CheckRecordQuery, Pagination};
use super::r#trait::{CheckStore, StoreError, StoreTransaction};

#[derive(Debug, Default)]
struct StoreState {
    stocks: HashMap<StockKey, StockBalance>,
    /// Append order.
    records: Vec<CheckRecord>,
    record_ids: HashSet<CheckRecordId>,
}

/// In-memory stock & check store.
///
/// Intended for tests/dev. A transaction holds the store lock from `begin`
/// until it is committed, rolled back or dropped, so transactions are fully
/// serialized. Writes are staged inside the transaction and applied in one
/// step on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckStore {
    state: Arc<Mutex<StoreState>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryCheckStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse new transactions from now on (simulates a closed pool).
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Committed balance for `key`.
    pub async fn stock(&self, key: &StockKey) -> Option<StockBalance> {
        self.state.lock().await.stocks.get(key).cloned()
    }

    /// All committed check records, in insertion order.
    pub async fn records(&self) -> Vec<CheckRecord> {
        self.state.lock().await.records.clone()
    }

    /// True while some transaction scope is still open.
    pub fn has_open_transaction(&self) -> bool {
        self.state.try_lock().is_err()
    }
}

#[async_trait]
impl CheckStore for InMemoryCheckStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is closed".to_string()));
        }

        let state = self.state.clone().lock_owned().await;
        Ok(InMemoryTransaction {
            state,
            staged_stocks: HashMap::new(),
            staged_records: Vec::new(),
        })
    }
}

/// Open transaction on an [`InMemoryCheckStore`].
///
/// Dropping it without `commit` discards the staged writes.
#[derive(Debug)]
pub struct InMemoryTransaction {
    state: OwnedMutexGuard<StoreState>,
    staged_stocks: HashMap<StockKey, StockBalance>,
    staged_records: Vec<CheckRecord>,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn get_stock(&mut self, key: &StockKey) -> Result<StockLookup, StoreError> {
        let found = self
            .staged_stocks
            .get(key)
            .or_else(|| self.state.stocks.get(key))
            .cloned();
        Ok(found.into())
    }

    async fn upsert_stock(&mut self, stock: &StockBalance) -> Result<(), StoreError> {
        self.staged_stocks.insert(stock.key.clone(), stock.clone());
        Ok(())
    }

    async fn insert_check_record(&mut self, record: &CheckRecord) -> Result<(), StoreError> {
        let duplicate = self.state.record_ids.contains(&record.id)
            || self.staged_records.iter().any(|r| r.id == record.id);
        if duplicate {
            return Err(StoreError::Constraint(format!(
                "check record {} already exists",
                record.id
            )));
        }
        self.staged_records.push(record.clone());
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let InMemoryTransaction {
            mut state,
            staged_stocks,
            staged_records,
        } = self;

        state.stocks.extend(staged_stocks);
        for record in staged_records {
            state.record_ids.insert(record.id);
            state.records.push(record);
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl CheckRecordQuery for InMemoryCheckStore {
    async fn records_by_material(
        &self,
        material_code: &MaterialCode,
        pagination: Pagination,
    ) -> Result<CheckRecordPage, StoreError> {
        let state = self.state.lock().await;
        let mut matching: Vec<CheckRecord> = state
            .records
            .iter()
            .filter(|r| &r.material_code == material_code)
            .cloned()
            .collect();
        drop(state);

        // Newest first; ids are time-ordered so they break timestamp ties.
        matching.sort_by(|a, b| b.check_time.cmp(&a.check_time).then(b.id.cmp(&a.id)));
        Ok(CheckRecordPage::slice(matching, pagination))
    }

    async fn unprocessed_records(&self, pagination: Pagination) -> Result<CheckRecordPage, StoreError> {
        let state = self.state.lock().await;
        let mut pending: Vec<CheckRecord> = state
            .records
            .iter()
            .filter(|r| !r.is_processed)
            .cloned()
            .collect();
        drop(state);

        pending.sort_by(|a, b| a.check_time.cmp(&b.check_time).then(a.id.cmp(&b.id)));
        Ok(CheckRecordPage::slice(pending, pagination))
    }
}
