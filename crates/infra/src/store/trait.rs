use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stocktake_inventory::{CheckRecord, StockBalance, StockKey, StockLookup};

/// Store operation error.
///
/// These are **infrastructure errors** (connectivity, constraints, deadlines)
/// as opposed to domain errors (validation).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backend cannot serve requests (pool closed, connection refused).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness / integrity constraint rejected a write.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Any other read/write/commit failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// The operation ran past its deadline.
    #[error("timed out: {0}")]
    Timeout(String),
}

/// Transactional store for stock balances and check records.
///
/// Each call to [`CheckStore::begin`] opens one exclusive transaction scope.
/// Implementations must run at read-committed isolation or stronger and must
/// serialize concurrent writers of the same [`StockKey`].
#[async_trait]
pub trait CheckStore: Send + Sync {
    type Tx: StoreTransaction;

    /// Open a new transaction scope.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// An open transaction scope.
///
/// `commit` and `rollback` consume the handle, so a finished scope can't be
/// reused. Dropping a handle that was neither committed nor rolled back must
/// discard its writes; that is what releases the scope on panics, early
/// returns and cancelled futures. A failed `commit` must likewise leave
/// nothing durable.
#[async_trait]
pub trait StoreTransaction: Send + Sized {
    /// Point lookup; absence is `StockLookup::NotFound`, not an error.
    async fn get_stock(&mut self, key: &StockKey) -> Result<StockLookup, StoreError>;

    /// Create or replace the single balance row for `stock.key`.
    async fn upsert_stock(&mut self, stock: &StockBalance) -> Result<(), StoreError>;

    /// Append an audit record. Records are never updated.
    async fn insert_check_record(&mut self, record: &CheckRecord) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> CheckStore for Arc<S>
where
    S: CheckStore + ?Sized,
{
    type Tx = S::Tx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        (**self).begin().await
    }
}
