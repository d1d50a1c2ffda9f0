//! Inventory check engine (application-level orchestration).
//!
//! For one reported count the engine runs this pipeline inside a single
//! store transaction:
//!
//! ```text
//! InventoryCheckInput
//!   ↓
//! 1. Validate (no transaction is opened for invalid input)
//!   ↓
//! 2. Begin transaction
//!   ↓
//! 3. Read stock balance for (material, location)
//!   ↓
//! 4. Reconcile: variance + record + new balance (pure)
//!   ↓
//! 5. Insert check record
//!   ↓
//! 6. Upsert stock balance
//!   ↓
//! 7. Commit
//! ```
//!
//! Any failure after step 2 rolls the transaction back before the error is
//! returned. Panics and deadline expiry drop the open transaction, which the
//! store contract turns into a rollback. The deadline covers steps 2-6 only:
//! once COMMIT is sent its outcome belongs to the store, so an expired
//! deadline never hides a commit. Batches run each item through the same
//! pipeline in its own transaction.
//!
//! The engine holds no state beyond its store handle and configuration.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use stocktake_core::{CheckRecordId, DomainError, LocationCode, MaterialCode};
use stocktake_inventory::{InventoryCheckInput, Reconciliation, ValidatedCheck, reconcile};

use crate::store::{
    CheckRecordPage, CheckRecordQuery, CheckStore, Pagination, StoreError, StoreTransaction,
};

/// Step of the check pipeline at which a persistence failure happened.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStage {
    ReadStock,
    WriteRecord,
    WriteStock,
    Commit,
    /// Steps before commit outlived the configured deadline.
    Deadline,
}

impl core::fmt::Display for CheckStage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            CheckStage::ReadStock => "read stock",
            CheckStage::WriteRecord => "write check record",
            CheckStage::WriteStock => "write stock",
            CheckStage::Commit => "commit",
            CheckStage::Deadline => "finish within the transaction deadline",
        };
        f.write_str(s)
    }
}

/// Error returned by [`InventoryCheckEngine::process_check`].
///
/// - `Validation`: the input broke a business rule; nothing was touched.
/// - `Persistence`: the store failed after the transaction was opened; it was
///   rolled back, so retrying the same input is safe.
/// - `StoreUnavailable`: no transaction could be opened; retry with backoff.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("input validation failed: {0}")]
    Validation(#[from] DomainError),

    #[error("failed to {stage}: {source}")]
    Persistence {
        stage: CheckStage,
        #[source]
        source: StoreError,
    },

    #[error("failed to begin transaction: {0}")]
    StoreUnavailable(#[source] StoreError),
}

/// Coarse classification of [`CheckError`] for transport mapping.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckErrorKind {
    Validation,
    Persistence,
    StoreUnavailable,
}

impl CheckError {
    fn persistence(stage: CheckStage, source: StoreError) -> Self {
        CheckError::Persistence { stage, source }
    }

    pub fn kind(&self) -> CheckErrorKind {
        match self {
            CheckError::Validation(_) => CheckErrorKind::Validation,
            CheckError::Persistence { .. } => CheckErrorKind::Persistence,
            CheckError::StoreUnavailable(_) => CheckErrorKind::StoreUnavailable,
        }
    }

    /// Whether resubmitting the same input can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CheckError::Validation(_))
    }
}

/// Proof that a check was committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReceipt {
    pub record_id: CheckRecordId,
    pub material_code: MaterialCode,
    pub location_code: LocationCode,
    pub prior_quantity: i64,
    pub actual_quantity: i64,
    pub difference: i64,
    /// The balance did not exist before this check.
    pub stock_created: bool,
    pub checked_at: DateTime<Utc>,
}

impl From<&Reconciliation> for CheckReceipt {
    fn from(r: &Reconciliation) -> Self {
        Self {
            record_id: r.record.id,
            material_code: r.record.material_code.clone(),
            location_code: r.record.location_code.clone(),
            prior_quantity: r.prior_quantity,
            actual_quantity: r.record.actual_quantity,
            difference: r.difference,
            stock_created: r.stock_created,
            checked_at: r.record.check_time,
        }
    }
}

/// Counts reported for a processed batch.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results<T, E>(results: &[Result<T, E>]) -> Self {
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        Self {
            attempted: results.len(),
            succeeded,
            failed: results.len() - succeeded,
        }
    }
}

/// Engine settings.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on begin through the stock write. Commit is not bounded,
    /// so an expired deadline always means the transaction was rolled back.
    pub transaction_timeout: Option<Duration>,
}

/// Runs inventory checks against a [`CheckStore`].
///
/// Generic over the store so tests run against `InMemoryCheckStore` and
/// production against `PostgresCheckStore` with the same code path.
#[derive(Debug)]
pub struct InventoryCheckEngine<S> {
    store: S,
    config: EngineConfig,
}

impl<S> InventoryCheckEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

}

impl<S> InventoryCheckEngine<S>
where
    S: CheckStore,
{
    /// Process one count as a single all-or-nothing transaction.
    ///
    /// On success the check record (with the pre-update balance and the
    /// variance) and the overwritten balance are both committed. On any error
    /// neither is.
    #[instrument(
        skip(self, input),
        fields(
            checker_id = %input.checker_id,
            material_code = %input.material_code,
            location_code = %input.location_code
        )
    )]
    pub async fn process_check(&self, input: &InventoryCheckInput) -> Result<CheckReceipt, CheckError> {
        let check = match input.validate() {
            Ok(check) => check,
            Err(err) => {
                warn!(error = %err, "invalid inventory check input");
                return Err(CheckError::Validation(err));
            }
        };

        info!(actual_quantity = check.actual_quantity(), "starting inventory check");

        let staged = match self.config.transaction_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.stage_check(&check)).await {
                Ok(staged) => staged,
                Err(_) => {
                    // The staging future was dropped with its scope.
                    error!(timeout_ms = limit.as_millis() as u64, "inventory check exceeded deadline, rolled back");
                    Err(CheckError::persistence(
                        CheckStage::Deadline,
                        StoreError::Timeout(format!("transaction exceeded {limit:?}")),
                    ))
                }
            },
            None => self.stage_check(&check).await,
        };
        let (tx, receipt) = staged?;

        if let Err(err) = tx.commit().await {
            error!(error = %err, "failed to commit transaction");
            return Err(CheckError::persistence(CheckStage::Commit, err));
        }

        info!(
            record_id = %receipt.record_id,
            previous_quantity = receipt.prior_quantity,
            new_quantity = receipt.actual_quantity,
            variance = receipt.difference,
            "inventory check completed"
        );

        Ok(receipt)
    }

    /// Process counts one after another, each in its own transaction.
    ///
    /// The result has one entry per input, in input order. A failed item
    /// never affects the others.
    #[instrument(skip(self, inputs), fields(total_items = inputs.len()))]
    pub async fn process_batch(
        &self,
        inputs: &[InventoryCheckInput],
    ) -> Vec<Result<CheckReceipt, CheckError>> {
        info!("starting batch inventory check");

        let mut results = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.iter().enumerate() {
            let result = self.process_check(input).await;
            if let Err(err) = &result {
                warn!(index, error = %err, "batch item failed");
            }
            results.push(result);
        }

        let summary = BatchSummary::from_results(&results);
        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "batch inventory check completed"
        );

        results
    }

    /// Steps 2-6: open a transaction and stage both writes, leaving it ready
    /// to commit. On error the transaction is rolled back here.
    async fn stage_check(&self, check: &ValidatedCheck) -> Result<(S::Tx, CheckReceipt), CheckError> {
        let mut tx = self.store.begin().await.map_err(|err| {
            error!(error = %err, "failed to begin transaction");
            CheckError::StoreUnavailable(err)
        })?;

        match apply_check(&mut tx, check).await {
            Ok(receipt) => Ok((tx, receipt)),
            Err(err) => {
                error!(error = %err, "inventory check failed, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    // The connection discards the open transaction anyway.
                    error!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

impl<S> InventoryCheckEngine<S>
where
    S: CheckRecordQuery,
{
    /// Check records for one material, newest first.
    pub async fn records_by_material(
        &self,
        material_code: &MaterialCode,
        pagination: Pagination,
    ) -> Result<CheckRecordPage, StoreError> {
        self.store.records_by_material(material_code, pagination).await
    }

    /// Check records not yet marked processed, oldest first.
    pub async fn unprocessed_records(&self, pagination: Pagination) -> Result<CheckRecordPage, StoreError> {
        self.store.unprocessed_records(pagination).await
    }
}

/// Steps 3-6 of the pipeline, inside an open transaction.
async fn apply_check<T>(tx: &mut T, check: &ValidatedCheck) -> Result<CheckReceipt, CheckError>
where
    T: StoreTransaction,
{
    let lookup = tx
        .get_stock(check.key())
        .await
        .map_err(|e| CheckError::persistence(CheckStage::ReadStock, e))?;

    if !lookup.is_found() {
        info!("stock record not found, creating new stock entry");
    }

    let reconciliation = reconcile(check, lookup, CheckRecordId::new(), Utc::now())?;

    debug!(
        stock_quantity = reconciliation.prior_quantity,
        actual_quantity = check.actual_quantity(),
        difference = reconciliation.difference,
        "calculated inventory variance"
    );

    tx.insert_check_record(&reconciliation.record)
        .await
        .map_err(|e| CheckError::persistence(CheckStage::WriteRecord, e))?;

    tx.upsert_stock(&reconciliation.stock)
        .await
        .map_err(|e| CheckError::persistence(CheckStage::WriteStock, e))?;

    Ok(CheckReceipt::from(&reconciliation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCheckStore;
    use stocktake_inventory::{StockBalance, StockKey};

    fn engine() -> InventoryCheckEngine<InMemoryCheckStore> {
        InventoryCheckEngine::new(InMemoryCheckStore::new())
    }

    fn key(material: &str, location: &str) -> StockKey {
        StockKey::new(
            MaterialCode::try_from(material).unwrap(),
            LocationCode::try_from(location).unwrap(),
        )
    }

    #[tokio::test]
    async fn first_check_creates_balance() {
        let engine = engine();

        let receipt = engine
            .process_check(&InventoryCheckInput::new("u1", "L1", "M1", 50))
            .await
            .unwrap();

        assert!(receipt.stock_created);
        assert_eq!(receipt.prior_quantity, 0);
        assert_eq!(receipt.difference, 50);

        let stock = engine.store().stock(&key("M1", "L1")).await.unwrap();
        assert_eq!(stock.quantity, 50);

        let records = engine.store().records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, receipt.record_id);
        assert_eq!(records[0].stock_quantity, 0);
        assert_eq!(records[0].difference, 50);
        assert!(records[0].is_processed);
    }

    #[tokio::test]
    async fn recheck_overwrites_balance_and_records_variance() {
        let engine = engine();
        engine
            .process_check(&InventoryCheckInput::new("u1", "L1", "M1", 50))
            .await
            .unwrap();

        let receipt = engine
            .process_check(&InventoryCheckInput::new("u2", "L1", "M1", 45))
            .await
            .unwrap();

        assert!(!receipt.stock_created);
        assert_eq!(receipt.prior_quantity, 50);
        assert_eq!(receipt.difference, -5);

        let stock = engine.store().stock(&key("M1", "L1")).await.unwrap();
        assert_eq!(stock.quantity, 45);

        let records = engine.store().records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].stock_quantity, 50);
        assert_eq!(records[1].difference, -5);
        assert_eq!(records[1].checker_id.as_str(), "u2");
    }

    #[tokio::test]
    async fn negative_quantity_is_rejected_without_side_effects() {
        let engine = engine();

        let err = engine
            .process_check(&InventoryCheckInput::new("u1", "L1", "M1", -1))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), CheckErrorKind::Validation);
        assert!(!err.is_retryable());
        assert!(matches!(&err, CheckError::Validation(e) if e.field() == Some("actual_quantity")));
        assert!(engine.store().records().await.is_empty());
        assert_eq!(engine.store().stock(&key("M1", "L1")).await, None);
    }

    #[tokio::test]
    async fn validation_happens_before_a_transaction_is_opened() {
        let store = InMemoryCheckStore::new();
        store.close();
        let engine = InventoryCheckEngine::new(store);

        // A closed store would fail `begin`; validation must win first.
        let err = engine
            .process_check(&InventoryCheckInput::new("", "L1", "M1", 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), CheckErrorKind::Validation);
    }

    #[tokio::test]
    async fn closed_store_reports_unavailable() {
        let store = InMemoryCheckStore::new();
        store.close();
        let engine = InventoryCheckEngine::new(store);

        let err = engine
            .process_check(&InventoryCheckInput::new("u1", "L1", "M1", 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), CheckErrorKind::StoreUnavailable);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn batch_preserves_order_and_isolates_failures() {
        let engine = engine();
        let inputs = vec![
            InventoryCheckInput::new("u1", "L1", "M1", 10),
            InventoryCheckInput::new("", "L1", "M2", 20),
            InventoryCheckInput::new("u1", "L1", "M3", 30),
        ];

        let results = engine.process_batch(&inputs).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().material_code.as_str(), "M1");
        assert!(matches!(&results[1], Err(CheckError::Validation(e)) if e.field() == Some("checker_id")));
        assert_eq!(results[2].as_ref().unwrap().material_code.as_str(), "M3");

        assert_eq!(engine.store().stock(&key("M1", "L1")).await.unwrap().quantity, 10);
        assert_eq!(engine.store().stock(&key("M2", "L1")).await, None);
        assert_eq!(engine.store().stock(&key("M3", "L1")).await.unwrap().quantity, 30);

        let summary = BatchSummary::from_results(&results);
        assert_eq!(
            summary,
            BatchSummary {
                attempted: 3,
                succeeded: 2,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn empty_batch_is_empty() {
        let engine = engine();
        assert!(engine.process_batch(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn records_by_material_passes_through() {
        let engine = engine();
        for qty in [5, 7, 9] {
            engine
                .process_check(&InventoryCheckInput::new("u1", "L1", "M1", qty))
                .await
                .unwrap();
        }

        let material = MaterialCode::try_from("M1").unwrap();
        let page = engine
            .records_by_material(&material, Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.records[0].actual_quantity, 9);

        let pending = engine.unprocessed_records(Pagination::default()).await.unwrap();
        assert_eq!(pending.total, 0);
    }

    #[test]
    fn stage_names_read_naturally_in_errors() {
        let err = CheckError::persistence(CheckStage::WriteStock, StoreError::Storage("boom".into()));
        assert_eq!(err.to_string(), "failed to write stock: storage error: boom");
        assert_eq!(err.kind(), CheckErrorKind::Persistence);

        let err = CheckError::persistence(CheckStage::Deadline, StoreError::Timeout("transaction exceeded 50ms".into()));
        assert_eq!(
            err.to_string(),
            "failed to finish within the transaction deadline: timed out: transaction exceeded 50ms"
        );
    }

    #[tokio::test]
    async fn out_of_range_variance_rolls_back_and_is_not_retryable() {
        let store = InMemoryCheckStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.upsert_stock(&StockBalance::opened(key("M1", "L1"), -1, Utc::now()))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        let engine = InventoryCheckEngine::new(store);

        let err = engine
            .process_check(&InventoryCheckInput::new("u1", "L1", "M1", i64::MAX))
            .await
            .unwrap_err();

        assert!(matches!(&err, CheckError::Validation(e) if e.field() == Some("actual_quantity")));
        assert!(!err.is_retryable());
        assert!(!engine.store().has_open_transaction());
        assert!(engine.store().records().await.is_empty());
        assert_eq!(engine.store().stock(&key("M1", "L1")).await.unwrap().quantity, -1);
    }
}
