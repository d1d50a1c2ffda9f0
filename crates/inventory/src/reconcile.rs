//! Variance computation: the pure part of processing a check.
//!
//! Given a validated count and what the store currently holds for its
//! material + location, decide the audit record to insert and the balance to
//! write back. Transactions are the caller's job.

use chrono::{DateTime, Utc};

use stocktake_core::{CheckRecordId, DomainError, DomainResult};

use crate::check::{CheckRecord, ValidatedCheck};
use crate::stock::{StockBalance, StockLookup};

/// Everything a check writes, decided before any write happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub record: CheckRecord,
    pub stock: StockBalance,
    pub prior_quantity: i64,
    pub difference: i64,
    /// No balance existed for the key; `stock` is a new one.
    pub stock_created: bool,
}

/// Reconcile a count against the recorded balance.
///
/// - absent balance: prior quantity is 0 and a balance is opened at the count
/// - present balance: its quantity is overwritten with the count
///
/// `difference = actual - prior` in both cases. The record is marked processed.
///
/// Fails when the variance does not fit in an `i64`, which only a recorded
/// balance far below zero can cause.
pub fn reconcile(
    check: &ValidatedCheck,
    lookup: StockLookup,
    record_id: CheckRecordId,
    now: DateTime<Utc>,
) -> DomainResult<Reconciliation> {
    let actual = check.actual_quantity();
    let prior_quantity = lookup.prior_quantity();

    let difference = actual.checked_sub(prior_quantity).ok_or_else(|| {
        DomainError::validation(
            "actual_quantity",
            format!("variance of {actual} against recorded stock {prior_quantity} is out of range"),
        )
    })?;

    let (stock, stock_created) = match lookup {
        StockLookup::Found(mut stock) => {
            stock.overwrite(actual, now);
            (stock, false)
        }
        StockLookup::NotFound => (StockBalance::opened(check.key().clone(), actual, now), true),
    };

    let record = CheckRecord {
        id: record_id,
        checker_id: check.checker_id().clone(),
        location_code: check.location_code().clone(),
        material_code: check.material_code().clone(),
        actual_quantity: actual,
        stock_quantity: prior_quantity,
        difference,
        check_time: now,
        is_processed: true,
    };

    Ok(Reconciliation {
        record,
        stock,
        prior_quantity,
        difference,
        stock_created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::InventoryCheckInput;
    use crate::stock::StockKey;
    use proptest::prelude::*;
    use stocktake_core::{LocationCode, MaterialCode};

    fn check(quantity: i64) -> ValidatedCheck {
        InventoryCheckInput::new("u1", "L1", "M1", quantity)
            .validate()
            .unwrap()
    }

    fn existing(quantity: i64) -> StockBalance {
        let key = StockKey::new(
            MaterialCode::try_from("M1").unwrap(),
            LocationCode::try_from("L1").unwrap(),
        );
        StockBalance::opened(key, quantity, Utc::now() - chrono::Duration::hours(1))
    }

    #[test]
    fn first_check_opens_balance_at_reported_count() {
        let now = Utc::now();
        let r = reconcile(&check(50), StockLookup::NotFound, CheckRecordId::new(), now).unwrap();

        assert!(r.stock_created);
        assert_eq!(r.prior_quantity, 0);
        assert_eq!(r.difference, 50);
        assert_eq!(r.record.stock_quantity, 0);
        assert_eq!(r.record.difference, 50);
        assert_eq!(r.stock.quantity, 50);
        assert_eq!(r.stock.created_at, now);
        assert!(r.record.is_processed);
    }

    #[test]
    fn recheck_records_negative_variance_and_overwrites() {
        let prior = existing(50);
        let created_at = prior.created_at;
        let r = reconcile(&check(45), StockLookup::Found(prior), CheckRecordId::new(), Utc::now()).unwrap();

        assert!(!r.stock_created);
        assert_eq!(r.record.stock_quantity, 50);
        assert_eq!(r.record.difference, -5);
        assert_eq!(r.stock.quantity, 45);
        assert_eq!(r.stock.created_at, created_at);
    }

    #[test]
    fn record_carries_check_identity() {
        let id = CheckRecordId::new();
        let now = Utc::now();
        let r = reconcile(&check(3), StockLookup::NotFound, id, now).unwrap();

        assert_eq!(r.record.id, id);
        assert_eq!(r.record.checker_id.as_str(), "u1");
        assert_eq!(r.record.stock_key(), r.stock.key);
        assert_eq!(r.record.check_time, now);
    }

    #[test]
    fn variance_overflow_against_negative_balance_is_rejected() {
        let err = reconcile(
            &check(i64::MAX),
            StockLookup::Found(existing(-1)),
            CheckRecordId::new(),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("actual_quantity"));

        // Negative balances within range still reconcile.
        let r = reconcile(&check(5), StockLookup::Found(existing(-3)), CheckRecordId::new(), Utc::now()).unwrap();
        assert_eq!(r.difference, 8);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: without prior stock, the variance equals the count.
        #[test]
        fn variance_without_prior_stock_is_the_count(actual in 0i64..1_000_000_000) {
            let r = reconcile(&check(actual), StockLookup::NotFound, CheckRecordId::new(), Utc::now()).unwrap();
            prop_assert_eq!(r.record.stock_quantity, 0);
            prop_assert_eq!(r.record.difference, actual);
            prop_assert_eq!(r.stock.quantity, actual);
        }

        /// Property: with prior stock Q, difference = actual - Q and the
        /// balance becomes exactly `actual` (overwrite, never additive).
        #[test]
        fn recheck_overwrites_and_records_signed_variance(
            prior in 0i64..1_000_000_000,
            actual in 0i64..1_000_000_000,
        ) {
            let r = reconcile(
                &check(actual),
                StockLookup::Found(existing(prior)),
                CheckRecordId::new(),
                Utc::now(),
            )
            .unwrap();
            prop_assert_eq!(r.record.stock_quantity, prior);
            prop_assert_eq!(r.record.difference, actual - prior);
            prop_assert_eq!(r.stock.quantity, actual);
            prop_assert_eq!(r.record.stock_quantity + r.record.difference, r.stock.quantity);
        }
    }
}
