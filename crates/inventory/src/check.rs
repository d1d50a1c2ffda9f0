use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stocktake_core::{
    CheckRecordId, CheckerId, DomainError, DomainResult, Entity, LocationCode, MaterialCode,
};

use crate::stock::StockKey;

/// One reported physical count, as handed over by the transport layer.
///
/// Shape (presence, JSON types) has already been checked; the business rules
/// are applied by [`InventoryCheckInput::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCheckInput {
    pub checker_id: String,
    pub location_code: String,
    pub material_code: String,
    pub actual_quantity: i64,
}

impl InventoryCheckInput {
    pub fn new(
        checker_id: impl Into<String>,
        location_code: impl Into<String>,
        material_code: impl Into<String>,
        actual_quantity: i64,
    ) -> Self {
        Self {
            checker_id: checker_id.into(),
            location_code: location_code.into(),
            material_code: material_code.into(),
            actual_quantity,
        }
    }

    /// Apply the business rules, reporting the first failing field.
    ///
    /// Rules are checked in order: `checker_id`, `location_code`,
    /// `material_code`, then `actual_quantity >= 0`.
    pub fn validate(&self) -> DomainResult<ValidatedCheck> {
        let checker_id = CheckerId::try_from(self.checker_id.as_str())?;
        let location_code = LocationCode::try_from(self.location_code.as_str())?;
        let material_code = MaterialCode::try_from(self.material_code.as_str())?;

        if self.actual_quantity < 0 {
            return Err(DomainError::validation(
                "actual_quantity",
                format!("cannot be negative: {}", self.actual_quantity),
            ));
        }

        Ok(ValidatedCheck {
            checker_id,
            key: StockKey::new(material_code, location_code),
            actual_quantity: self.actual_quantity,
        })
    }
}

/// A check that passed validation and may enter a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCheck {
    checker_id: CheckerId,
    key: StockKey,
    actual_quantity: i64,
}

impl ValidatedCheck {
    pub fn checker_id(&self) -> &CheckerId {
        &self.checker_id
    }

    pub fn key(&self) -> &StockKey {
        &self.key
    }

    pub fn material_code(&self) -> &MaterialCode {
        &self.key.material_code
    }

    pub fn location_code(&self) -> &LocationCode {
        &self.key.location_code
    }

    pub fn actual_quantity(&self) -> i64 {
        self.actual_quantity
    }
}

/// Audit entry pairing a reported count with the balance it superseded.
///
/// Records are append-only: stores insert them and never update them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub id: CheckRecordId,
    pub checker_id: CheckerId,
    pub location_code: LocationCode,
    pub material_code: MaterialCode,
    pub actual_quantity: i64,
    /// Balance before this check overwrote it.
    pub stock_quantity: i64,
    /// `actual_quantity - stock_quantity`.
    pub difference: i64,
    pub check_time: DateTime<Utc>,
    pub is_processed: bool,
}

impl CheckRecord {
    pub fn stock_key(&self) -> StockKey {
        StockKey::new(self.material_code.clone(), self.location_code.clone())
    }
}

impl Entity for CheckRecord {
    type Id = CheckRecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
