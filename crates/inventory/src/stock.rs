use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stocktake_core::{Entity, LocationCode, MaterialCode};

/// Natural key of a stock balance: one balance per material per location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub material_code: MaterialCode,
    pub location_code: LocationCode,
}

impl StockKey {
    pub fn new(material_code: MaterialCode, location_code: LocationCode) -> Self {
        Self {
            material_code,
            location_code,
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.material_code, self.location_code)
    }
}

/// Currently believed on-hand quantity for one material at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBalance {
    pub key: StockKey,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl StockBalance {
    /// A balance seen for the first time, starting at `quantity`.
    pub fn opened(key: StockKey, quantity: i64, now: DateTime<Utc>) -> Self {
        Self {
            key,
            quantity,
            created_at: now,
            last_updated: now,
        }
    }

    /// Replace the recorded quantity with a counted one (never additive).
    pub fn overwrite(&mut self, quantity: i64, now: DateTime<Utc>) {
        self.quantity = quantity;
        self.last_updated = now;
    }

    pub fn material_code(&self) -> &MaterialCode {
        &self.key.material_code
    }

    pub fn location_code(&self) -> &LocationCode {
        &self.key.location_code
    }
}

impl Entity for StockBalance {
    type Id = StockKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }
}

/// Outcome of a point lookup by [`StockKey`].
///
/// Absence is an ordinary answer, not a fault, so it gets its own variant
/// instead of an error or a sentinel balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockLookup {
    Found(StockBalance),
    NotFound,
}

impl StockLookup {
    /// Quantity on record before a check overwrites it (0 when absent).
    pub fn prior_quantity(&self) -> i64 {
        match self {
            StockLookup::Found(stock) => stock.quantity,
            StockLookup::NotFound => 0,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, StockLookup::Found(_))
    }
}

impl From<Option<StockBalance>> for StockLookup {
    fn from(value: Option<StockBalance>) -> Self {
        match value {
            Some(stock) => StockLookup::Found(stock),
            None => StockLookup::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(material: &str, location: &str) -> StockKey {
        StockKey::new(
            MaterialCode::try_from(material).unwrap(),
            LocationCode::try_from(location).unwrap(),
        )
    }

    #[test]
    fn overwrite_replaces_quantity_and_keeps_identity() {
        let opened_at = Utc::now();
        let mut stock = StockBalance::opened(key("M1", "L1"), 50, opened_at);
        let before = stock.clone();

        let later = opened_at + chrono::Duration::seconds(5);
        stock.overwrite(45, later);

        assert_eq!(stock.quantity, 45);
        assert_eq!(stock.created_at, opened_at);
        assert_eq!(stock.last_updated, later);
        assert!(stock.same_identity(&before));
    }

    #[test]
    fn lookup_prior_quantity_defaults_to_zero() {
        assert_eq!(StockLookup::NotFound.prior_quantity(), 0);

        let found = StockLookup::Found(StockBalance::opened(key("M1", "L1"), 7, Utc::now()));
        assert_eq!(found.prior_quantity(), 7);
        assert!(found.is_found());
    }

    #[test]
    fn key_display_is_material_at_location() {
        assert_eq!(key("M1", "L1").to_string(), "M1@L1");
    }
}
