//! Inventory check domain module.
//!
//! This crate contains the business rules for physical-inventory counts,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage): input validation, the stock-balance and check-record model, and
//! the variance computation that reconciles a count against the recorded
//! balance.

pub mod check;
pub mod reconcile;
pub mod stock;

pub use check::{CheckRecord, InventoryCheckInput, ValidatedCheck};
pub use reconcile::{reconcile, Reconciliation};
pub use stock::{StockBalance, StockKey, StockLookup};
