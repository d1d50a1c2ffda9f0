//! Stock & check store boundary.
//!
//! This module defines the transactional storage abstraction the engine runs
//! against, plus the adapters that implement it.

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;

pub use in_memory::{InMemoryCheckStore, InMemoryTransaction};
pub use postgres::{PoolSettings, PostgresCheckStore, PostgresTransaction};
pub use query::{CheckRecordPage, CheckRecordQuery, Pagination};
pub use r#trait::{CheckStore, StoreError, StoreTransaction};
