//! Read-only reporting queries over check records.
//!
//! These run outside the transactional path. Results are paginated; walking
//! the offset forward yields the full sequence lazily, and starting again at
//! offset 0 restarts it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use stocktake_core::MaterialCode;
use stocktake_inventory::CheckRecord;

use super::r#trait::StoreError;

/// Pagination parameters for record queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of records to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).min(Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    /// The page after this one.
    pub fn next(self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset.saturating_add(self.limit),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of check records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecordPage {
    pub records: Vec<CheckRecord>,
    /// Number of records matching the query across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl CheckRecordPage {
    /// Cut one page out of an already ordered result set.
    pub fn slice(all: Vec<CheckRecord>, pagination: Pagination) -> Self {
        let total = all.len() as u64;
        let records: Vec<CheckRecord> = all
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        let has_more = total > u64::from(pagination.offset) + u64::from(pagination.limit);

        Self {
            records,
            total,
            pagination,
            has_more,
        }
    }
}

/// Reporting queries over the check-record audit trail.
#[async_trait]
pub trait CheckRecordQuery: Send + Sync {
    /// Records for one material, newest `check_time` first.
    async fn records_by_material(
        &self,
        material_code: &MaterialCode,
        pagination: Pagination,
    ) -> Result<CheckRecordPage, StoreError>;

    /// Records not yet marked processed, oldest `check_time` first.
    async fn unprocessed_records(&self, pagination: Pagination) -> Result<CheckRecordPage, StoreError>;
}

#[async_trait]
impl<S> CheckRecordQuery for Arc<S>
where
    S: CheckRecordQuery + ?Sized,
{
    async fn records_by_material(
        &self,
        material_code: &MaterialCode,
        pagination: Pagination,
    ) -> Result<CheckRecordPage, StoreError> {
        (**self).records_by_material(material_code, pagination).await
    }

    async fn unprocessed_records(&self, pagination: Pagination) -> Result<CheckRecordPage, StoreError> {
        (**self).unprocessed_records(pagination).await
    }
}
