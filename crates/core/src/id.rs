//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a persisted check record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckRecordId(Uuid);

impl CheckRecordId {
    /// Fresh time-ordered (UUIDv7) id, so ids sort roughly by creation.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CheckRecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for CheckRecordId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for CheckRecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<CheckRecordId> for Uuid {
    fn from(id: CheckRecordId) -> Self {
        id.0
    }
}

impl FromStr for CheckRecordId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::invalid_id(format!("CheckRecordId: {e}")))
    }
}
