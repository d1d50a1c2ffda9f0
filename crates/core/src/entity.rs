//! Entities: things with an identity that outlives changes to their fields.
//!
//! A stock balance keeps its identity (material + location) while its quantity
//! is overwritten; a check record is identified by its record id.

pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// True when both values denote the same entity, whatever their field values.
    fn same_identity(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
