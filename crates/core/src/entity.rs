//! Entity trait: identity that survives quantity and status changes.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Row version used for optimistic concurrency by the store layer.
    fn version(&self) -> u64;
}
