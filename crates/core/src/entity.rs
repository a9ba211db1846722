//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// The in-memory store keys its staged rows by `Entity::entity_id`.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn entity_id(&self) -> Self::Id;
}
