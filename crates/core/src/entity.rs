//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Books, accounts and loans are entities: a loan keeps its id from issue
/// through return and payment even though every other field can change.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
