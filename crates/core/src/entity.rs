//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Human-readable entity kind, used in lookup and conflict messages
    /// (e.g. "unit load", "location").
    const KIND: &'static str;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Entities persisted with a compare-and-swap version counter.
pub trait Versioned: Entity {
    fn version(&self) -> u64;

    /// Advance the version after a successful save.
    fn bump_version(&mut self);
}
