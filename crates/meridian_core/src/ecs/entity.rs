//! # Entity Identifiers
//!
//! Entities are lightweight identifiers consisting of:
//! - An index into the manager's slot array
//! - A generation counter for safe slot reuse
//!
//! Systems never hold component references across ticks; they hold
//! `EntityId`s and re-resolve each tick. A reused slot bumps the
//! generation, so a stale id resolves to nothing instead of to the
//! wrong entity.

/// Unique identifier for an entity.
///
/// The id is split into two parts:
/// - Lower 32 bits: index into the manager's slot array
/// - Upper 32 bits: generation counter for detecting stale references
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new entity id from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the entity id.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the entity id.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Null/invalid entity id.
    pub const NULL: Self = Self(u64::MAX);

    /// Checks if this entity id is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "entity(null)")
        } else {
            write!(f, "entity({}v{})", self.index(), self.generation())
        }
    }
}
