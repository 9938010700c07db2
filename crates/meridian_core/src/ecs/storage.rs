//! # Component Storage
//!
//! One table per component type, indexed by entity slot index with the
//! owning generation recorded per slot. A stale entity id (older
//! generation) resolves to nothing.
//!
//! Tables are type-erased behind [`AnyTable`] so the manager can purge a
//! removed entity from every table without knowing the component types.

use std::any::Any;

use super::component::Component;
use super::entity::EntityId;

/// A filled slot in a component table.
struct Slot<C> {
    /// Generation of the entity that owns this value.
    generation: u32,
    /// The component value.
    value: C,
}

/// Storage for a single component type.
///
/// Access is O(1) by entity index; iteration walks the slot array in
/// index order, which keeps system output deterministic for identical
/// input state.
pub struct ComponentTable<C: Component> {
    slots: Vec<Option<Slot<C>>>,
    len: usize,
}

impl<C: Component> ComponentTable<C> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            len: 0,
        }
    }

    /// Number of entities currently carrying this component.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no entity carries this component.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts or replaces the component for an entity.
    pub fn insert(&mut self, id: EntityId, value: C) {
        let idx = id.index() as usize;
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        if self.slots[idx].is_none() {
            self.len += 1;
        }
        self.slots[idx] = Some(Slot {
            generation: id.generation(),
            value,
        });
    }

    /// Gets the component for an entity, if present and not stale.
    #[inline]
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&C> {
        self.slots
            .get(id.index() as usize)?
            .as_ref()
            .filter(|slot| slot.generation == id.generation())
            .map(|slot| &slot.value)
    }

    /// Gets the component mutably, if present and not stale.
    #[inline]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut C> {
        self.slots
            .get_mut(id.index() as usize)?
            .as_mut()
            .filter(|slot| slot.generation == id.generation())
            .map(|slot| &mut slot.value)
    }

    /// Removes the component for an entity.
    ///
    /// Returns the removed value, or `None` if the entity did not carry it
    /// or the id was stale.
    pub fn take(&mut self, id: EntityId) -> Option<C> {
        let idx = id.index() as usize;
        let slot = self.slots.get_mut(idx)?;
        if slot
            .as_ref()
            .is_some_and(|s| s.generation == id.generation())
        {
            self.len -= 1;
            slot.take().map(|s| s.value)
        } else {
            None
        }
    }

    /// Iterates over all `(EntityId, &C)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &C)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.as_ref()
                .map(|s| (EntityId::new(idx as u32, s.generation), &s.value))
        })
    }

    /// Iterates mutably over all `(EntityId, &mut C)` pairs in index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut C)> {
        self.slots.iter_mut().enumerate().filter_map(|(idx, slot)| {
            slot.as_mut()
                .map(|s| (EntityId::new(idx as u32, s.generation), &mut s.value))
        })
    }
}

impl<C: Component> Default for ComponentTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a component table.
///
/// The manager holds `Box<dyn AnyTable>` per component type and uses this
/// interface for lifecycle work (purging removed entities, diagnostics).
pub trait AnyTable: Send + Sync {
    /// Upcast for typed access.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for typed mutable access.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Drops the entity's component, if present.
    fn purge(&mut self, id: EntityId);

    /// Number of entities carrying this component.
    fn count(&self) -> usize;

    /// Component name for diagnostics.
    fn component_name(&self) -> &'static str;
}

impl<C: Component> AnyTable for ComponentTable<C> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn purge(&mut self, id: EntityId) {
        let _ = self.take(id);
    }

    fn count(&self) -> usize {
        self.len()
    }

    fn component_name(&self) -> &'static str {
        C::NAME
    }
}
