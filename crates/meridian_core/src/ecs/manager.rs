//! # Entity/Component Manager
//!
//! The single owner of all component tables. Creates and destroys
//! entities, exposes typed component queries, and resolves singleton
//! entities.
//!
//! Entity destruction is deferred: a system marks an entity for removal,
//! and the manager purges marked entities at the safe point between
//! system steps. Iteration during a step is therefore never invalidated
//! by removals made in the same step.

use std::any::TypeId;
use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};

use super::component::Component;
use super::entity::EntityId;
use super::storage::{AnyTable, ComponentTable};

/// Bookkeeping for one entity slot.
struct EntitySlot {
    /// Current generation; bumped when the slot is reused.
    generation: u32,
    /// Whether the slot currently holds a live entity.
    alive: bool,
    /// Debug name given at creation.
    name: String,
}

/// The entity/component manager.
///
/// Owns every component table behind a `TypeId`-keyed registry. Mutated
/// only on the frame thread; off-thread work hands values back through
/// queues that are drained by systems.
pub struct EcsManager {
    slots: Vec<EntitySlot>,
    free_indices: Vec<u32>,
    alive_count: usize,
    tables: HashMap<TypeId, Box<dyn AnyTable>>,
    removal_queue: Vec<EntityId>,
}

impl EcsManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_indices: Vec::new(),
            alive_count: 0,
            tables: HashMap::new(),
            removal_queue: Vec::new(),
        }
    }

    /// Creates a new entity and returns a builder for attaching components.
    pub fn spawn(&mut self, name: &str) -> EntityBuilder<'_> {
        let id = self.create_entity(name);
        EntityBuilder { manager: self, id }
    }

    /// Creates a new entity with the given debug name.
    pub fn create_entity(&mut self, name: &str) -> EntityId {
        let id = if let Some(index) = self.free_indices.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.alive = true;
            slot.name = name.to_owned();
            EntityId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(EntitySlot {
                generation: 0,
                alive: true,
                name: name.to_owned(),
            });
            EntityId::new(index, 0)
        };

        self.alive_count += 1;
        id
    }

    /// Checks whether an entity is alive (and the id is not stale).
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        if id.is_null() {
            return false;
        }
        self.slots
            .get(id.index() as usize)
            .is_some_and(|slot| slot.alive && slot.generation == id.generation())
    }

    /// Returns the entity's debug name.
    #[must_use]
    pub fn entity_name(&self, id: EntityId) -> Option<&str> {
        if !self.is_alive(id) {
            return None;
        }
        self.slots.get(id.index() as usize).map(|s| s.name.as_str())
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Attaches a component to an entity, replacing any existing value.
    ///
    /// Returns `false` if the entity is dead or the id stale.
    pub fn add_component<C: Component>(&mut self, id: EntityId, value: C) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        self.table_mut::<C>().insert(id, value);
        true
    }

    /// Gets a component by entity id.
    #[must_use]
    pub fn get_component<C: Component>(&self, id: EntityId) -> Option<&C> {
        self.table::<C>()?.get(id)
    }

    /// Gets a component mutably by entity id.
    pub fn get_component_mut<C: Component>(&mut self, id: EntityId) -> Option<&mut C> {
        self.tables
            .get_mut(&TypeId::of::<C>())?
            .as_any_mut()
            .downcast_mut::<ComponentTable<C>>()?
            .get_mut(id)
    }

    /// Checks whether an entity carries a component type.
    #[must_use]
    pub fn has_component<C: Component>(&self, id: EntityId) -> bool {
        self.get_component::<C>(id).is_some()
    }

    /// Detaches and returns a component from an entity.
    pub fn remove_component<C: Component>(&mut self, id: EntityId) -> Option<C> {
        self.tables
            .get_mut(&TypeId::of::<C>())?
            .as_any_mut()
            .downcast_mut::<ComponentTable<C>>()?
            .take(id)
    }

    /// Iterates over all `(EntityId, &C)` pairs, in entity index order.
    pub fn get_components<C: Component>(&self) -> impl Iterator<Item = (EntityId, &C)> {
        self.table::<C>().into_iter().flat_map(ComponentTable::iter)
    }

    /// Iterates mutably over all `(EntityId, &mut C)` pairs.
    pub fn get_components_mut<C: Component>(&mut self) -> impl Iterator<Item = (EntityId, &mut C)> {
        self.tables
            .get_mut(&TypeId::of::<C>())
            .and_then(|t| t.as_any_mut().downcast_mut::<ComponentTable<C>>())
            .into_iter()
            .flat_map(ComponentTable::iter_mut)
    }

    /// Collects the ids of all entities carrying a component type.
    ///
    /// Convenient for join-style loops that then mutate other tables.
    #[must_use]
    pub fn entities_with<C: Component>(&self) -> Vec<EntityId> {
        self.get_components::<C>().map(|(id, _)| id).collect()
    }

    /// Marks an entity for removal.
    ///
    /// Its components stay readable until the next safe point; the
    /// controller calls [`EcsManager::purge_removed`] between systems.
    pub fn remove_entity(&mut self, id: EntityId) {
        if self.is_alive(id) {
            self.removal_queue.push(id);
        }
    }

    /// Returns `true` if the entity is queued for removal at the next
    /// safe point.
    #[must_use]
    pub fn is_marked_for_removal(&self, id: EntityId) -> bool {
        self.removal_queue.contains(&id)
    }

    /// Purges all entities marked for removal.
    ///
    /// Called by the controller between system steps; atomically removes
    /// every component of each marked entity and frees its slot.
    pub fn purge_removed(&mut self) {
        if self.removal_queue.is_empty() {
            return;
        }
        let queue = std::mem::take(&mut self.removal_queue);
        for id in queue {
            if !self.is_alive(id) {
                // Marked twice, or removed and the slot already reused.
                continue;
            }
            for table in self.tables.values_mut() {
                table.purge(id);
            }
            let slot = &mut self.slots[id.index() as usize];
            slot.alive = false;
            self.free_indices.push(id.index());
            self.alive_count -= 1;
        }
    }

    /// Resolves the unique entity carrying the singleton component `C`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InternalInvariant`] if zero or more than one
    /// live entity carries `C`.
    pub fn get_singleton<C: Component>(&self) -> EngineResult<EntityId> {
        let mut found = None;
        for (id, _) in self.get_components::<C>() {
            if found.is_some() {
                return Err(EngineError::InternalInvariant(format!(
                    "singleton component {} present on more than one entity",
                    C::NAME
                )));
            }
            found = Some(id);
        }
        found.ok_or_else(|| {
            EngineError::InternalInvariant(format!("singleton component {} not found", C::NAME))
        })
    }

    /// Per-table component counts for diagnostics.
    #[must_use]
    pub fn component_counts(&self) -> Vec<(&'static str, usize)> {
        let mut counts: Vec<(&'static str, usize)> = self
            .tables
            .values()
            .map(|t| (t.component_name(), t.count()))
            .collect();
        counts.sort_unstable();
        counts
    }

    fn table<C: Component>(&self) -> Option<&ComponentTable<C>> {
        self.tables
            .get(&TypeId::of::<C>())?
            .as_any()
            .downcast_ref::<ComponentTable<C>>()
    }

    fn table_mut<C: Component>(&mut self) -> &mut ComponentTable<C> {
        self.tables
            .entry(TypeId::of::<C>())
            .or_insert_with(|| Box::new(ComponentTable::<C>::new()))
            .as_any_mut()
            .downcast_mut::<ComponentTable<C>>()
            .expect("table registered under its own TypeId")
    }
}

impl Default for EcsManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Chained component attachment for a freshly created entity.
///
/// ```rust,ignore
/// let camera = world
///     .spawn("camera")
///     .with(CameraComponent::default())
///     .with(MouseInputComponent::default())
///     .id();
/// ```
pub struct EntityBuilder<'a> {
    manager: &'a mut EcsManager,
    id: EntityId,
}

impl EntityBuilder<'_> {
    /// Attaches a component and continues the chain.
    #[must_use]
    pub fn with<C: Component>(self, value: C) -> Self {
        self.manager.add_component(self.id, value);
        self
    }

    /// Finishes the chain, returning the entity id.
    pub fn id(self) -> EntityId {
        self.id
    }
}
