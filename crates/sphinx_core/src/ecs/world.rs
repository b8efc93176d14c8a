//! # ECS World
//!
//! Ties the entity manager to the component registry. Entities record which
//! registry slot holds each of their components; the world resolves those
//! slots for typed and type-erased access.

use super::component::{Component, ComponentTypeId, FieldId};
use super::entity::{EntityId, StableEntityRef};
use super::manager::{EntityHandle, EntityManager};
use super::registry::ComponentRegistry;
use super::replication::{MutationContext, ReplicationSink};
use crate::error::{EcsError, EcsResult};
use crate::memory::PoolHandle;

/// All entities and components of one process.
///
/// # Example
///
/// ```rust
/// use sphinx_core::{CoordinateTransform, World};
///
/// let mut world = World::new();
/// world.register::<CoordinateTransform>();
///
/// let player = world.spawn().unwrap();
/// world.add_component::<CoordinateTransform>(player.id()).unwrap();
/// assert!(world.component::<CoordinateTransform>(player.id()).is_ok());
/// ```
#[derive(Debug, Default)]
pub struct World {
    entities: EntityManager,
    components: ComponentRegistry,
}

impl World {
    /// World with the default entity capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// World holding at most `capacity` live entities.
    #[must_use]
    pub fn with_entity_capacity(capacity: usize) -> Self {
        Self {
            entities: EntityManager::with_capacity(capacity),
            components: ComponentRegistry::new(),
        }
    }

    /// The entity manager.
    #[inline]
    #[must_use]
    pub const fn entities(&self) -> &EntityManager {
        &self.entities
    }

    /// The component registry.
    #[inline]
    #[must_use]
    pub const fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Registers a component type. See [`ComponentRegistry::register`].
    pub fn register<C: Component>(&mut self) -> ComponentTypeId {
        self.components.register::<C>()
    }

    /// Creates a local entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::PoolExhausted`] if the entity pool is full.
    pub fn spawn(&self) -> EcsResult<EntityHandle> {
        self.entities.create()
    }

    /// Creates an entity with a fresh network reference owned by `owner`.
    ///
    /// # Errors
    ///
    /// [`EcsError::PoolExhausted`] if the entity pool is full.
    pub fn spawn_networked(&self, owner: u32) -> EcsResult<EntityHandle> {
        self.entities.create_networked(owner)
    }

    /// Creates the local mirror of a remote entity.
    ///
    /// # Errors
    ///
    /// See [`EntityManager::create_mirror`].
    pub fn spawn_mirror(&self, stable_ref: StableEntityRef) -> EcsResult<EntityHandle> {
        self.entities.create_mirror(stable_ref)
    }

    /// Attaches a default-constructed `C` to `entity`.
    ///
    /// # Errors
    ///
    /// Fails if `C` is unregistered, the entity is not live, it already has a
    /// `C`, or `C`'s pool is full.
    pub fn add_component<C: Component>(&mut self, entity: EntityId) -> EcsResult<ComponentTypeId> {
        let type_id = self.require_type::<C>()?;
        self.add_component_by_id(entity, type_id)?;
        Ok(type_id)
    }

    /// Attaches a default-constructed component of `type_id` to `entity`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_component`].
    pub fn add_component_by_id(&mut self, entity: EntityId, type_id: ComponentTypeId) -> EcsResult<()> {
        let already = self
            .entities
            .with_entity(entity, |e| e.has_component(type_id))
            .ok_or(EcsError::UnknownEntity(entity))?;
        if already {
            return Err(EcsError::DuplicateComponent { entity, type_id });
        }

        let slot = self.components.construct(type_id, entity)?;
        let attached = self
            .entities
            .with_entity_mut(entity, |e| e.attach(type_id, slot))
            .is_some();
        if !attached {
            // Destroyed by another thread in between.
            self.components.release(type_id, slot);
            return Err(EcsError::UnknownEntity(entity));
        }
        Ok(())
    }

    /// Detaches and frees the component of `type_id`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownEntity`] or [`EcsError::UnknownComponent`].
    pub fn remove_component(&mut self, entity: EntityId, type_id: ComponentTypeId) -> EcsResult<()> {
        let slot = self
            .entities
            .with_entity_mut(entity, |e| e.detach(type_id))
            .ok_or(EcsError::UnknownEntity(entity))?
            .ok_or(EcsError::UnknownComponent { entity, type_id })?;
        self.components.release(type_id, slot);
        Ok(())
    }

    /// Component types attached to `entity`, ascending.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownEntity`] if the entity is not live.
    pub fn component_types(&self, entity: EntityId) -> EcsResult<Vec<ComponentTypeId>> {
        self.entities
            .with_entity(entity, |e| e.component_types().collect())
            .ok_or(EcsError::UnknownEntity(entity))
    }

    /// Copy of `entity`'s `C`.
    ///
    /// # Errors
    ///
    /// Fails if `C` is unregistered or the entity is missing it.
    pub fn component<C: Component>(&self, entity: EntityId) -> EcsResult<C> {
        let type_id = self.require_type::<C>()?;
        let slot = self.slot_of(entity, type_id)?;
        self.components
            .get::<C>(slot)
            .copied()
            .ok_or(EcsError::UnknownComponent { entity, type_id })
    }

    /// Runs `f` on `entity`'s `C`, sending dirty fields to `sink`.
    ///
    /// # Errors
    ///
    /// Fails if `C` is unregistered or the entity is missing it.
    pub fn mutate<C, R, F>(&mut self, entity: EntityId, sink: &mut dyn ReplicationSink, f: F) -> EcsResult<R>
    where
        C: Component,
        F: FnOnce(&mut C, &mut MutationContext<'_>) -> R,
    {
        let type_id = self.require_type::<C>()?;
        let value = self.typed_mut::<C>(entity, type_id)?;
        let mut ctx = MutationContext::replicated(entity, type_id, sink);
        Ok(f(value, &mut ctx))
    }

    /// Runs `f` on `entity`'s `C` without replicating anything.
    ///
    /// # Errors
    ///
    /// Fails if `C` is unregistered or the entity is missing it.
    pub fn mutate_local<C, R, F>(&mut self, entity: EntityId, f: F) -> EcsResult<R>
    where
        C: Component,
        F: FnOnce(&mut C, &mut MutationContext<'_>) -> R,
    {
        let type_id = self.require_type::<C>()?;
        let value = self.typed_mut::<C>(entity, type_id)?;
        let mut ctx = MutationContext::local(entity, type_id);
        Ok(f(value, &mut ctx))
    }

    /// Current bytes of one field.
    ///
    /// # Errors
    ///
    /// Fails on an unknown entity, component or field.
    pub fn read_field(&self, entity: EntityId, type_id: ComponentTypeId, field: FieldId) -> EcsResult<Vec<u8>> {
        let slot = self.slot_of(entity, type_id)?;
        self.components
            .read_field(type_id, slot, field)?
            .map(<[u8]>::to_vec)
            .ok_or(EcsError::UnknownComponent { entity, type_id })
    }

    /// Overwrites one field locally. Never replicates.
    ///
    /// # Errors
    ///
    /// Fails on an unknown entity or component, or a malformed field
    /// (see [`EcsError::is_malformed_field`]).
    pub fn apply_field(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        field: FieldId,
        bytes: &[u8],
    ) -> EcsResult<()> {
        let slot = self.slot_of(entity, type_id)?;
        if self.components.apply_field(type_id, slot, field, bytes)? {
            Ok(())
        } else {
            Err(EcsError::UnknownComponent { entity, type_id })
        }
    }

    /// Releases the component slots of entities destroyed since the last call.
    ///
    /// Returns how many entities were torn down.
    pub fn maintain(&mut self) -> usize {
        let destroyed = self.entities.drain_destroyed();
        for entity in &destroyed {
            for (type_id, slot) in entity.components() {
                self.components.release(type_id, slot);
            }
        }
        if !destroyed.is_empty() {
            tracing::trace!(count = destroyed.len(), "released components of destroyed entities");
        }
        destroyed.len()
    }

    fn require_type<C: Component>(&self) -> EcsResult<ComponentTypeId> {
        self.components
            .type_id_of::<C>()
            .ok_or(EcsError::UnregisteredComponent(C::NAME))
    }

    fn slot_of(&self, entity: EntityId, type_id: ComponentTypeId) -> EcsResult<PoolHandle> {
        self.entities
            .with_entity(entity, |e| e.component_slot(type_id))
            .ok_or(EcsError::UnknownEntity(entity))?
            .ok_or(EcsError::UnknownComponent { entity, type_id })
    }

    fn typed_mut<C: Component>(&mut self, entity: EntityId, type_id: ComponentTypeId) -> EcsResult<&mut C> {
        let slot = self.slot_of(entity, type_id)?;
        self.components
            .get_mut::<C>(slot)
            .ok_or(EcsError::UnknownComponent { entity, type_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{CoordinateTransform, DirtyField, Velocity};
    use sphinx_shared::{Coordinate, Vec3, Vec3Int};

    fn world() -> World {
        let mut world = World::with_entity_capacity(16);
        world.register::<CoordinateTransform>();
        world.register::<Velocity>();
        world
    }

    #[test]
    fn test_add_and_read_component() {
        let mut world = world();
        let e = world.spawn().unwrap();
        let type_id = world.add_component::<CoordinateTransform>(e.id()).unwrap();

        assert_eq!(world.component_types(e.id()).unwrap(), vec![type_id]);
        assert_eq!(
            world.component::<CoordinateTransform>(e.id()).unwrap(),
            CoordinateTransform::default()
        );
        assert_eq!(
            world.add_component::<CoordinateTransform>(e.id()),
            Err(EcsError::DuplicateComponent { entity: e.id(), type_id })
        );
        assert!(matches!(
            world.component::<Velocity>(e.id()),
            Err(EcsError::UnknownComponent { .. })
        ));
    }

    #[test]
    fn test_mutate_replicates_and_local_does_not() {
        let mut world = world();
        let e = world.spawn().unwrap();
        world.add_component::<Velocity>(e.id()).unwrap();

        let mut sink: Vec<DirtyField> = Vec::new();
        world
            .mutate::<Velocity, _, _>(e.id(), &mut sink, |v, ctx| {
                v.set_linear(Vec3::UP, ctx);
            })
            .unwrap();
        world
            .mutate_local::<Velocity, _, _>(e.id(), |v, ctx| {
                v.set_linear(Vec3::RIGHT, ctx);
            })
            .unwrap();

        assert_eq!(sink.len(), 1);
        assert_eq!(world.component::<Velocity>(e.id()).unwrap().linear(), Vec3::RIGHT);
    }

    #[test]
    fn test_apply_field_by_type_id() {
        let mut world = world();
        let e = world.spawn().unwrap();
        let type_id = world.add_component::<CoordinateTransform>(e.id()).unwrap();

        let target = Coordinate::new(Vec3Int::new(0, 1, 0), Vec3Int::ZERO, Vec3::ZERO);
        world
            .apply_field(e.id(), type_id, CoordinateTransform::POSITION, bytemuck::bytes_of(&target))
            .unwrap();
        assert_eq!(world.component::<CoordinateTransform>(e.id()).unwrap().position(), target);
        assert_eq!(
            world.read_field(e.id(), type_id, CoordinateTransform::POSITION).unwrap(),
            bytemuck::bytes_of(&target)
        );

        let err = world
            .apply_field(e.id(), type_id, CoordinateTransform::POSITION, &[0; 3])
            .unwrap_err();
        assert!(err.is_malformed_field());
    }

    #[test]
    fn test_maintain_releases_component_slots() {
        let mut world = world();
        let e = world.spawn().unwrap();
        let type_id = world.add_component::<CoordinateTransform>(e.id()).unwrap();
        assert_eq!(world.components().live_count(type_id), Some(1));

        let id = e.id();
        e.kill();
        drop(e);
        assert!(!world.entities().is_alive(id));

        assert_eq!(world.maintain(), 1);
        assert_eq!(world.components().live_count(type_id), Some(0));
        assert_eq!(world.maintain(), 0);
    }

    #[test]
    fn test_unregistered_component() {
        let mut world = World::with_entity_capacity(2);
        let e = world.spawn().unwrap();
        assert_eq!(
            world.add_component::<Velocity>(e.id()),
            Err(EcsError::UnregisteredComponent("Velocity"))
        );
    }
}
