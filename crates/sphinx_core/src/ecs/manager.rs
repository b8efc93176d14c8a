//! # Entity Manager
//!
//! The manager is the single point of truth for which entity identifiers are
//! live. It owns every entity it creates until that ownership is released,
//! and it hands out counted [`EntityHandle`]s for shared access.
//!
//! An entity is destroyed when the manager no longer owns it **and** no
//! handle to it remains. Only then does [`EntityManager::get`] stop finding
//! it and does its identifier become eligible for reuse.
//!
//! ## Thread Safety
//!
//! All state sits behind one `parking_lot::Mutex`, so create, get, release and
//! handle drops may race freely. Closures passed to
//! [`EntityManager::with_entity`] run under that lock and must not drop an
//! [`EntityHandle`].
//!
//! ## Teardown
//!
//! A destroyed entity still names component slots in the registry. The
//! manager queues it on a channel and the owning [`World`](super::World)
//! drains that queue in `maintain` to release those slots.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use sphinx_shared::MAX_ENTITY_COUNT;

use super::entity::{Entity, EntityId, StableEntityRef};
use crate::error::{EcsError, EcsResult};
use crate::memory::ObjectPool;

struct ManagerState {
    pool: ObjectPool<Entity>,
    owned: HashSet<EntityId>,
    /// Live handle count per entity. Absent means zero.
    handle_counts: HashMap<EntityId, usize>,
    by_stable_ref: HashMap<StableEntityRef, EntityId>,
    next_sequence: u32,
    destroyed: Sender<Entity>,
}

impl ManagerState {
    fn insert(&mut self, stable_ref: Option<StableEntityRef>) -> EcsResult<EntityId> {
        if let Some(r) = stable_ref {
            if self.by_stable_ref.contains_key(&r) {
                return Err(EcsError::DuplicateStableRef(r));
            }
        }

        let slot = self
            .pool
            .allocate_with(|slot| Entity::new(EntityId::from_slot(slot), stable_ref))
            .map_err(|full| {
                tracing::warn!(capacity = full.capacity, "entity pool exhausted");
                EcsError::PoolExhausted {
                    kind: "entity",
                    capacity: full.capacity,
                }
            })?;

        let id = EntityId::from_slot(slot);
        self.owned.insert(id);
        if let Some(r) = stable_ref {
            self.by_stable_ref.insert(r, id);
        }
        Ok(id)
    }

    fn acquire(&mut self, id: EntityId) {
        *self.handle_counts.entry(id).or_insert(0) += 1;
    }

    fn drop_handle(&mut self, id: EntityId) {
        match self.handle_counts.get_mut(&id) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.handle_counts.remove(&id);
                self.destroy_if_unreferenced(id);
            }
            None => {}
        }
    }

    fn destroy_if_unreferenced(&mut self, id: EntityId) {
        if self.owned.contains(&id) || self.handle_counts.contains_key(&id) {
            return;
        }
        let Some(entity) = self.pool.release(id.slot()) else {
            return;
        };
        if let Some(r) = entity.stable_ref() {
            self.by_stable_ref.remove(&r);
        }
        tracing::trace!(%id, "entity destroyed");
        // The receiver lives in the manager; after it is gone nobody needs teardown.
        let _ = self.destroyed.send(entity);
    }
}

/// Creates, tracks and destroys entities.
pub struct EntityManager {
    shared: Arc<Mutex<ManagerState>>,
    destroyed: Receiver<Entity>,
}

impl EntityManager {
    /// Manager with the default entity capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MAX_ENTITY_COUNT)
    }

    /// Manager that can hold `capacity` live entities.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or does not fit a `u32` identifier.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            u32::try_from(capacity).is_ok(),
            "entity capacity {capacity} exceeds the identifier range"
        );
        let (tx, rx) = crossbeam_channel::unbounded();
        let state = ManagerState {
            pool: ObjectPool::new(capacity),
            owned: HashSet::with_capacity(capacity),
            handle_counts: HashMap::new(),
            by_stable_ref: HashMap::new(),
            next_sequence: 0,
            destroyed: tx,
        };
        Self {
            shared: Arc::new(Mutex::new(state)),
            destroyed: rx,
        }
    }

    /// Creates a local entity owned by the manager.
    ///
    /// # Errors
    ///
    /// [`EcsError::PoolExhausted`] if the entity pool is full.
    pub fn create(&self) -> EcsResult<EntityHandle> {
        self.create_inner(|_| None)
    }

    /// Creates an entity and mints a fresh [`StableEntityRef`] for it under `owner`.
    ///
    /// # Errors
    ///
    /// [`EcsError::PoolExhausted`] if the entity pool is full.
    pub fn create_networked(&self, owner: u32) -> EcsResult<EntityHandle> {
        self.create_inner(|state| {
            let sequence = state.next_sequence;
            state.next_sequence = state.next_sequence.wrapping_add(1);
            Some(StableEntityRef::new(owner, sequence))
        })
    }

    /// Creates the local mirror of an entity another process announced.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateStableRef`] if `stable_ref` is already bound, or
    /// [`EcsError::PoolExhausted`] if the entity pool is full.
    pub fn create_mirror(&self, stable_ref: StableEntityRef) -> EcsResult<EntityHandle> {
        self.create_inner(|_| Some(stable_ref))
    }

    fn create_inner<F>(&self, stable_ref: F) -> EcsResult<EntityHandle>
    where
        F: FnOnce(&mut ManagerState) -> Option<StableEntityRef>,
    {
        let mut state = self.shared.lock();
        let stable_ref = stable_ref(&mut state);
        let id = state.insert(stable_ref)?;
        state.acquire(id);
        drop(state);

        tracing::trace!(%id, ?stable_ref, "entity created");
        Ok(EntityHandle {
            id,
            shared: Arc::clone(&self.shared),
        })
    }

    /// A new handle to a live entity, or `None` once it has been destroyed.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<EntityHandle> {
        let mut state = self.shared.lock();
        if !state.pool.is_live(id.slot()) {
            return None;
        }
        state.acquire(id);
        Some(EntityHandle {
            id,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Gives up the manager's ownership of `id`.
    ///
    /// The entity is destroyed now if no handle to it exists, otherwise when
    /// the last handle drops.
    ///
    /// # Panics
    ///
    /// Panics if the manager does not own `id`. Releasing twice is a bug.
    pub fn release(&self, id: EntityId) {
        let mut state = self.shared.lock();
        assert!(
            state.owned.remove(&id),
            "released {id}, which the entity manager does not own"
        );
        state.destroy_if_unreferenced(id);
    }

    /// True while `id` names a live entity.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.shared.lock().pool.is_live(id.slot())
    }

    /// True while the manager still owns `id`.
    #[must_use]
    pub fn is_owned(&self, id: EntityId) -> bool {
        self.shared.lock().owned.contains(&id)
    }

    /// Number of live handles to `id`.
    #[must_use]
    pub fn handle_count(&self, id: EntityId) -> usize {
        self.shared.lock().handle_counts.get(&id).copied().unwrap_or(0)
    }

    /// Live entity count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.lock().pool.live_count()
    }

    /// True if no entity is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum live entity count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.lock().pool.capacity()
    }

    /// Live entity identifiers, ascending.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.shared.lock().pool.iter().map(|(_, e)| e.id()).collect()
    }

    /// Local identifier bound to a network reference.
    #[must_use]
    pub fn resolve(&self, stable_ref: StableEntityRef) -> Option<EntityId> {
        self.shared.lock().by_stable_ref.get(&stable_ref).copied()
    }

    /// Network reference of a live entity, if it has one.
    #[must_use]
    pub fn stable_ref_of(&self, id: EntityId) -> Option<StableEntityRef> {
        self.with_entity(id, Entity::stable_ref).flatten()
    }

    /// Runs `f` on a live entity under the manager lock.
    pub fn with_entity<R>(&self, id: EntityId, f: impl FnOnce(&Entity) -> R) -> Option<R> {
        self.shared.lock().pool.get(id.slot()).map(f)
    }

    pub(crate) fn with_entity_mut<R>(
        &self,
        id: EntityId,
        f: impl FnOnce(&mut Entity) -> R,
    ) -> Option<R> {
        self.shared.lock().pool.get_mut(id.slot()).map(f)
    }

    /// Entities destroyed since the last drain, in destruction order.
    #[must_use]
    pub fn drain_destroyed(&self) -> Vec<Entity> {
        self.destroyed.try_iter().collect()
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("EntityManager")
            .field("live", &state.pool.live_count())
            .field("capacity", &state.pool.capacity())
            .field("owned", &state.owned.len())
            .finish()
    }
}

/// Counted shared reference to a live entity.
///
/// While any handle exists the entity stays alive. Cloning adds a reference,
/// dropping removes one.
pub struct EntityHandle {
    id: EntityId,
    shared: Arc<Mutex<ManagerState>>,
}

impl EntityHandle {
    /// Identifier of the referenced entity.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Network reference of the entity, if it has one.
    #[must_use]
    pub fn stable_ref(&self) -> Option<StableEntityRef> {
        self.shared
            .lock()
            .pool
            .get(self.id.slot())
            .and_then(Entity::stable_ref)
    }

    /// Gives up the manager's ownership so the entity dies with its last handle.
    ///
    /// Returns `false` if the manager had already released it.
    pub fn kill(&self) -> bool {
        let mut state = self.shared.lock();
        let was_owned = state.owned.remove(&self.id);
        if was_owned {
            state.destroy_if_unreferenced(self.id);
        }
        was_owned
    }
}

impl Clone for EntityHandle {
    fn clone(&self) -> Self {
        self.shared.lock().acquire(self.id);
        Self {
            id: self.id,
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for EntityHandle {
    fn drop(&mut self) {
        self.shared.lock().drop_handle(self.id);
    }
}

impl PartialEq for EntityHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for EntityHandle {}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityHandle").field(&self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_get_release() {
        let manager = EntityManager::with_capacity(8);
        let handle = manager.create().unwrap();
        let id = handle.id();
        drop(handle);

        // Still owned by the manager
        assert!(manager.is_alive(id));
        assert!(manager.get(id).is_some());

        manager.release(id);
        assert!(!manager.is_alive(id));
        assert!(manager.get(id).is_none());
        assert_eq!(manager.drain_destroyed().len(), 1);
    }

    #[test]
    fn test_outstanding_handle_defers_destruction() {
        let manager = EntityManager::with_capacity(8);
        let handle = manager.create().unwrap();
        let id = handle.id();

        manager.release(id);
        assert!(manager.is_alive(id));
        assert!(manager.drain_destroyed().is_empty());

        let second = handle.clone();
        assert_eq!(manager.handle_count(id), 2);
        drop(handle);
        assert!(manager.is_alive(id));

        drop(second);
        assert!(!manager.is_alive(id));
        assert_eq!(manager.drain_destroyed()[0].id(), id);
    }

    #[test]
    fn test_identifier_reuse_is_lowest_first() {
        let manager = EntityManager::with_capacity(4);
        let ids: Vec<_> = (0..3).map(|_| manager.create().unwrap().id()).collect();
        assert_eq!(ids, vec![EntityId::new(0), EntityId::new(1), EntityId::new(2)]);

        manager.release(ids[1]);
        manager.release(ids[0]);
        assert_eq!(manager.create().unwrap().id(), EntityId::new(0));
        assert_eq!(manager.create().unwrap().id(), EntityId::new(1));
    }

    #[test]
    fn test_exhaustion() {
        let manager = EntityManager::with_capacity(1);
        let _only = manager.create().unwrap();
        assert_eq!(
            manager.create(),
            Err(EcsError::PoolExhausted {
                kind: "entity",
                capacity: 1
            })
        );
    }

    #[test]
    #[should_panic(expected = "does not own")]
    fn test_double_release_panics() {
        let manager = EntityManager::with_capacity(2);
        let id = manager.create().unwrap().id();
        manager.release(id);
        manager.release(id);
    }

    #[test]
    fn test_networked_refs_are_unique_and_resolvable() {
        let manager = EntityManager::with_capacity(4);
        let a = manager.create_networked(7).unwrap();
        let b = manager.create_networked(7).unwrap();

        let (ra, rb) = (a.stable_ref().unwrap(), b.stable_ref().unwrap());
        assert_ne!(ra, rb);
        assert_eq!(manager.resolve(ra), Some(a.id()));
        assert_eq!(manager.stable_ref_of(b.id()), Some(rb));

        let a_id = a.id();
        assert!(a.kill());
        drop(a);
        assert_eq!(manager.resolve(ra), None);
        assert!(!manager.is_alive(a_id));
    }

    #[test]
    fn test_mirror_rejects_duplicate_ref() {
        let manager = EntityManager::with_capacity(4);
        let r = StableEntityRef::new(StableEntityRef::SERVER_OWNER, 3);
        let _first = manager.create_mirror(r).unwrap();
        assert_eq!(manager.create_mirror(r), Err(EcsError::DuplicateStableRef(r)));
    }
}
