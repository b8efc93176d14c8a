//! # Entities
//!
//! An entity is an identifier plus the set of component slots attached to it.
//! The identifier is the entity's slot in the manager's pool, so it is dense
//! and gets reused once the entity is destroyed.
//!
//! Identifiers are process-local. Entities that cross the network also carry
//! a [`StableEntityRef`], which every process agrees on.

use std::collections::BTreeMap;
use std::fmt;

use bytemuck::{Pod, Zeroable};

use super::component::ComponentTypeId;
use crate::memory::PoolHandle;

/// Process-local entity identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Wraps a raw identifier.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw identifier value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Pool slot this identifier names.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn from_slot(slot: PoolHandle) -> Self {
        Self(slot.index() as u32)
    }

    pub(crate) const fn slot(self) -> PoolHandle {
        PoolHandle::from_index(self.0 as usize)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Cross-process name for a networked entity.
///
/// `owner` is the network id of the process that created it and `sequence`
/// is unique per owner, so two processes never mint the same reference.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
pub struct StableEntityRef {
    /// Network id of the creating process.
    pub owner: u32,
    /// Per-owner sequence number.
    pub sequence: u32,
}

impl StableEntityRef {
    /// Owner value used for entities the server creates.
    pub const SERVER_OWNER: u32 = u32::MAX;

    /// Creates a reference.
    #[inline]
    #[must_use]
    pub const fn new(owner: u32, sequence: u32) -> Self {
        Self { owner, sequence }
    }
}

impl fmt::Display for StableEntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner, self.sequence)
    }
}

/// A live entity as stored by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    id: EntityId,
    stable_ref: Option<StableEntityRef>,
    components: BTreeMap<ComponentTypeId, PoolHandle>,
}

impl Entity {
    pub(crate) fn new(id: EntityId, stable_ref: Option<StableEntityRef>) -> Self {
        Self {
            id,
            stable_ref,
            components: BTreeMap::new(),
        }
    }

    /// Local identifier.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Network reference, if the entity is replicated.
    #[inline]
    #[must_use]
    pub const fn stable_ref(&self) -> Option<StableEntityRef> {
        self.stable_ref
    }

    /// True if a component of `type_id` is attached.
    #[must_use]
    pub fn has_component(&self, type_id: ComponentTypeId) -> bool {
        self.components.contains_key(&type_id)
    }

    /// Registry slot of the attached component of `type_id`.
    #[must_use]
    pub fn component_slot(&self, type_id: ComponentTypeId) -> Option<PoolHandle> {
        self.components.get(&type_id).copied()
    }

    /// Attached component types, ascending.
    pub fn component_types(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.components.keys().copied()
    }

    /// Attached components as (type, registry slot), ascending by type.
    pub fn components(&self) -> impl Iterator<Item = (ComponentTypeId, PoolHandle)> + '_ {
        self.components.iter().map(|(t, s)| (*t, *s))
    }

    pub(crate) fn attach(&mut self, type_id: ComponentTypeId, slot: PoolHandle) {
        self.components.insert(type_id, slot);
    }

    pub(crate) fn detach(&mut self, type_id: ComponentTypeId) -> Option<PoolHandle> {
        self.components.remove(&type_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_roundtrips_slot() {
        let id = EntityId::new(17);
        assert_eq!(id.slot().index(), 17);
        assert_eq!(EntityId::from_slot(id.slot()), id);
        assert_eq!(id.to_string(), "entity#17");
    }

    #[test]
    fn test_attach_detach() {
        let mut entity = Entity::new(EntityId::new(0), None);
        let t = ComponentTypeId::new(3);
        assert!(!entity.has_component(t));

        entity.attach(t, PoolHandle::from_index(5));
        assert_eq!(entity.component_slot(t), Some(PoolHandle::from_index(5)));
        assert_eq!(entity.component_types().collect::<Vec<_>>(), vec![t]);

        assert_eq!(entity.detach(t), Some(PoolHandle::from_index(5)));
        assert!(!entity.has_component(t));
    }

    #[test]
    fn test_stable_ref_wire_size() {
        assert_eq!(std::mem::size_of::<StableEntityRef>(), 8);
        assert_eq!(StableEntityRef::new(4, 9).to_string(), "4:9");
    }
}
