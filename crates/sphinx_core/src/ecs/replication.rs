//! # Mutation Context
//!
//! Component mutators take a [`MutationContext`]. A mutator always applies
//! its change locally first; then, if the context carries a
//! [`ReplicationSink`], it marks the changed field dirty so the sink can
//! batch it for the network.
//!
//! The sink is passed in explicitly. Mutating without one is a purely local
//! change, which is what a process does when applying updates it received.

use super::component::{Component, ComponentTypeId, FieldId};
use super::entity::EntityId;

/// Receives dirty fields from component mutators.
pub trait ReplicationSink {
    /// Records that `field` of the `type_id` component on `entity` now holds `bytes`.
    fn push_field(&mut self, entity: EntityId, type_id: ComponentTypeId, field: FieldId, bytes: &[u8]);
}

/// One dirty field, as recorded by the `Vec` sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirtyField {
    /// Mutated entity.
    pub entity: EntityId,
    /// Component type.
    pub type_id: ComponentTypeId,
    /// Field id.
    pub field: FieldId,
    /// Field bytes after the mutation.
    pub bytes: Vec<u8>,
}

impl ReplicationSink for Vec<DirtyField> {
    fn push_field(&mut self, entity: EntityId, type_id: ComponentTypeId, field: FieldId, bytes: &[u8]) {
        self.push(DirtyField {
            entity,
            type_id,
            field,
            bytes: bytes.to_vec(),
        });
    }
}

/// Handed to component mutators: which component is changing, and where its
/// dirty fields go.
pub struct MutationContext<'a> {
    entity: EntityId,
    type_id: ComponentTypeId,
    sink: Option<&'a mut dyn ReplicationSink>,
}

impl<'a> MutationContext<'a> {
    /// Context that forwards dirty fields to `sink`.
    #[must_use]
    pub fn replicated(entity: EntityId, type_id: ComponentTypeId, sink: &'a mut dyn ReplicationSink) -> Self {
        Self {
            entity,
            type_id,
            sink: Some(sink),
        }
    }

    /// Context for a purely local change.
    #[must_use]
    pub fn local(entity: EntityId, type_id: ComponentTypeId) -> Self {
        Self {
            entity,
            type_id,
            sink: None,
        }
    }

    /// The entity being mutated.
    #[inline]
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// The component type being mutated.
    #[inline]
    #[must_use]
    pub const fn type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    /// True if this mutation should be sent to other processes.
    #[inline]
    #[must_use]
    pub fn should_replicate(&self) -> bool {
        self.sink.is_some()
    }

    /// Pushes the current bytes of `field` to the sink, if there is one.
    ///
    /// # Panics
    ///
    /// Panics if `C` does not declare `field`.
    pub fn mark_dirty<C: Component>(&mut self, component: &C, field: FieldId) {
        let Some(sink) = self.sink.as_deref_mut() else {
            return;
        };
        let Some(descriptor) = C::field(field) else {
            panic!("{} declares no field {field}", C::NAME);
        };
        let bytes = &bytemuck::bytes_of(component)[descriptor.range()];
        sink.push_field(self.entity, self.type_id, field, bytes);
    }
}
