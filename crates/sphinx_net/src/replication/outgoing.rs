//! Outgoing replication queue.

use std::collections::HashMap;

use sphinx_core::{ComponentTypeId, EntityId, EntityManager, FieldId, ReplicationSink};
use sphinx_shared::MAX_PACKET_SIZE;

use crate::protocol::{EcsReplicate, FieldUpdate};

struct PendingReplicate {
    entity: EntityId,
    type_id: ComponentTypeId,
    fields: Vec<FieldUpdate>,
}

/// Dirty fields awaiting the next flush.
///
/// Batches are kept in the order their first field arrived; fields within a
/// batch keep mutation order, repeats included.
#[derive(Default)]
pub struct ReplicationQueue {
    pending: Vec<PendingReplicate>,
    index: HashMap<(EntityId, ComponentTypeId), usize>,
}

impl ReplicationQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending (entity, component) batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total pending field updates.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.pending.iter().map(|p| p.fields.len()).sum()
    }

    /// Discards everything pending.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.index.clear();
    }

    /// Drops every batch pending for `entity`.
    ///
    /// Must run before `entity` is released: the pool hands its id to the
    /// next spawn, and a batch left behind would be sent under the new
    /// entity's reference.
    pub fn discard(&mut self, entity: EntityId) {
        let before = self.pending.len();
        self.pending.retain(|pending| pending.entity != entity);
        if self.pending.len() == before {
            return;
        }
        tracing::trace!(%entity, batches = before - self.pending.len(), "discarded pending updates");
        self.index = self
            .pending
            .iter()
            .enumerate()
            .map(|(slot, pending)| ((pending.entity, pending.type_id), slot))
            .collect();
    }

    /// Drains the queue into packets addressed by stable reference.
    ///
    /// Batches whose entity has died or was never networked are dropped.
    /// Batches too large for one datagram are split.
    pub fn flush(&mut self, entities: &EntityManager) -> Vec<EcsReplicate> {
        self.index.clear();
        let mut packets = Vec::with_capacity(self.pending.len());
        for pending in self.pending.drain(..) {
            let Some(stable_ref) = entities.stable_ref_of(pending.entity) else {
                tracing::debug!(
                    entity = %pending.entity,
                    fields = pending.fields.len(),
                    "dropping updates for entity without a network reference"
                );
                continue;
            };
            let packet = EcsReplicate {
                entity: stable_ref,
                type_id: pending.type_id,
                fields: pending.fields,
            };
            packets.extend(packet.split_to_fit(MAX_PACKET_SIZE));
        }
        packets
    }
}

impl ReplicationSink for ReplicationQueue {
    fn push_field(&mut self, entity: EntityId, type_id: ComponentTypeId, field: FieldId, bytes: &[u8]) {
        let slot = *self.index.entry((entity, type_id)).or_insert_with(|| {
            self.pending.push(PendingReplicate {
                entity,
                type_id,
                fields: Vec::new(),
            });
            self.pending.len() - 1
        });
        self.pending[slot].fields.push(FieldUpdate {
            field,
            bytes: bytes.to_vec(),
        });
    }
}

impl std::fmt::Debug for ReplicationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationQueue")
            .field("batches", &self.pending.len())
            .field("fields", &self.field_count())
            .finish()
    }
}
