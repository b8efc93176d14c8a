//! Client session mirroring the server's world.

use std::collections::BTreeSet;
use std::time::Duration;

use sphinx_core::{Component, ComponentTypeId, EcsError, EntityId, MutationContext, StableEntityRef, World};

use crate::config::NetConfig;
use crate::error::{NetError, NetResult};
use crate::events::NetworkEvent;
use crate::identity::NetId;
use crate::interface::NetworkInterface;
use crate::protocol::{EcsReplicate, Packet};
use crate::replication::{apply_replicate, ReplicationQueue};
use crate::transport::Transport;

/// Client side of a replicated world.
///
/// Entities exist here only as mirrors of server entities. Local writes
/// through [`Self::mutate`] are sent to the server, which may reject them.
pub struct ClientSession<T: Transport> {
    net: NetworkInterface<T>,
    world: World,
    outgoing: ReplicationQueue,
    mirrors: BTreeSet<EntityId>,
    local_player: Option<EntityId>,
}

impl<T: Transport> ClientSession<T> {
    /// Client over `transport`. `world` must register the same component
    /// types in the same order as the server's.
    #[must_use]
    pub fn new(transport: T, config: &NetConfig, world: World) -> Self {
        Self {
            net: NetworkInterface::new(transport, config),
            world,
            outgoing: ReplicationQueue::new(),
            mirrors: BTreeSet::new(),
            local_player: None,
        }
    }

    /// Runs one tick. Returns the lifecycle events it observed.
    ///
    /// # Errors
    ///
    /// An encoding error while flushing. Bad server packets are logged and
    /// dropped.
    pub fn update(&mut self, delta: Duration) -> NetResult<Vec<NetworkEvent>> {
        self.net.update(delta);
        let events = self.net.drain_events();
        if events
            .iter()
            .any(|e| matches!(e, NetworkEvent::ConnectionClosed { .. }))
        {
            self.clear_mirrors();
        }

        for (_, packet) in self.net.take_received() {
            match packet {
                Packet::EntitySpawn {
                    entity,
                    owner,
                    components,
                } => self.on_spawn(entity, owner, &components),
                Packet::EntityDespawn { entity } => self.on_despawn(entity),
                Packet::EcsReplicate(replicate) => self.on_replicate(&replicate),
                Packet::NetIdAssigned { .. } | Packet::PeerStatus { .. } => {}
            }
        }

        self.world.maintain();
        self.flush()?;
        Ok(events)
    }

    fn on_spawn(&mut self, entity: StableEntityRef, owner: NetId, components: &[ComponentTypeId]) {
        let id = match self.world.entities().resolve(entity) {
            Some(id) => id,
            None => match self.world.spawn_mirror(entity) {
                Ok(handle) => handle.id(),
                Err(e) => {
                    tracing::warn!(%entity, error = %e, "could not mirror entity");
                    return;
                }
            },
        };
        self.mirrors.insert(id);

        for type_id in components {
            match self.world.add_component_by_id(id, *type_id) {
                Ok(()) | Err(EcsError::DuplicateComponent { .. }) => {}
                Err(e) => tracing::warn!(%entity, %type_id, error = %e, "could not mirror component"),
            }
        }

        if Some(owner) == self.net.local_net_id() {
            tracing::debug!(%entity, local = %id, "local player mirrored");
            self.local_player = Some(id);
        }
    }

    fn on_despawn(&mut self, entity: StableEntityRef) {
        let Some(id) = self.world.entities().resolve(entity) else {
            return;
        };
        if self.mirrors.remove(&id) {
            self.outgoing.discard(id);
            self.world.entities().release(id);
        }
        if self.local_player == Some(id) {
            self.local_player = None;
        }
    }

    fn on_replicate(&mut self, replicate: &EcsReplicate) {
        match apply_replicate(&mut self.world, replicate) {
            Ok(report) if report.rejected > 0 => {
                tracing::debug!(entity = %replicate.entity, rejected = report.rejected, "malformed fields skipped");
            }
            Ok(_) => {}
            Err(NetError::UnknownEntity(entity)) => {
                tracing::debug!(%entity, "update for unknown entity dropped");
            }
            Err(e) => tracing::debug!(entity = %replicate.entity, error = %e, "update dropped"),
        }
    }

    fn clear_mirrors(&mut self) {
        for id in std::mem::take(&mut self.mirrors) {
            if self.world.entities().is_owned(id) {
                self.world.entities().release(id);
            }
        }
        self.local_player = None;
        self.outgoing.clear();
    }

    /// Runs `f` on `id`'s `C`, queueing dirty fields for the server.
    ///
    /// # Errors
    ///
    /// See [`World::mutate`].
    pub fn mutate<C, R, F>(&mut self, id: EntityId, f: F) -> NetResult<R>
    where
        C: Component,
        F: FnOnce(&mut C, &mut MutationContext<'_>) -> R,
    {
        Ok(self.world.mutate(id, &mut self.outgoing, f)?)
    }

    /// Sends queued diffs to the server. Dropped if not connected.
    ///
    /// # Errors
    ///
    /// An encoding error.
    pub fn flush(&mut self) -> NetResult<()> {
        if self.outgoing.is_empty() {
            return Ok(());
        }
        let Some(server) = self.net.connection_for(NetId::SERVER) else {
            self.outgoing.clear();
            return Ok(());
        };
        let packets: Vec<_> = self
            .outgoing
            .flush(self.world.entities())
            .into_iter()
            .map(Packet::EcsReplicate)
            .collect();
        self.net.send_packets(server, &packets)
    }

    /// This client's player entity, once the server has announced it.
    #[inline]
    #[must_use]
    pub const fn local_player(&self) -> Option<EntityId> {
        self.local_player
    }

    /// This client's netId, once assigned.
    #[must_use]
    pub const fn local_net_id(&self) -> Option<NetId> {
        self.net.local_net_id()
    }

    /// Local entity mirroring a server entity.
    #[must_use]
    pub fn mirror_of(&self, entity: StableEntityRef) -> Option<EntityId> {
        self.world.entities().resolve(entity)
    }

    /// Number of mirrored entities.
    #[must_use]
    pub fn mirror_count(&self) -> usize {
        self.mirrors.len()
    }

    /// The mirrored world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// The world, for changes that should not replicate.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The network interface.
    #[must_use]
    pub const fn net(&self) -> &NetworkInterface<T> {
        &self.net
    }

    /// The network interface, mutably.
    pub fn net_mut(&mut self) -> &mut NetworkInterface<T> {
        &mut self.net
    }
}

impl<T: Transport> std::fmt::Debug for ClientSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("net", &self.net)
            .field("mirrors", &self.mirrors.len())
            .field("local_player", &self.local_player)
            .finish_non_exhaustive()
    }
}
