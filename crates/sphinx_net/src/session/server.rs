//! Authoritative server session.

use std::collections::BTreeMap;
use std::time::Duration;

use sphinx_core::{
    Component, ComponentTypeId, CoordinateTransform, EcsError, EntityId, MutationContext, StableEntityRef,
    World,
};

use crate::config::NetConfig;
use crate::error::{NetError, NetResult};
use crate::events::NetworkEvent;
use crate::identity::{ConnectionHandle, NetId, PeerStatus};
use crate::interface::NetworkInterface;
use crate::protocol::{EcsReplicate, Packet};
use crate::replication::{apply_replicate, collect_fields, full_state, ReplicationQueue};
use crate::transport::Transport;

/// Server side of a replicated world.
pub struct ServerSession<T: Transport> {
    net: NetworkInterface<T>,
    world: World,
    outgoing: ReplicationQueue,
    players: BTreeMap<NetId, EntityId>,
    pending_spawns: Vec<EntityId>,
    pending_despawns: Vec<StableEntityRef>,
    broadcast_to_origin: bool,
}

impl<T: Transport> ServerSession<T> {
    /// Server over `transport`. Registers [`CoordinateTransform`] if `world`
    /// has not already, since every player entity carries one.
    #[must_use]
    pub fn new(transport: T, config: &NetConfig, mut world: World) -> Self {
        if world.components().type_id_of::<CoordinateTransform>().is_none() {
            world.register::<CoordinateTransform>();
        }
        Self {
            net: NetworkInterface::new(transport, config),
            world,
            outgoing: ReplicationQueue::new(),
            players: BTreeMap::new(),
            pending_spawns: Vec::new(),
            pending_despawns: Vec::new(),
            broadcast_to_origin: config.broadcast_to_origin,
        }
    }

    /// Runs one tick. Returns the lifecycle events it observed.
    ///
    /// # Errors
    ///
    /// An encoding error while flushing. Failures tied to one client, such as
    /// a join that cannot complete or a bad packet, are logged and that client
    /// alone is affected.
    pub fn update(&mut self, delta: Duration) -> NetResult<Vec<NetworkEvent>> {
        self.net.update(delta);
        let mut events = self.net.drain_events();
        for event in &events {
            match *event {
                NetworkEvent::ConnectionEstablished { connection, net_id } => {
                    if let Err(e) = self.on_joined(connection, net_id) {
                        tracing::warn!(%net_id, error = %e, "join failed, dropping client");
                        self.destroy_player(net_id);
                        if let Err(e) = self.net.close_connection(net_id) {
                            tracing::debug!(%net_id, error = %e, "connection already gone");
                        }
                    }
                }
                NetworkEvent::ConnectionClosed { net_id, .. } => self.destroy_player(net_id),
                NetworkEvent::NetIdReceived { .. } | NetworkEvent::PeerStatusChanged { .. } => {}
            }
        }

        for (from, packet) in self.net.take_received() {
            match packet {
                Packet::EcsReplicate(replicate) => {
                    if let Err(e) = self.accept_client_update(from, &replicate) {
                        tracing::warn!(%from, error = %e, "client update not relayed");
                    }
                }
                other => {
                    tracing::warn!(%from, packet_type = ?other.packet_type(), "ignoring packet clients may not send");
                }
            }
        }

        self.flush()?;
        self.world.maintain();
        events.extend(self.net.drain_events());
        Ok(events)
    }

    fn on_joined(&mut self, connection: ConnectionHandle, net_id: NetId) -> NetResult<()> {
        let player = self.associate_player(net_id)?;

        let mut snapshot = Vec::new();
        for id in self.world.entities().ids() {
            if id == player || self.pending_spawns.contains(&id) {
                continue;
            }
            snapshot.extend(self.spawn_packets(id)?);
        }
        tracing::debug!(%net_id, packets = snapshot.len(), "sending world snapshot");
        self.net.send_packets(connection, &snapshot)?;
        self.net.set_peer_status(net_id, PeerStatus::Authenticated)
    }

    /// Creates the player entity for `net_id`. It is announced on the next flush.
    ///
    /// # Errors
    ///
    /// Pool exhaustion.
    pub fn associate_player(&mut self, net_id: NetId) -> NetResult<EntityId> {
        let id = self.spawn_entity()?;
        if let Err(e) = self.world.add_component::<CoordinateTransform>(id) {
            self.pending_spawns.retain(|pending| *pending != id);
            self.world.entities().release(id);
            return Err(e.into());
        }
        self.players.insert(net_id, id);
        tracing::info!(%net_id, entity = %id, "player associated");
        Ok(id)
    }

    /// Destroys the player entity of `net_id`, if it has one.
    pub fn destroy_player(&mut self, net_id: NetId) {
        let Some(id) = self.players.remove(&net_id) else {
            return;
        };
        tracing::info!(%net_id, entity = %id, "player destroyed");
        if let Err(e) = self.despawn(id) {
            tracing::warn!(%net_id, error = %e, "player entity was already gone");
        }
    }

    /// Creates a networked world entity. It is announced on the next flush.
    ///
    /// # Errors
    ///
    /// Pool exhaustion.
    pub fn spawn_entity(&mut self) -> NetResult<EntityId> {
        let id = self.world.spawn_networked(StableEntityRef::SERVER_OWNER)?.id();
        self.pending_spawns.push(id);
        Ok(id)
    }

    /// Attaches a default `C` to `id`. Clients learn of it on the next flush.
    ///
    /// # Errors
    ///
    /// See [`World::add_component`].
    pub fn add_component<C: Component>(&mut self, id: EntityId) -> NetResult<ComponentTypeId> {
        let type_id = self.world.add_component::<C>(id)?;
        if !self.pending_spawns.contains(&id) && self.world.entities().stable_ref_of(id).is_some() {
            self.pending_spawns.push(id);
        }
        Ok(type_id)
    }

    /// Releases `id`. Clients drop their mirror on the next flush.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownEntity`] if the manager no longer owns `id`.
    pub fn despawn(&mut self, id: EntityId) -> NetResult<()> {
        if !self.world.entities().is_owned(id) {
            return Err(EcsError::UnknownEntity(id).into());
        }
        let stable_ref = self.world.entities().stable_ref_of(id);
        self.outgoing.discard(id);
        self.world.entities().release(id);
        self.players.retain(|_, player| *player != id);
        self.pending_spawns.retain(|pending| *pending != id);
        if let Some(stable_ref) = stable_ref {
            self.pending_despawns.push(stable_ref);
        }
        Ok(())
    }

    /// Runs `f` on `id`'s `C`, queueing dirty fields for broadcast.
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

    /// Disconnects a client. Its player is destroyed once the close is seen.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidNetId`] if `net_id` is not connected.
    pub fn kick(&mut self, net_id: NetId) -> NetResult<()> {
        self.net.close_connection(net_id)
    }

    /// Player entity of a connected client.
    #[must_use]
    pub fn player_of(&self, net_id: NetId) -> Option<EntityId> {
        self.players.get(&net_id).copied()
    }

    /// The replicated world.
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

    /// Broadcasts queued spawns, then field diffs, then despawns.
    ///
    /// # Errors
    ///
    /// An encoding error.
    pub fn flush(&mut self) -> NetResult<()> {
        let mut packets = Vec::new();
        for id in std::mem::take(&mut self.pending_spawns) {
            if self.world.entities().is_alive(id) {
                packets.extend(self.spawn_packets(id)?);
            }
        }
        packets.extend(
            self.outgoing
                .flush(self.world.entities())
                .into_iter()
                .map(Packet::EcsReplicate),
        );
        packets.extend(
            self.pending_despawns
                .drain(..)
                .map(|entity| Packet::EntityDespawn { entity }),
        );
        if packets.is_empty() {
            return Ok(());
        }
        let reached = self.net.broadcast_packets(&packets, &[])?;
        tracing::trace!(packets = packets.len(), clients = reached, "flushed replication");
        Ok(())
    }

    fn spawn_packets(&self, id: EntityId) -> NetResult<Vec<Packet>> {
        let Some(entity) = self.world.entities().stable_ref_of(id) else {
            return Ok(Vec::new());
        };
        let owner = self
            .players
            .iter()
            .find(|(_, player)| **player == id)
            .map_or(NetId::SERVER, |(net_id, _)| *net_id);

        let mut packets = vec![Packet::EntitySpawn {
            entity,
            owner,
            components: self.world.component_types(id)?,
        }];
        packets.extend(full_state(&self.world, id)?.into_iter().map(Packet::EcsReplicate));
        Ok(packets)
    }

    fn accept_client_update(&mut self, from: NetId, replicate: &EcsReplicate) -> NetResult<()> {
        let Some(entity) = self.world.entities().resolve(replicate.entity) else {
            tracing::debug!(%from, entity = %replicate.entity, "update for unknown entity dropped");
            return Ok(());
        };
        if self.players.get(&from) != Some(&entity) {
            tracing::warn!(%from, entity = %replicate.entity, "rejected update for entity the client does not own");
            return Ok(());
        }

        let report = match apply_replicate(&mut self.world, replicate) {
            Ok(report) => report,
            Err(e) => {
                tracing::debug!(%from, error = %e, "client update dropped");
                return Ok(());
            }
        };
        if report.rejected > 0 {
            tracing::debug!(%from, rejected = report.rejected, "client sent malformed fields");
        }
        if report.accepted.is_empty() {
            return Ok(());
        }

        let mut fields = report.accepted;
        fields.sort_unstable_by_key(|field| field.0);
        fields.dedup();
        let echo = match collect_fields(&self.world, entity, replicate.type_id, fields) {
            Ok(packet) => packet,
            Err(NetError::Ecs(e)) => {
                tracing::warn!(%from, error = %e, "could not read back accepted fields");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let except: &[NetId] = if self.broadcast_to_origin { &[] } else { &[from] };
        let packets: Vec<_> = echo
            .split_to_fit(sphinx_shared::MAX_PACKET_SIZE)
            .into_iter()
            .map(Packet::EcsReplicate)
            .collect();
        self.net.broadcast_packets(&packets, except)?;
        Ok(())
    }
}

impl<T: Transport> std::fmt::Debug for ServerSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSession")
            .field("net", &self.net)
            .field("players", &self.players)
            .field("outgoing", &self.outgoing)
            .finish_non_exhaustive()
    }
}
