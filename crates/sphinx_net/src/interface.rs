//! # Network Interface
//!
//! Drives a [`Transport`] once per tick and keeps the [`NetIdTable`] in step
//! with it.
//!
//! ## Handshake
//!
//! ```text
//! SERVER                                   CLIENT
//!   | <-------- transport established -------> |
//!   | assign netId                             | bind conn -> NetId::SERVER
//!   | --- NetIdAssigned(id) -----------------> | NetIdReceived
//!   | --- PeerStatus(id, Connecting) --------> | PeerStatusChanged (everyone)
//! ```
//!
//! Handshake packets are consumed here. Everything else is queued for the
//! session layer, tagged with the sender's netId.
//!
//! Not thread-safe: mutating calls must not overlap [`NetworkInterface::update`].

use std::collections::BTreeMap;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::config::{NetConfig, NetRole};
use crate::error::{NetError, NetResult};
use crate::events::{EventChannel, NetworkEvent};
use crate::identity::{ConnectionHandle, NetId, NetIdTable, PeerStatus};
use crate::protocol::Packet;
use crate::transport::{Transport, TransportEvent};

/// Connection bookkeeping and packet routing for one process.
pub struct NetworkInterface<T: Transport> {
    role: NetRole,
    max_connections: usize,
    transport: T,
    table: NetIdTable,
    local_net_id: Option<NetId>,
    peers: BTreeMap<NetId, PeerStatus>,
    events: EventChannel<NetworkEvent>,
    received: Vec<(NetId, Packet)>,
    uptime: Duration,
}

impl<T: Transport> NetworkInterface<T> {
    /// Wraps `transport` with the role and limits from `config`.
    #[must_use]
    pub fn new(transport: T, config: &NetConfig) -> Self {
        let local_net_id = match config.role {
            NetRole::Server => Some(NetId::SERVER),
            NetRole::Client => None,
        };
        Self {
            role: config.role,
            max_connections: config.max_connections,
            transport,
            table: NetIdTable::new(),
            local_net_id,
            peers: BTreeMap::new(),
            events: EventChannel::unbounded(),
            received: Vec::new(),
            uptime: Duration::ZERO,
        }
    }

    /// Polls the transport and processes everything it reported.
    ///
    /// Failures are scoped to the connection that caused them: they are
    /// logged, the connection is dropped, and the rest of the batch is still
    /// processed. Undecodable datagrams are logged and dropped.
    pub fn update(&mut self, delta: Duration) {
        self.uptime += delta;
        for event in self.transport.poll() {
            match event {
                TransportEvent::Connecting(connection) => self.table.open(connection),
                TransportEvent::Established(connection) => {
                    if let Err(e) = self.on_established(connection) {
                        tracing::warn!(%connection, error = %e, "handshake failed, dropping connection");
                        self.table.close(connection);
                        self.transport.close(connection);
                    }
                }
                TransportEvent::Closed(connection) => self.on_closed(connection),
                TransportEvent::Message(connection, bytes) => self.on_message(connection, &bytes),
            }
        }
    }

    /// Binds `connection` and, on a server, sends its netId. Nothing is
    /// published unless the handshake packet went out.
    fn on_established(&mut self, connection: ConnectionHandle) -> NetResult<()> {
        match self.role {
            NetRole::Server => {
                if self.table.len() >= self.max_connections {
                    tracing::warn!(%connection, max = self.max_connections, "refusing connection, server full");
                    self.table.close(connection);
                    self.transport.close(connection);
                    return Ok(());
                }
                let net_id = self.table.establish(connection)?;
                self.send_packets(connection, &[Packet::NetIdAssigned { net_id }])?;
                tracing::info!(%connection, %net_id, "client connected");
                self.events
                    .publish(NetworkEvent::ConnectionEstablished { connection, net_id });
                if let Err(e) = self.set_peer_status(net_id, PeerStatus::Connecting) {
                    tracing::warn!(%net_id, error = %e, "failed to announce peer");
                }
            }
            NetRole::Client => {
                self.table.bind(connection, NetId::SERVER)?;
                tracing::info!(%connection, "connected to server");
                self.events.publish(NetworkEvent::ConnectionEstablished {
                    connection,
                    net_id: NetId::SERVER,
                });
            }
        }
        Ok(())
    }

    fn on_closed(&mut self, connection: ConnectionHandle) {
        let Some(net_id) = self.table.close(connection) else {
            return;
        };
        tracing::info!(%connection, %net_id, "connection closed");
        self.events
            .publish(NetworkEvent::ConnectionClosed { connection, net_id });

        match self.role {
            NetRole::Server => {
                self.peers.remove(&net_id);
                let packet = Packet::PeerStatus {
                    net_id,
                    status: PeerStatus::Disconnected,
                };
                if let Err(e) = self.broadcast_packets(&[packet], &[]) {
                    tracing::warn!(error = %e, "failed to announce disconnect");
                }
            }
            NetRole::Client => {
                self.peers.clear();
                self.local_net_id = None;
            }
        }
    }

    fn on_message(&mut self, connection: ConnectionHandle, bytes: &[u8]) {
        let Some(from) = self.table.net_id_for(connection) else {
            tracing::debug!(%connection, "message on unestablished connection dropped");
            return;
        };
        let packet = match Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(%connection, error = %e, len = bytes.len(), "dropping undecodable packet");
                return;
            }
        };

        match (self.role, packet) {
            (NetRole::Client, Packet::NetIdAssigned { net_id }) => {
                tracing::info!(%net_id, "received net id");
                self.local_net_id = Some(net_id);
                self.events.publish(NetworkEvent::NetIdReceived { net_id });
            }
            (NetRole::Client, Packet::PeerStatus { net_id, status }) => {
                if status == PeerStatus::Disconnected {
                    self.peers.remove(&net_id);
                } else {
                    self.peers.insert(net_id, status);
                }
                self.events
                    .publish(NetworkEvent::PeerStatusChanged { net_id, status });
            }
            (NetRole::Server, packet @ (Packet::NetIdAssigned { .. } | Packet::PeerStatus { .. })) => {
                tracing::warn!(%from, packet_type = ?packet.packet_type(), "client sent server-only packet");
            }
            (_, packet) => self.received.push((from, packet)),
        }
    }

    /// Packets received since the last call, oldest first, with their sender.
    pub fn take_received(&mut self) -> Vec<(NetId, Packet)> {
        std::mem::take(&mut self.received)
    }

    /// Encodes and sends `packets` over one connection.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidConnection`] if the connection is not established,
    /// or an encoding error.
    pub fn send_packets(&mut self, connection: ConnectionHandle, packets: &[Packet]) -> NetResult<()> {
        if self.table.net_id_for(connection).is_none() {
            return Err(NetError::InvalidConnection(connection));
        }
        for packet in packets {
            let bytes = packet.encode()?;
            self.transport.send(connection, &bytes)?;
        }
        Ok(())
    }

    /// Sends `packets` to every established connection whose netId is not in
    /// `except`. Returns how many connections were addressed.
    ///
    /// # Errors
    ///
    /// An encoding error. Per-connection send failures are logged and skipped.
    pub fn broadcast_packets(&mut self, packets: &[Packet], except: &[NetId]) -> NetResult<usize> {
        let encoded = packets.iter().map(Packet::encode).collect::<NetResult<Vec<_>>>()?;
        let targets: Vec<_> = self
            .table
            .iter()
            .filter(|(net_id, _)| !except.contains(net_id))
            .collect();
        for (net_id, connection) in &targets {
            for bytes in &encoded {
                if let Err(e) = self.transport.send(*connection, bytes) {
                    tracing::warn!(%net_id, error = %e, "broadcast send failed");
                    break;
                }
            }
        }
        Ok(targets.len())
    }

    /// NetIds of connected clients, ascending. Empty on a client.
    #[must_use]
    pub fn connected_client_net_ids(&self) -> Vec<NetId> {
        self.table.net_ids().filter(|id| !id.is_server()).collect()
    }

    /// NetId bound to a connection.
    #[must_use]
    pub fn net_id_for(&self, connection: ConnectionHandle) -> Option<NetId> {
        self.table.net_id_for(connection)
    }

    /// Connection bound to a netId.
    #[must_use]
    pub fn connection_for(&self, net_id: NetId) -> Option<ConnectionHandle> {
        self.table.connection_for(net_id)
    }

    /// Closes the connection of `net_id`. The close is processed on the next update.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidNetId`] if nothing is bound to `net_id`.
    pub fn close_connection(&mut self, net_id: NetId) -> NetResult<()> {
        let connection = self
            .table
            .connection_for(net_id)
            .ok_or(NetError::InvalidNetId(net_id))?;
        tracing::info!(%net_id, %connection, "closing connection");
        self.transport.close(connection);
        Ok(())
    }

    /// This process's netId: [`NetId::SERVER`] on a server, the assigned id on
    /// a client once the handshake completes.
    #[inline]
    #[must_use]
    pub const fn local_net_id(&self) -> Option<NetId> {
        self.local_net_id
    }

    /// Records and broadcasts a peer's status. Server only.
    ///
    /// # Errors
    ///
    /// An encoding error.
    pub fn set_peer_status(&mut self, net_id: NetId, status: PeerStatus) -> NetResult<()> {
        debug_assert_eq!(self.role, NetRole::Server, "only the server announces peer status");
        self.peers.insert(net_id, status);
        self.events
            .publish(NetworkEvent::PeerStatusChanged { net_id, status });
        self.broadcast_packets(&[Packet::PeerStatus { net_id, status }], &[])?;
        Ok(())
    }

    /// Last known status of a peer.
    #[must_use]
    pub fn peer_status(&self, net_id: NetId) -> Option<PeerStatus> {
        self.peers.get(&net_id).copied()
    }

    /// Known peers and their status, ascending by netId.
    pub fn peers(&self) -> impl Iterator<Item = (NetId, PeerStatus)> + '_ {
        self.peers.iter().map(|(id, status)| (*id, *status))
    }

    /// Lifecycle events since the last drain.
    pub fn drain_events(&self) -> Vec<NetworkEvent> {
        self.events.drain()
    }

    /// A receiver for lifecycle events, for consumers outside the tick loop.
    #[must_use]
    pub fn events(&self) -> Receiver<NetworkEvent> {
        self.events.receiver()
    }

    /// Server or client.
    #[inline]
    #[must_use]
    pub const fn role(&self) -> NetRole {
        self.role
    }

    /// Sum of all `delta`s passed to [`Self::update`].
    #[inline]
    #[must_use]
    pub const fn uptime(&self) -> Duration {
        self.uptime
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

impl<T: Transport> std::fmt::Debug for NetworkInterface<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkInterface")
            .field("role", &self.role)
            .field("local_net_id", &self.local_net_id)
            .field("connections", &self.table.len())
            .field("peers", &self.peers.len())
            .finish_non_exhaustive()
    }
}
