//! # Network Identity
//!
//! Transport connection handles are opaque and may be large or sparse. The
//! rest of the engine names peers by a small per-session [`NetId`] instead.
//!
//! ## Assignment
//!
//! When a connection is established the server hands out the smallest netId
//! freed by an earlier close, or else one past the largest live id, starting
//! at 0. So with connections A, B, C:
//!
//! ```text
//! A opens  -> 0
//! B opens  -> 1
//! A closes -> 0 returns to the unused set
//! C opens  -> 0
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::error::{NetError, NetResult};

/// Per-session identifier of a peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NetId(u32);

impl NetId {
    /// The server's own id. Never assigned to a client.
    pub const SERVER: Self = Self(u32::MAX);

    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw id value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// True for [`Self::SERVER`].
    #[inline]
    #[must_use]
    pub const fn is_server(self) -> bool {
        self.0 == u32::MAX
    }
}

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_server() {
            f.write_str("net#server")
        } else {
            write!(f, "net#{}", self.0)
        }
    }
}

/// Opaque transport-level connection handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ConnectionHandle(u32);

impl ConnectionHandle {
    /// Wraps a raw handle.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw handle value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Lifecycle of one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Transport handshake in progress.
    Connecting,
    /// Usable; a netId is bound.
    Established,
    /// Gone. The netId has been recycled.
    Closed,
}

/// Status of a peer as seen by the other peers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PeerStatus {
    /// Connected, not yet admitted into the session.
    Connecting = 0,
    /// Admitted; has a player entity.
    Authenticated = 1,
    /// Left the session.
    Disconnected = 2,
}

impl TryFrom<u8> for PeerStatus {
    type Error = NetError;

    fn try_from(value: u8) -> NetResult<Self> {
        match value {
            0 => Ok(Self::Connecting),
            1 => Ok(Self::Authenticated),
            2 => Ok(Self::Disconnected),
            _ => Err(NetError::MalformedPacket("peer status out of range")),
        }
    }
}

/// Bidirectional connection <-> netId map with id recycling.
///
/// Single-writer: callers serialise access, there is no internal lock.
#[derive(Debug, Default)]
pub struct NetIdTable {
    states: HashMap<ConnectionHandle, ConnectionState>,
    by_connection: BTreeMap<ConnectionHandle, NetId>,
    by_net_id: BTreeMap<NetId, ConnectionHandle>,
    unused: BTreeSet<NetId>,
}

impl NetIdTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a connection entering the handshake.
    pub fn open(&mut self, connection: ConnectionHandle) {
        self.states.entry(connection).or_insert(ConnectionState::Connecting);
    }

    /// Marks the connection established and assigns it a netId.
    ///
    /// Establishing an already established connection returns its current id.
    ///
    /// # Errors
    ///
    /// [`NetError::NetIdsExhausted`] if no client id is left.
    pub fn establish(&mut self, connection: ConnectionHandle) -> NetResult<NetId> {
        if let Some(existing) = self.by_connection.get(&connection) {
            return Ok(*existing);
        }
        let net_id = self.next_net_id()?;
        self.unused.remove(&net_id);
        self.insert(connection, net_id);
        Ok(net_id)
    }

    /// Binds an established connection to a netId chosen elsewhere.
    ///
    /// Clients use this for their connection to the server.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidNetId`] if `net_id` is bound to another connection.
    pub fn bind(&mut self, connection: ConnectionHandle, net_id: NetId) -> NetResult<()> {
        match self.by_net_id.get(&net_id) {
            Some(bound) if *bound == connection => return Ok(()),
            Some(_) => return Err(NetError::InvalidNetId(net_id)),
            None => {}
        }
        self.unused.remove(&net_id);
        self.insert(connection, net_id);
        Ok(())
    }

    /// Forgets a connection, recycling its netId. Returns the id it had.
    pub fn close(&mut self, connection: ConnectionHandle) -> Option<NetId> {
        self.states.remove(&connection);
        let net_id = self.by_connection.remove(&connection)?;
        self.by_net_id.remove(&net_id);
        if !net_id.is_server() {
            self.unused.insert(net_id);
        }
        Some(net_id)
    }

    /// Lifecycle state; unknown connections count as closed.
    #[must_use]
    pub fn state(&self, connection: ConnectionHandle) -> ConnectionState {
        self.states
            .get(&connection)
            .copied()
            .unwrap_or(ConnectionState::Closed)
    }

    /// NetId of an established connection.
    #[must_use]
    pub fn net_id_for(&self, connection: ConnectionHandle) -> Option<NetId> {
        self.by_connection.get(&connection).copied()
    }

    /// Connection bound to a netId.
    #[must_use]
    pub fn connection_for(&self, net_id: NetId) -> Option<ConnectionHandle> {
        self.by_net_id.get(&net_id).copied()
    }

    /// Bound netIds, ascending.
    pub fn net_ids(&self) -> impl Iterator<Item = NetId> + '_ {
        self.by_net_id.keys().copied()
    }

    /// Bound (netId, connection) pairs, ascending by netId.
    pub fn iter(&self) -> impl Iterator<Item = (NetId, ConnectionHandle)> + '_ {
        self.by_net_id.iter().map(|(n, c)| (*n, *c))
    }

    /// Number of established connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_net_id.len()
    }

    /// True if nothing is established.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_net_id.is_empty()
    }

    /// The id [`Self::establish`] would assign next.
    ///
    /// # Errors
    ///
    /// [`NetError::NetIdsExhausted`] if no client id is left.
    pub fn next_net_id(&self) -> NetResult<NetId> {
        if let Some(recycled) = self.unused.first() {
            return Ok(*recycled);
        }
        let candidate = match self.by_net_id.keys().filter(|id| !id.is_server()).next_back() {
            Some(max) => max.0.checked_add(1).ok_or(NetError::NetIdsExhausted)?,
            None => 0,
        };
        let candidate = NetId(candidate);
        if candidate.is_server() {
            return Err(NetError::NetIdsExhausted);
        }
        Ok(candidate)
    }

    fn insert(&mut self, connection: ConnectionHandle, net_id: NetId) {
        self.states.insert(connection, ConnectionState::Established);
        self.by_connection.insert(connection, net_id);
        self.by_net_id.insert(net_id, connection);
    }
}
