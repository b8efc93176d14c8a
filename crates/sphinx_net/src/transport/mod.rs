//! # Transport Layer
//!
//! The seam between the network interface and whatever actually moves bytes.
//!
//! ## Design
//!
//! - Message-oriented: one `send` is one datagram, delivered whole or not at all
//! - Connection-oriented: every message belongs to a [`ConnectionHandle`]
//! - Polled: the interface drains [`TransportEvent`]s once per tick
//!
//! [`LoopbackHub`] is an in-process implementation for tests and headless runs.

mod loopback;

pub use loopback::{LinkConditions, LoopbackHub, LoopbackTransport};

use crate::error::NetResult;
use crate::identity::ConnectionHandle;

/// Something the transport observed since the last poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A peer started connecting.
    Connecting(ConnectionHandle),
    /// The connection is usable.
    Established(ConnectionHandle),
    /// The connection is gone, from either side.
    Closed(ConnectionHandle),
    /// A datagram arrived.
    Message(ConnectionHandle, Vec<u8>),
}

/// A message transport.
pub trait Transport {
    /// Events since the last poll, oldest first.
    fn poll(&mut self) -> Vec<TransportEvent>;

    /// Sends one datagram. Delivery is not guaranteed.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidConnection`](crate::NetError::InvalidConnection) if
    /// the connection is not open.
    fn send(&mut self, connection: ConnectionHandle, bytes: &[u8]) -> NetResult<()>;

    /// Closes a connection. Both sides see [`TransportEvent::Closed`].
    fn close(&mut self, connection: ConnectionHandle);
}
