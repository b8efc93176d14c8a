//! # Network Events
//!
//! Connection lifecycle notifications. The network interface publishes them
//! on an [`EventChannel`] during `update`; sessions and game code drain it.

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::identity::{ConnectionHandle, NetId, PeerStatus};

/// Something that happened to a connection or peer.
///
/// `net_id` on connection events names the peer at the other end, which is
/// [`NetId::SERVER`] when seen from a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A connection finished its handshake and has a netId.
    ConnectionEstablished {
        /// Transport handle.
        connection: ConnectionHandle,
        /// Peer id.
        net_id: NetId,
    },
    /// A connection closed; its netId is free again.
    ConnectionClosed {
        /// Transport handle.
        connection: ConnectionHandle,
        /// Peer id it had.
        net_id: NetId,
    },
    /// The server told this client its own netId.
    NetIdReceived {
        /// This process's id.
        net_id: NetId,
    },
    /// A peer's session status changed.
    PeerStatusChanged {
        /// The peer.
        net_id: NetId,
        /// New status.
        status: PeerStatus,
    },
}

/// Multi-producer multi-consumer event queue.
pub struct EventChannel<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> EventChannel<T> {
    /// Bounded channel; sends past `capacity` fail until drained.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        Self { sender, receiver }
    }

    /// Unbounded channel.
    #[must_use]
    pub fn unbounded() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    /// Publishes without blocking. Returns `false` if the event was dropped
    /// because the channel is full.
    pub fn publish(&self, event: T) -> bool {
        self.sender.try_send(event).is_ok()
    }

    /// Next event, if any.
    pub fn try_recv(&self) -> Option<T> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// All queued events, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    /// Queued event count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// True if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// A sender for another producer.
    #[must_use]
    pub fn sender(&self) -> Sender<T> {
        self.sender.clone()
    }

    /// A receiver for another consumer.
    #[must_use]
    pub fn receiver(&self) -> Receiver<T> {
        self.receiver.clone()
    }
}

impl<T> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_channel_drops_when_full() {
        let channel: EventChannel<u8> = EventChannel::new(2);
        assert!(channel.publish(1));
        assert!(channel.publish(2));
        assert!(!channel.publish(3));
        assert_eq!(channel.drain(), vec![1, 2]);
        assert!(channel.is_empty());
    }

    #[test]
    fn test_receiver_clone_shares_queue() {
        let channel = EventChannel::unbounded();
        let rx = channel.receiver();
        channel.publish(NetworkEvent::NetIdReceived { net_id: NetId::new(3) });
        assert_eq!(rx.try_recv().unwrap(), NetworkEvent::NetIdReceived { net_id: NetId::new(3) });
        assert!(channel.try_recv().is_none());
    }
}
